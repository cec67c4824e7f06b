//! Slide navigation — resolves which slide follows an interaction from the
//! slide's override map and item actions, and applies caller-side rules
//! (slide locking, multi-selection) before asking the resolver.

pub mod navigator;
pub mod resolver;

pub use navigator::{Navigator, Transition};
pub use resolver::{Destination, Interaction, NavigationResolver, NextSlide};

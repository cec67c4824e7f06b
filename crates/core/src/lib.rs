//! Shared runtime model for swipeable quiz flows: the flow document,
//! gamification opt-in normalization, point values, configuration, and the
//! subscriber registry used by the trigger bus and the points ledger.

pub mod config;
pub mod error;
pub mod flow;
pub mod gamification;
pub mod points;
pub mod subscribers;

pub use config::SwipeflowConfig;
pub use error::{FlowError, FlowResult};
pub use flow::{
    item_logic_key, Element, ElementKind, Flow, FlowOption, Item, ItemAction, LogicNext,
    SelectionMode, Slide, SlideId,
};
pub use gamification::{EffectKind, FlowEffect, FlowGamification, GamificationOptIn};
pub use points::PointsConfig;
pub use subscribers::{DispatchReport, SubscriberSet, Subscription};

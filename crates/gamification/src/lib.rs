//! Gamification runtime — the trigger bus that carries semantic events, the
//! per-element opt-in resolver, and the effect reactors that sit between
//! the two.
//!
//! # Modules
//!
//! - [`event`] — Trigger kinds and the event envelope
//! - [`bus`] — Synchronous publish/subscribe registry keyed by trigger kind
//! - [`resolver`] — Decides whether an effect may fire for an element
//! - [`effects`] — Effect players and the reactors that gate them

pub mod bus;
pub mod effects;
pub mod event;
pub mod resolver;

pub use bus::TriggerBus;
pub use effects::{EffectCue, EffectPlayer, EffectReactor, EffectTarget, RecordingPlayer};
pub use event::{GamificationEvent, TriggerKind};
pub use resolver::{is_effect_allowed, is_flow_effect_allowed};

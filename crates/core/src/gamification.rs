//! Gamification opt-in records and their normalization.
//!
//! Authoring tools store gamification settings as loosely-typed JSON, with
//! flags that may be missing, null, or of the wrong type. Every read goes
//! through one normalization step here so callers never re-derive fallbacks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::points::PointsConfig;

/// Element-scoped visual/audio effects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum EffectKind {
    PointsBadge,
    SuccessSound,
    Confetti,
    Particles,
}

impl EffectKind {
    pub const ALL: [EffectKind; 4] = [
        EffectKind::PointsBadge,
        EffectKind::SuccessSound,
        EffectKind::Confetti,
        EffectKind::Particles,
    ];

    /// Key of the per-element opt-in flag for this effect.
    pub fn config_key(&self) -> &'static str {
        match self {
            EffectKind::PointsBadge => "enablePointsBadge",
            EffectKind::SuccessSound => "enableSuccessSound",
            EffectKind::Confetti => "enableConfetti",
            EffectKind::Particles => "enableParticles",
        }
    }
}

/// Flow-scoped display elements governed only by flow-level opt-in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum FlowEffect {
    PointsTotal,
    ProgressBar,
}

// ─── Element opt-in ─────────────────────────────────────────────────────────

/// Per-element opt-in record. Flags are tri-state: `None` means "not set",
/// which is not the same as `Some(false)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GamificationOptIn {
    pub enabled: Option<bool>,
    pub points_badge: Option<bool>,
    pub success_sound: Option<bool>,
    pub confetti: Option<bool>,
    pub particles: Option<bool>,
}

impl GamificationOptIn {
    /// Normalize the `gamification` block of an element config.
    ///
    /// Returns `None` when the block is missing or malformed.
    pub fn from_config(config: &Value) -> Option<Self> {
        let block = config.get("gamification")?;
        let Some(obj) = block.as_object() else {
            debug!("gamification block is not an object, treating as absent");
            return None;
        };

        Some(Self {
            enabled: read_flag(obj, "enabled")?,
            points_badge: read_flag(obj, EffectKind::PointsBadge.config_key())?,
            success_sound: read_flag(obj, EffectKind::SuccessSound.config_key())?,
            confetti: read_flag(obj, EffectKind::Confetti.config_key())?,
            particles: read_flag(obj, EffectKind::Particles.config_key())?,
        })
    }

    /// The explicit value of the flag for `effect`, if any.
    pub fn flag(&self, effect: EffectKind) -> Option<bool> {
        match effect {
            EffectKind::PointsBadge => self.points_badge,
            EffectKind::SuccessSound => self.success_sound,
            EffectKind::Confetti => self.confetti,
            EffectKind::Particles => self.particles,
        }
    }
}

/// Outer `None` = malformed; inner `None` = unset.
fn read_flag(obj: &Map<String, Value>, key: &str) -> Option<Option<bool>> {
    match obj.get(key) {
        None | Some(Value::Null) => Some(None),
        Some(Value::Bool(b)) => Some(Some(*b)),
        Some(other) => {
            debug!(key, value = %other, "non-boolean gamification flag");
            None
        }
    }
}

// ─── Flow-level settings ────────────────────────────────────────────────────

/// Fully-defaulted flow-level gamification settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowGamification {
    pub enabled: bool,
    pub show_points_total: bool,
    pub show_progress_bar: bool,
    pub points: PointsConfig,
}

impl FlowGamification {
    pub fn from_config(config: Option<&Value>) -> Self {
        let Some(obj) = config.and_then(|c| c.as_object()) else {
            return Self::default();
        };

        let strict = |key: &str| obj.get(key).and_then(Value::as_bool).unwrap_or(false);

        let points = match obj.get("points") {
            Some(raw) => serde_json::from_value(raw.clone()).unwrap_or_else(|e| {
                warn!(error = %e, "invalid flow points config, using defaults");
                PointsConfig::default()
            }),
            None => PointsConfig::default(),
        };

        Self {
            enabled: strict("enabled"),
            show_points_total: strict("showPointsTotal"),
            show_progress_bar: strict("showProgressBar"),
            points,
        }
    }

    pub fn display_flag(&self, effect: FlowEffect) -> bool {
        match effect {
            FlowEffect::PointsTotal => self.show_points_total,
            FlowEffect::ProgressBar => self.show_progress_bar,
        }
    }

    /// Flow displays need the coarse switch and their own flag.
    pub fn allows(&self, effect: FlowEffect) -> bool {
        self.enabled && self.display_flag(effect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_block_is_none() {
        assert!(GamificationOptIn::from_config(&json!({})).is_none());
        assert!(GamificationOptIn::from_config(&Value::Null).is_none());
    }

    #[test]
    fn test_tri_state_flags() {
        let opt_in = GamificationOptIn::from_config(&json!({
            "gamification": {"enabled": true, "enableConfetti": false, "enableParticles": null}
        }))
        .unwrap();
        assert_eq!(opt_in.enabled, Some(true));
        assert_eq!(opt_in.flag(EffectKind::Confetti), Some(false));
        assert_eq!(opt_in.flag(EffectKind::Particles), None);
        assert_eq!(opt_in.flag(EffectKind::PointsBadge), None);
    }

    #[test]
    fn test_malformed_block_fails_closed() {
        assert!(GamificationOptIn::from_config(&json!({"gamification": "yes"})).is_none());
        assert!(
            GamificationOptIn::from_config(&json!({"gamification": {"enableConfetti": "true"}}))
                .is_none()
        );
    }

    #[test]
    fn test_flow_settings_defaults() {
        let settings = FlowGamification::from_config(None);
        assert!(!settings.enabled);
        assert!(!settings.display_flag(FlowEffect::PointsTotal));

        let settings = FlowGamification::from_config(Some(&json!({
            "enabled": true,
            "showPointsTotal": true,
            "showProgressBar": "sure",
            "points": {"perAnswer": 3}
        })));
        assert!(settings.enabled);
        assert!(settings.display_flag(FlowEffect::PointsTotal));
        assert!(!settings.display_flag(FlowEffect::ProgressBar));
        assert_eq!(settings.points.per_answer, 3);
        assert_eq!(settings.points.per_correct, PointsConfig::default().per_correct);
    }

    #[test]
    fn test_flow_display_needs_enabled_and_flag() {
        let shown = FlowGamification::from_config(Some(&json!({"showPointsTotal": true})));
        assert!(!shown.allows(FlowEffect::PointsTotal));

        let enabled = FlowGamification::from_config(Some(&json!({
            "enabled": true,
            "showPointsTotal": true
        })));
        assert!(enabled.allows(FlowEffect::PointsTotal));
        assert!(!enabled.allows(FlowEffect::ProgressBar));
    }
}

//! Per-element gamification resolver.
//!
//! An effect fires only when it is explicitly turned on for the element that
//! originated the event. Precedence:
//!
//! 1. the element is looked up across every slide of the flow;
//! 2. no (or malformed) gamification block → not allowed;
//! 3. the specific flag explicitly `false` → not allowed;
//! 4. the specific flag explicitly `true` → allowed;
//! 5. the specific flag unset → not allowed, whatever `enabled` says;
//! 6. no element id → not allowed.
//!
//! Flow-scoped displays (points total, progress bar) answer only to the
//! flow-level settings.

use tracing::trace;

use swipeflow_core::flow::Flow;
use swipeflow_core::gamification::{EffectKind, FlowEffect};

/// Whether `effect` may fire for the element that originated an event.
pub fn is_effect_allowed(element_id: Option<&str>, effect: EffectKind, flow: &Flow) -> bool {
    let Some(element_id) = element_id else {
        return false;
    };
    let Some((_, element)) = flow.find_element(element_id) else {
        trace!(element_id, ?effect, "effect denied: element not in flow");
        return false;
    };
    let Some(opt_in) = element.gamification() else {
        return false;
    };

    // `enabled` alone never grants a specific effect.
    let allowed = opt_in.flag(effect) == Some(true);
    trace!(element_id, ?effect, allowed, "effect resolved");
    allowed
}

/// Whether a flow-scoped display may react.
pub fn is_flow_effect_allowed(flow: &Flow, effect: FlowEffect) -> bool {
    flow.gamification_settings().allows(effect)
}

/// Every element-scoped effect allowed for `element_id`.
pub fn allowed_effects(element_id: &str, flow: &Flow) -> Vec<EffectKind> {
    EffectKind::ALL
        .into_iter()
        .filter(|effect| is_effect_allowed(Some(element_id), *effect, flow))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn flow_with(elements: Value, flow_gamification: Value) -> Flow {
        serde_json::from_value(json!({
            "id": "f",
            "gamification": flow_gamification,
            "slides": [
                {"id": "s1", "elements": [{"id": "intro", "type": "TEXT"}]},
                {"id": "s2", "elements": elements}
            ]
        }))
        .unwrap()
    }

    fn element(id: &str, gamification: Value) -> Value {
        json!({"id": id, "type": "BUTTON", "config": {"gamification": gamification}})
    }

    #[test]
    fn test_no_config_denies_everything() {
        let flow = flow_with(json!([{"id": "plain", "type": "BUTTON"}]), Value::Null);
        for effect in EffectKind::ALL {
            assert!(!is_effect_allowed(Some("plain"), effect, &flow));
            assert!(!is_effect_allowed(Some("intro"), effect, &flow));
        }
    }

    #[test]
    fn test_explicit_false_wins() {
        let flow = flow_with(
            json!([element("btn", json!({
                "enabled": true,
                "enableConfetti": false,
                "enablePointsBadge": true,
                "enableSuccessSound": true,
                "enableParticles": true
            }))]),
            Value::Null,
        );
        assert!(!is_effect_allowed(Some("btn"), EffectKind::Confetti, &flow));
        assert!(is_effect_allowed(Some("btn"), EffectKind::Particles, &flow));
        assert_eq!(
            allowed_effects("btn", &flow),
            vec![EffectKind::PointsBadge, EffectKind::SuccessSound, EffectKind::Particles]
        );
    }

    #[test]
    fn test_coarse_enabled_never_implies_specific() {
        let flow = flow_with(json!([element("btn", json!({"enabled": true}))]), Value::Null);
        for effect in EffectKind::ALL {
            assert!(!is_effect_allowed(Some("btn"), effect, &flow));
        }
    }

    #[test]
    fn test_specific_flag_without_coarse_enable() {
        let flow = flow_with(json!([element("btn1", json!({"enableConfetti": true}))]), Value::Null);
        assert!(is_effect_allowed(Some("btn1"), EffectKind::Confetti, &flow));
        assert!(!is_effect_allowed(Some("btn1"), EffectKind::Particles, &flow));
    }

    #[test]
    fn test_element_found_on_any_slide() {
        let flow: Flow = serde_json::from_value(json!({
            "id": "f",
            "slides": [
                {"id": "s1"},
                {"id": "s2"},
                {"id": "s3", "elements": [element("late", json!({"enableParticles": true}))]}
            ]
        }))
        .unwrap();
        assert!(is_effect_allowed(Some("late"), EffectKind::Particles, &flow));
    }

    #[test]
    fn test_global_events_never_enable_element_effects() {
        let flow = flow_with(
            json!([element("btn", json!({"enableConfetti": true}))]),
            json!({"enabled": true, "showPointsTotal": true}),
        );
        for effect in EffectKind::ALL {
            assert!(!is_effect_allowed(None, effect, &flow));
        }
        assert!(is_flow_effect_allowed(&flow, FlowEffect::PointsTotal));
        assert!(!is_flow_effect_allowed(&flow, FlowEffect::ProgressBar));
    }

    #[test]
    fn test_flow_effects_need_flow_enable() {
        let flow = flow_with(json!([]), json!({"enabled": false, "showPointsTotal": true}));
        assert!(!is_flow_effect_allowed(&flow, FlowEffect::PointsTotal));
    }

    #[test]
    fn test_malformed_config_fails_closed() {
        let flow = flow_with(
            json!([element("btn", json!({"enableConfetti": 1, "enableParticles": true}))]),
            json!("garbage"),
        );
        assert!(!is_effect_allowed(Some("btn"), EffectKind::Particles, &flow));
        assert!(!is_flow_effect_allowed(&flow, FlowEffect::PointsTotal));
    }
}

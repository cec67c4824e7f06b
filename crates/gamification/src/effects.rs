//! Effect reactors — subscribe an effect to the trigger bus and gate every
//! delivery through the resolver before anything is played.
//!
//! Rendering/playback lives behind [`EffectPlayer`]; the runtime only
//! decides *whether* a cue is played, never how.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use swipeflow_core::flow::Flow;
use swipeflow_core::gamification::{EffectKind, FlowEffect};
use swipeflow_core::subscribers::Subscription;

use crate::bus::TriggerBus;
use crate::event::{GamificationEvent, TriggerKind};
use crate::resolver::is_effect_allowed;

/// What a cue plays on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "effect")]
pub enum EffectTarget {
    Element(EffectKind),
    Flow(FlowEffect),
}

/// A single approved effect playback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectCue {
    pub target: EffectTarget,
    pub trigger: TriggerKind,
    pub element_id: Option<String>,
    pub payload: Option<serde_json::Value>,
}

impl EffectCue {
    fn from_event(target: EffectTarget, event: &GamificationEvent) -> Self {
        Self {
            target,
            trigger: event.kind,
            element_id: event.element_id.clone(),
            payload: event.payload.clone(),
        }
    }
}

/// Rendering seam for approved effects.
pub trait EffectPlayer: Send + Sync {
    fn play(&self, cue: &EffectCue) -> anyhow::Result<()>;
}

/// In-memory player that records cues, for tests and headless sessions.
#[derive(Default)]
pub struct RecordingPlayer {
    cues: Mutex<Vec<EffectCue>>,
}

impl RecordingPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cues(&self) -> Vec<EffectCue> {
        self.cues.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.cues.lock().len()
    }

    pub fn count_target(&self, target: EffectTarget) -> usize {
        self.cues.lock().iter().filter(|c| c.target == target).count()
    }

    pub fn clear(&self) {
        self.cues.lock().clear();
    }
}

impl EffectPlayer for RecordingPlayer {
    fn play(&self, cue: &EffectCue) -> anyhow::Result<()> {
        self.cues.lock().push(cue.clone());
        Ok(())
    }
}

/// Trigger kinds each element effect listens to unless configured otherwise.
pub fn default_triggers(effect: EffectKind) -> &'static [TriggerKind] {
    match effect {
        // Answers reach the badge through the gain they credit.
        EffectKind::PointsBadge => &[TriggerKind::OnPointsGained],
        EffectKind::SuccessSound => &[TriggerKind::OnQuestionAnswer, TriggerKind::OnFormComplete],
        EffectKind::Confetti => &[
            TriggerKind::OnButtonClick,
            TriggerKind::OnQuestionAnswer,
            TriggerKind::OnFormComplete,
        ],
        EffectKind::Particles => &[TriggerKind::OnButtonClick, TriggerKind::OnItemAction],
    }
}

/// Trigger kinds each flow display listens to.
pub fn default_flow_triggers(display: FlowEffect) -> &'static [TriggerKind] {
    match display {
        FlowEffect::PointsTotal => &[TriggerKind::OnPointsGained],
        FlowEffect::ProgressBar => &[
            TriggerKind::OnQuestionAnswer,
            TriggerKind::OnFormComplete,
            TriggerKind::OnItemAction,
        ],
    }
}

// ─── Reactor ────────────────────────────────────────────────────────────────

/// One effect attached to the bus. Holds its subscriptions so it can be
/// detached explicitly.
pub struct EffectReactor {
    target: EffectTarget,
    subscriptions: Vec<Subscription>,
}

impl EffectReactor {
    /// Attach an element-scoped effect. Each delivery is checked against the
    /// originating element's opt-in; global events never play.
    pub fn attach_element(
        bus: &TriggerBus,
        flow: Arc<Flow>,
        effect: EffectKind,
        triggers: &[TriggerKind],
        player: Arc<dyn EffectPlayer>,
    ) -> Self {
        let target = EffectTarget::Element(effect);
        let subscriptions = triggers
            .iter()
            .map(|kind| {
                let flow = flow.clone();
                let player = player.clone();
                bus.subscribe(*kind, move |event| {
                    if !is_effect_allowed(event.element_id.as_deref(), effect, &flow) {
                        return Ok(());
                    }
                    metrics::counter!("gamification.effects_played").increment(1);
                    debug!(?effect, element_id = ?event.element_id, trigger = %event.kind, "playing effect");
                    player.play(&EffectCue::from_event(target, event))
                })
            })
            .collect();

        Self {
            target,
            subscriptions,
        }
    }

    /// Attach a flow-scoped display, gated only by flow-level settings.
    /// The settings are normalized once, here.
    pub fn attach_flow(
        bus: &TriggerBus,
        flow: Arc<Flow>,
        display: FlowEffect,
        triggers: &[TriggerKind],
        player: Arc<dyn EffectPlayer>,
    ) -> Self {
        let target = EffectTarget::Flow(display);
        let allowed = flow.gamification_settings().allows(display);
        let flow_display = display;
        debug!(flow_id = %flow.id, display = ?flow_display, allowed, "flow display attached");
        let subscriptions = triggers
            .iter()
            .map(|kind| {
                let player = player.clone();
                bus.subscribe(*kind, move |event| {
                    if !allowed {
                        return Ok(());
                    }
                    player.play(&EffectCue::from_event(target, event))
                })
            })
            .collect();

        Self {
            target,
            subscriptions,
        }
    }

    /// Attach every element effect and flow display with default triggers.
    pub fn attach_defaults(
        bus: &TriggerBus,
        flow: Arc<Flow>,
        player: Arc<dyn EffectPlayer>,
    ) -> Vec<EffectReactor> {
        let mut reactors: Vec<EffectReactor> = EffectKind::ALL
            .into_iter()
            .map(|effect| {
                Self::attach_element(bus, flow.clone(), effect, default_triggers(effect), player.clone())
            })
            .collect();

        for display in [FlowEffect::PointsTotal, FlowEffect::ProgressBar] {
            reactors.push(Self::attach_flow(
                bus,
                flow.clone(),
                display,
                default_flow_triggers(display),
                player.clone(),
            ));
        }

        info!(flow_id = %flow.id, reactors = reactors.len(), "effect reactors attached");
        reactors
    }

    pub fn target(&self) -> EffectTarget {
        self.target
    }

    /// Stop reacting. Safe to call more than once.
    pub fn detach(&self) {
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup(flow_gamification: serde_json::Value) -> (TriggerBus, Arc<RecordingPlayer>, Vec<EffectReactor>) {
        let flow: Flow = serde_json::from_value(json!({
            "id": "f",
            "gamification": flow_gamification,
            "slides": [{"id": "s1", "elements": [
                {"id": "btn1", "type": "BUTTON", "config": {"gamification": {"enableConfetti": true}}},
                {"id": "btn2", "type": "BUTTON", "config": {"gamification": {"enabled": true}}},
                {"id": "q1", "type": "QUESTIONNAIRE", "config": {"gamification": {
                    "enablePointsBadge": true, "enableSuccessSound": true, "enableConfetti": false
                }}}
            ]}]
        }))
        .unwrap();
        let bus = TriggerBus::new();
        let player = Arc::new(RecordingPlayer::new());
        let reactors = EffectReactor::attach_defaults(&bus, Arc::new(flow), player.clone());
        (bus, player, reactors)
    }

    #[test]
    fn test_confetti_fires_once_for_opted_in_button() {
        let (bus, player, _reactors) = setup(json!(null));
        bus.publish(&GamificationEvent::for_element(TriggerKind::OnButtonClick, "btn1"));

        assert_eq!(player.count(), 1);
        assert_eq!(player.count_target(EffectTarget::Element(EffectKind::Confetti)), 1);
        assert_eq!(player.cues()[0].element_id.as_deref(), Some("btn1"));
    }

    #[test]
    fn test_coarse_enable_plays_nothing() {
        let (bus, player, _reactors) = setup(json!(null));
        bus.publish(&GamificationEvent::for_element(TriggerKind::OnButtonClick, "btn2"));
        assert_eq!(player.count(), 0);
    }

    #[test]
    fn test_answer_plays_only_opted_in_effects() {
        let (bus, player, _reactors) = setup(json!(null));
        bus.publish(&GamificationEvent::for_element(TriggerKind::OnQuestionAnswer, "q1"));

        assert_eq!(player.count_target(EffectTarget::Element(EffectKind::SuccessSound)), 1);
        assert_eq!(player.count_target(EffectTarget::Element(EffectKind::Confetti)), 0);
        assert_eq!(player.count_target(EffectTarget::Element(EffectKind::PointsBadge)), 0);
        assert_eq!(player.count(), 1);
    }

    #[test]
    fn test_points_badge_follows_gains_only() {
        let (bus, player, _reactors) = setup(json!(null));
        bus.publish(&GamificationEvent::for_element(TriggerKind::OnQuestionAnswer, "q1"));
        bus.publish(&GamificationEvent::for_element(TriggerKind::OnPointsGained, "q1"));
        assert_eq!(player.count_target(EffectTarget::Element(EffectKind::PointsBadge)), 1);
    }

    #[test]
    fn test_global_points_with_flow_disabled_plays_nothing() {
        let (bus, player, _reactors) = setup(json!({"enabled": false, "showPointsTotal": true}));
        bus.publish(&GamificationEvent::global(TriggerKind::OnPointsGained));
        assert_eq!(player.count(), 0);
    }

    #[test]
    fn test_global_points_with_flow_enabled_updates_total_only() {
        let (bus, player, _reactors) = setup(json!({"enabled": true, "showPointsTotal": true}));
        bus.publish(&GamificationEvent::global(TriggerKind::OnPointsGained));
        assert_eq!(player.count(), 1);
        assert_eq!(player.count_target(EffectTarget::Flow(FlowEffect::PointsTotal)), 1);
    }

    #[test]
    fn test_flow_display_gate_is_fixed_at_attach() {
        let (bus, player, _reactors) = setup(json!({"enabled": true, "showProgressBar": true}));
        bus.publish(&GamificationEvent::for_element(TriggerKind::OnFormComplete, "q1"));
        bus.publish(&GamificationEvent::global(TriggerKind::OnPointsGained));

        assert_eq!(player.count_target(EffectTarget::Flow(FlowEffect::ProgressBar)), 1);
        assert_eq!(player.count_target(EffectTarget::Flow(FlowEffect::PointsTotal)), 0);
    }

    #[test]
    fn test_detach_stops_reactions() {
        let (bus, player, reactors) = setup(json!(null));
        for reactor in &reactors {
            reactor.detach();
            reactor.detach();
        }
        bus.publish(&GamificationEvent::for_element(TriggerKind::OnButtonClick, "btn1"));
        assert_eq!(player.count(), 0);
        assert_eq!(bus.subscriber_count(TriggerKind::OnButtonClick), 0);
    }
}

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, info};

use swipeflow_analytics::{AnalyticsEvent, AnalyticsQueue, HttpTransport, QueueSettings};
use swipeflow_core::config::SwipeflowConfig;
use swipeflow_core::error::{FlowError, FlowResult};
use swipeflow_core::flow::{Flow, ItemAction};
use swipeflow_core::points::PointsConfig;
use swipeflow_gamification::{EffectPlayer, EffectReactor, TriggerBus, TriggerKind};
use swipeflow_loyalty::{AnswerOutcome, PointsAward, PointsCalculator, PointsLedger};
use swipeflow_navigation::{Interaction, Navigator, Transition};

/// One viewer's pass through a flow.
///
/// Every interaction publishes its semantic event on the bus, credits
/// points (relaying each gain as `onPointsGained`), feeds the analytics
/// queue, and finally asks the navigator where to go.
pub struct FlowSession {
    visit_id: String,
    flow: Arc<Flow>,
    navigator: Navigator,
    bus: Arc<TriggerBus>,
    ledger: Arc<PointsLedger>,
    calculator: PointsCalculator,
    queue: AnalyticsQueue,
    reactors: Vec<EffectReactor>,
    last_selection: Option<Interaction>,
    slide_entered: Instant,
    started: bool,
    ended: bool,
}

impl FlowSession {
    pub fn new(flow: Arc<Flow>, queue: AnalyticsQueue) -> Self {
        Self::with_visit_id(flow, queue, uuid::Uuid::new_v4().to_string())
    }

    pub fn with_visit_id(flow: Arc<Flow>, queue: AnalyticsQueue, visit_id: impl Into<String>) -> Self {
        let calculator = PointsCalculator::new(&flow.gamification_settings().points);
        Self {
            visit_id: visit_id.into(),
            navigator: Navigator::new(flow.clone()),
            flow,
            bus: Arc::new(TriggerBus::new()),
            ledger: Arc::new(PointsLedger::new()),
            calculator,
            queue,
            reactors: Vec::new(),
            last_selection: None,
            slide_entered: Instant::now(),
            started: false,
            ended: false,
        }
    }

    /// Build a session that reports to the configured HTTP collector. The
    /// flow's own points table wins over the configured fallback.
    pub fn from_config(flow: Arc<Flow>, config: &SwipeflowConfig) -> FlowResult<Self> {
        flow.validate()?;
        let transport = HttpTransport::new(&config.analytics)
            .map_err(|e| FlowError::Transport(e.to_string()))?;
        let queue = AnalyticsQueue::new(QueueSettings::from_config(&config.analytics), Arc::new(transport));

        let mut session = Self::new(flow, queue);
        let flow_has_points = session
            .flow
            .gamification
            .as_ref()
            .and_then(|g| g.get("points"))
            .is_some();
        if !flow_has_points {
            session.calculator = PointsCalculator::new(&config.points);
        }
        Ok(session)
    }

    /// Attach the default effect reactors, playing through `player`.
    pub fn attach_effects(&mut self, player: Arc<dyn EffectPlayer>) {
        let reactors = EffectReactor::attach_defaults(&self.bus, self.flow.clone(), player);
        self.reactors.extend(reactors);
    }

    /// Enter the first slide.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        metrics::counter!("session.started").increment(1);
        info!(visit_id = %self.visit_id, flow_id = %self.flow.id, "flow session started");
        if let Some(slide_id) = self.current_slide_id() {
            self.enter_slide(slide_id);
        }
    }

    /// A slide-level option was picked. `element_id` is the option list
    /// hosting the options, if the slide has one.
    pub fn select_option(
        &mut self,
        element_id: Option<&str>,
        option_id: &str,
        correct: Option<bool>,
    ) -> Transition {
        self.track_interaction(json!({
            "kind": "option",
            "elementId": element_id,
            "optionId": option_id,
        }));
        self.bus.publish_kind(
            TriggerKind::OnQuestionAnswer,
            element_id,
            Some(json!({ "optionId": option_id })),
        );
        self.award_answer(element_id, correct);

        let interaction = match element_id {
            Some(element_id) => Interaction::hosted_option(element_id, option_id),
            None => Interaction::option(option_id),
        };
        self.select(interaction)
    }

    /// An item inside a questionnaire or grid was picked.
    pub fn select_item(&mut self, element_id: &str, item_id: &str, correct: Option<bool>) -> Transition {
        self.track_interaction(json!({
            "kind": "item",
            "elementId": element_id,
            "itemId": item_id,
        }));

        let kind = if self.current_item_has_action(element_id, item_id) {
            TriggerKind::OnItemAction
        } else {
            TriggerKind::OnQuestionAnswer
        };
        self.bus
            .publish_kind(kind, Some(element_id), Some(json!({ "itemId": item_id })));
        self.award_answer(Some(element_id), correct);

        self.select(Interaction::item(element_id, item_id))
    }

    pub fn click_button(&mut self, element_id: &str) -> Transition {
        self.track_interaction(json!({ "kind": "button", "elementId": element_id }));
        self.bus
            .publish_kind(TriggerKind::OnButtonClick, Some(element_id), None);
        self.activate(Interaction::element(element_id))
    }

    pub fn complete_form(&mut self, element_id: &str) -> Transition {
        self.track_interaction(json!({ "kind": "form", "elementId": element_id }));
        self.bus
            .publish_kind(TriggerKind::OnFormComplete, Some(element_id), None);
        let award = self.calculator.form_complete();
        self.credit(Some(element_id), award);
        self.activate(Interaction::element(element_id))
    }

    /// Explicit continue control; applies overrides for the last selection
    /// made on the current slide.
    pub fn continue_flow(&mut self) -> Transition {
        let selection = self.last_selection.clone();
        self.proceed(selection)
    }

    pub fn back(&mut self) -> Transition {
        let left = self.current_slide_id();
        let transition = self.navigator.back();
        self.apply(left, &transition);
        transition
    }

    /// Close the session: record time on the last slide and hand every
    /// buffered analytics event to the teardown path. Returns the number of
    /// events handed off.
    pub fn end(&mut self) -> usize {
        if self.ended {
            return 0;
        }
        self.ended = true;
        if let Some(slide_id) = self.current_slide_id() {
            self.track_time_spent(&slide_id);
        }
        for reactor in &self.reactors {
            reactor.detach();
        }
        let flushed = self.queue.shutdown();
        info!(
            visit_id = %self.visit_id,
            points = self.ledger.total(),
            flushed,
            "flow session ended"
        );
        flushed
    }

    pub fn visit_id(&self) -> &str {
        &self.visit_id
    }

    pub fn flow(&self) -> &Arc<Flow> {
        &self.flow
    }

    pub fn bus(&self) -> &Arc<TriggerBus> {
        &self.bus
    }

    pub fn ledger(&self) -> &Arc<PointsLedger> {
        &self.ledger
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn queue(&self) -> &AnalyticsQueue {
        &self.queue
    }

    /// Point values in effect for this session.
    pub fn points_config(&self) -> &PointsConfig {
        self.calculator.config()
    }

    pub fn current_slide_id(&self) -> Option<String> {
        if self.navigator.is_finished() {
            return None;
        }
        self.navigator.current_slide().map(|s| s.id.clone())
    }

    // ─── Internals ──────────────────────────────────────────────────────

    fn select(&mut self, interaction: Interaction) -> Transition {
        self.last_selection = Some(interaction.clone());
        let left = self.current_slide_id();
        let transition = self.navigator.on_select(&interaction);
        self.apply(left, &transition);
        transition
    }

    fn activate(&mut self, interaction: Interaction) -> Transition {
        let left = self.current_slide_id();
        let transition = self.navigator.on_activate(&interaction);
        self.apply(left, &transition);
        transition
    }

    fn proceed(&mut self, selection: Option<Interaction>) -> Transition {
        let left = self.current_slide_id();
        let transition = self.navigator.on_continue(selection.as_ref());
        self.apply(left, &transition);
        transition
    }

    fn apply(&mut self, left: Option<String>, transition: &Transition) {
        match transition {
            Transition::GoTo { slide_id, .. } => {
                if let Some(left) = left {
                    self.track_time_spent(&left);
                }
                self.last_selection = None;
                self.enter_slide(slide_id.clone());
            }
            Transition::End => {
                if let Some(left) = left {
                    self.track_time_spent(&left);
                }
                debug!(visit_id = %self.visit_id, "reached end of flow");
            }
            Transition::OpenUrl(url) => {
                debug!(visit_id = %self.visit_id, url = %url, "external navigation");
            }
            Transition::Stay => {}
        }
    }

    fn enter_slide(&mut self, slide_id: String) {
        self.slide_entered = Instant::now();
        self.queue
            .enqueue(AnalyticsEvent::view(self.visit_id.as_str(), slide_id.as_str()));
        if let Some(award) = self.calculator.slide_visit(&slide_id) {
            self.credit(None, award);
        }
    }

    fn track_time_spent(&self, slide_id: &str) {
        let elapsed = millis(self.slide_entered.elapsed());
        self.queue
            .enqueue(AnalyticsEvent::time_spent(self.visit_id.as_str(), slide_id, elapsed));
    }

    fn track_interaction(&self, metadata: serde_json::Value) {
        let Some(slide_id) = self.current_slide_id() else {
            return;
        };
        self.queue.enqueue(AnalyticsEvent::interaction(
            self.visit_id.as_str(),
            slide_id,
            metadata,
        ));
    }

    fn award_answer(&mut self, element_id: Option<&str>, correct: Option<bool>) {
        let award = self.calculator.answer(AnswerOutcome {
            correct,
            elapsed_ms: Some(millis(self.slide_entered.elapsed())),
        });
        self.credit(element_id, award);
    }

    /// Credit an award and relay the gain on the bus right away.
    fn credit(&self, element_id: Option<&str>, award: PointsAward) {
        let amount = i64::try_from(award.amount).unwrap_or(i64::MAX);
        let credited = self.ledger.add_points(amount, award.reason.as_str());
        if credited == 0 {
            return;
        }
        self.bus.publish_kind(
            TriggerKind::OnPointsGained,
            element_id,
            Some(json!({
                "amount": credited,
                "reason": award.reason,
                "total": self.ledger.total(),
            })),
        );
    }

    fn current_item_has_action(&self, element_id: &str, item_id: &str) -> bool {
        self.navigator
            .current_slide()
            .and_then(|slide| slide.element(element_id))
            .and_then(|element| element.item(item_id))
            .and_then(|item| item.action)
            .map(|action| action != ItemAction::None)
            .unwrap_or(false)
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl std::fmt::Debug for FlowSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowSession")
            .field("visit_id", &self.visit_id)
            .field("flow_id", &self.flow.id)
            .field("slide", &self.navigator.current_index())
            .field("points", &self.ledger.total())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use swipeflow_analytics::RecordingTransport;

    fn flow() -> Arc<Flow> {
        Arc::new(
            Flow::from_json(
                &json!({
                    "id": "f1",
                    "slides": [
                        {"id": "A", "options": [{"id": "opt1", "label": "Yes"}],
                         "logicNext": {"options": {"opt1": "C"}}},
                        {"id": "B"},
                        {"id": "C"}
                    ]
                })
                .to_string(),
            )
            .unwrap(),
        )
    }

    fn session() -> (FlowSession, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new());
        let queue = AnalyticsQueue::new(QueueSettings::default(), transport.clone());
        (FlowSession::with_visit_id(flow(), queue, "visit-1"), transport)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let (mut session, _) = session();
        session.start();
        session.start();
        assert_eq!(session.queue().pending(), 1);
        assert_eq!(session.ledger().total(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_points_gains_are_relayed() {
        let (mut session, _) = session();
        let gains = Arc::new(AtomicUsize::new(0));
        let g = gains.clone();
        let _sub = session.bus().subscribe(TriggerKind::OnPointsGained, move |_| {
            g.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        session.start();
        session.select_option(None, "opt1", None);
        // slide A visit, answer, slide C visit
        assert_eq!(gains.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_hands_off_buffer_once() {
        let (mut session, transport) = session();
        session.start();
        assert_eq!(session.end(), 2);
        assert_eq!(session.end(), 0);
        assert_eq!(transport.beacons().len(), 1);
        assert_eq!(transport.attempts(), 0);
    }

    fn config_with_fallback_points() -> SwipeflowConfig {
        let mut config = SwipeflowConfig::default();
        config.points.per_answer = 42;
        config
    }

    #[test]
    fn test_from_config_prefers_flow_points_table() {
        let flow = Flow::from_json(
            &json!({
                "id": "f2",
                "gamification": {"points": {"perAnswer": 7}},
                "slides": [{"id": "A"}]
            })
            .to_string(),
        )
        .unwrap();

        let session = FlowSession::from_config(Arc::new(flow), &config_with_fallback_points()).unwrap();
        assert_eq!(session.points_config().per_answer, 7);
        assert_eq!(session.points_config().per_form_complete, 50);
    }

    #[test]
    fn test_from_config_falls_back_to_configured_points() {
        let session = FlowSession::from_config(flow(), &config_with_fallback_points()).unwrap();
        assert_eq!(session.points_config().per_answer, 42);
        assert!(!session.visit_id().is_empty());
    }

    #[test]
    fn test_from_config_rejects_duplicate_slide_ids() {
        let flow = Flow::from_json(r#"{"id": "f3", "slides": [{"id": "A"}, {"id": "A"}]}"#).unwrap();
        let result = FlowSession::from_config(Arc::new(flow), &SwipeflowConfig::default());
        assert!(matches!(result, Err(FlowError::Validation(_))));
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1234)), 1234);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}

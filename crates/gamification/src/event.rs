use serde::{Deserialize, Serialize};

/// Semantic events carried by the trigger bus.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TriggerKind {
    OnButtonClick,
    OnQuestionAnswer,
    OnFormComplete,
    OnPointsGained,
    OnItemAction,
    /// Reserved. Subscribable, but never published by the session runtime.
    OnFlowComplete,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 6] = [
        TriggerKind::OnButtonClick,
        TriggerKind::OnQuestionAnswer,
        TriggerKind::OnFormComplete,
        TriggerKind::OnPointsGained,
        TriggerKind::OnItemAction,
        TriggerKind::OnFlowComplete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::OnButtonClick => "onButtonClick",
            TriggerKind::OnQuestionAnswer => "onQuestionAnswer",
            TriggerKind::OnFormComplete => "onFormComplete",
            TriggerKind::OnPointsGained => "onPointsGained",
            TriggerKind::OnItemAction => "onItemAction",
            TriggerKind::OnFlowComplete => "onFlowComplete",
        }
    }

    /// Whether the runtime publishes this kind on its own.
    pub fn is_auto_published(&self) -> bool {
        !matches!(self, TriggerKind::OnFlowComplete)
    }
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event envelope. `element_id` is set for element-scoped events and absent
/// for global ones; a global event never stands in for element opt-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamificationEvent {
    pub kind: TriggerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl GamificationEvent {
    pub fn for_element(kind: TriggerKind, element_id: impl Into<String>) -> Self {
        Self {
            kind,
            element_id: Some(element_id.into()),
            payload: None,
        }
    }

    pub fn global(kind: TriggerKind) -> Self {
        Self {
            kind,
            element_id: None,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn is_global(&self) -> bool {
        self.element_id.is_none()
    }
}

//! Flow document model — the read-only quiz/presentation handed to the
//! runtime by the authoring side.
//!
//! A [`Flow`] is an ordered list of [`Slide`]s. Each slide carries its
//! elements, its options, and a logic-next override map that redirects
//! specific options or element items to another slide.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FlowError, FlowResult};
use crate::gamification::{FlowGamification, GamificationOptIn};

pub type SlideId = String;

/// Build the logic-next key for an element item.
pub fn item_logic_key(element_id: &str, item_id: &str) -> String {
    format!("{element_id}-item-{item_id}")
}

// ─── Flow ───────────────────────────────────────────────────────────────────

/// The complete ordered quiz/presentation document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    pub id: String,
    #[serde(default)]
    pub slides: Vec<Slide>,
    /// Flow-level gamification block, normalized through
    /// [`Flow::gamification_settings`].
    #[serde(default)]
    pub gamification: Option<serde_json::Value>,
}

impl Flow {
    /// Parse a flow document from JSON.
    pub fn from_json(raw: &str) -> FlowResult<Self> {
        let flow: Flow = serde_json::from_str(raw)?;
        if flow.id.is_empty() {
            return Err(FlowError::Document("flow id must not be empty".into()));
        }
        Ok(flow)
    }

    pub fn slide(&self, slide_id: &str) -> Option<&Slide> {
        self.slides.iter().find(|s| s.id == slide_id)
    }

    pub fn slide_index(&self, slide_id: &str) -> Option<usize> {
        self.slides.iter().position(|s| s.id == slide_id)
    }

    pub fn contains_slide(&self, slide_id: &str) -> bool {
        self.slide_index(slide_id).is_some()
    }

    /// Locate an element by id across every slide of the flow.
    pub fn find_element(&self, element_id: &str) -> Option<(&Slide, &Element)> {
        self.slides
            .iter()
            .find_map(|slide| slide.element(element_id).map(|element| (slide, element)))
    }

    /// Fully-defaulted flow-level gamification settings.
    pub fn gamification_settings(&self) -> FlowGamification {
        FlowGamification::from_config(self.gamification.as_ref())
    }

    /// Check structural consistency: unique, non-empty slide ids.
    pub fn validate(&self) -> FlowResult<()> {
        let mut seen = HashMap::new();
        for (index, slide) in self.slides.iter().enumerate() {
            if slide.id.is_empty() {
                return Err(FlowError::Validation(format!(
                    "slide at position {index} has an empty id"
                )));
            }
            if let Some(previous) = seen.insert(slide.id.as_str(), index) {
                return Err(FlowError::Validation(format!(
                    "slide id {} used at positions {previous} and {index}",
                    slide.id
                )));
            }
        }
        Ok(())
    }
}

// ─── Slide ──────────────────────────────────────────────────────────────────

/// Per-slide override table: option id / element item key → target slide.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogicNext {
    #[serde(default)]
    pub options: HashMap<String, SlideId>,
    #[serde(default)]
    pub elements: HashMap<String, SlideId>,
}

impl LogicNext {
    pub fn is_empty(&self) -> bool {
        self.options.is_empty() && self.elements.is_empty()
    }
}

/// One screen of a flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    pub id: SlideId,
    #[serde(default)]
    pub elements: Vec<Element>,
    #[serde(default)]
    pub options: Vec<FlowOption>,
    #[serde(default)]
    pub logic_next: LogicNext,
    /// When set, interactions on this slide never navigate automatically.
    #[serde(default)]
    pub lock_slide: bool,
}

impl Slide {
    pub fn element(&self, element_id: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == element_id)
    }

    pub fn option(&self, option_id: &str) -> Option<&FlowOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    /// Logic-next keys whose option/item or target slide no longer exists.
    /// These are ignored at navigation time; this is for diagnostics.
    pub fn dangling_logic_keys(&self, flow: &Flow) -> Vec<String> {
        let mut dangling: Vec<String> = self
            .logic_next
            .options
            .iter()
            .filter(|(option_id, target)| {
                self.option(option_id).is_none() || !flow.contains_slide(target)
            })
            .map(|(key, _)| key.clone())
            .collect();

        let item_keys: Vec<String> = self
            .elements
            .iter()
            .flat_map(|element| {
                element
                    .items()
                    .into_iter()
                    .map(move |item| item_logic_key(&element.id, &item.id))
            })
            .collect();

        dangling.extend(
            self.logic_next
                .elements
                .iter()
                .filter(|(key, target)| !item_keys.contains(key) || !flow.contains_slide(target))
                .map(|(key, _)| key.clone()),
        );
        dangling.sort();
        dangling
    }
}

/// A selectable answer attached directly to a slide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowOption {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub emoji: Option<String>,
}

// ─── Elements ───────────────────────────────────────────────────────────────

/// Element type tag. Unknown tags are kept as [`ElementKind::Other`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementKind {
    OptionList,
    Questionnaire,
    QuestionGrid,
    Form,
    Button,
    Text,
    Image,
    #[serde(other)]
    Other,
}

/// Selection capability of an interactive element. Multi-selection elements
/// never navigate on toggle; only an explicit continue control advances.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    #[default]
    Single,
    Multiple,
}

impl SelectionMode {
    pub fn navigates_on_select(&self) -> bool {
        matches!(self, SelectionMode::Single)
    }
}

/// A typed content block on a slide. `config` is opaque authoring data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    #[serde(default)]
    pub selection: SelectionMode,
    #[serde(default)]
    pub lock_slide: bool,
    #[serde(default)]
    pub config: serde_json::Value,
}

impl Element {
    /// Per-element gamification opt-in, `None` when absent or malformed.
    pub fn gamification(&self) -> Option<GamificationOptIn> {
        GamificationOptIn::from_config(&self.config)
    }

    /// Items declared in the element config. Malformed entries are skipped.
    pub fn items(&self) -> Vec<Item> {
        let Some(raw) = self.config.get("items").and_then(|v| v.as_array()) else {
            return Vec::new();
        };
        raw.iter()
            .filter_map(|value| match serde_json::from_value::<Item>(value.clone()) {
                Ok(item) => Some(item),
                Err(e) => {
                    debug!(element_id = %self.id, error = %e, "skipping malformed item");
                    None
                }
            })
            .collect()
    }

    pub fn item(&self, item_id: &str) -> Option<Item> {
        self.items().into_iter().find(|i| i.id == item_id)
    }
}

/// A row/entry inside a QUESTIONNAIRE or QUESTION_GRID element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub action: Option<ItemAction>,
}

/// Item-level action. Takes precedence over the slide's logic-next map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "target")]
pub enum ItemAction {
    None,
    Slide(SlideId),
    Url(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_flow() -> Flow {
        serde_json::from_value(json!({
            "id": "flow-1",
            "slides": [
                {
                    "id": "A",
                    "options": [{"id": "opt1", "label": "Yes", "emoji": "👍"}],
                    "elements": [{
                        "id": "q1",
                        "type": "QUESTIONNAIRE",
                        "config": {"items": [
                            {"id": "i1", "label": "First", "action": {"type": "slide", "target": "C"}},
                            {"id": "i2", "label": "Second"},
                            {"label": "missing id"}
                        ]}
                    }],
                    "logicNext": {
                        "options": {"opt1": "C", "ghost": "B"},
                        "elements": {"q1-item-i2": "B", "q1-item-i9": "B"}
                    }
                },
                {"id": "B"},
                {"id": "C", "elements": [{"id": "w", "type": "SPINNER_WHEEL"}]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_find_element_across_slides() {
        let flow = sample_flow();
        let (slide, element) = flow.find_element("w").unwrap();
        assert_eq!(slide.id, "C");
        assert_eq!(element.kind, ElementKind::Other);
        assert!(flow.find_element("nope").is_none());
    }

    #[test]
    fn test_items_skip_malformed_entries() {
        let flow = sample_flow();
        let (_, element) = flow.find_element("q1").unwrap();
        let items = element.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].action, Some(ItemAction::Slide("C".into())));
        assert_eq!(items[1].action, None);
    }

    #[test]
    fn test_dangling_logic_keys() {
        let flow = sample_flow();
        let slide = flow.slide("A").unwrap();
        assert_eq!(slide.dangling_logic_keys(&flow), vec!["ghost", "q1-item-i9"]);
    }

    #[test]
    fn test_selection_defaults_to_single() {
        let flow = sample_flow();
        let (_, element) = flow.find_element("q1").unwrap();
        assert_eq!(element.selection, SelectionMode::Single);
        assert!(element.selection.navigates_on_select());
        assert!(!SelectionMode::Multiple.navigates_on_select());
    }

    #[test]
    fn test_validate_rejects_duplicate_slide_ids() {
        let mut flow = sample_flow();
        assert!(flow.validate().is_ok());
        flow.slides.push(Slide {
            id: "B".into(),
            elements: vec![],
            options: vec![],
            logic_next: LogicNext::default(),
            lock_slide: false,
        });
        assert!(matches!(flow.validate(), Err(FlowError::Validation(_))));
    }

    #[test]
    fn test_from_json_requires_id() {
        assert!(Flow::from_json(r#"{"id": "", "slides": []}"#).is_err());
        assert!(Flow::from_json("not json").is_err());
        let flow = Flow::from_json(r#"{"id": "f", "slides": [{"id": "s1"}]}"#).unwrap();
        assert_eq!(flow.slide_index("s1"), Some(0));
    }
}

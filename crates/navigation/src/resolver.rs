use serde::{Deserialize, Serialize};
use tracing::debug;

use swipeflow_core::flow::{item_logic_key, Flow, ItemAction, Slide, SlideId};

/// A user interaction that may move the flow forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Interaction {
    /// A slide-level option was selected, optionally through the option
    /// list element hosting it.
    Option {
        option_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        element_id: Option<String>,
    },
    /// An item inside a questionnaire/grid element was selected.
    Item { element_id: String, item_id: String },
    /// An element was activated as a whole (button click, form submit).
    Element { element_id: String },
    /// An explicit continue control with no selection attached.
    Continue,
}

impl Interaction {
    pub fn option(option_id: impl Into<String>) -> Self {
        Interaction::Option {
            option_id: option_id.into(),
            element_id: None,
        }
    }

    /// An option picked through its hosting element, so the element's
    /// selection mode and lock apply.
    pub fn hosted_option(element_id: impl Into<String>, option_id: impl Into<String>) -> Self {
        Interaction::Option {
            option_id: option_id.into(),
            element_id: Some(element_id.into()),
        }
    }

    pub fn item(element_id: impl Into<String>, item_id: impl Into<String>) -> Self {
        Interaction::Item {
            element_id: element_id.into(),
            item_id: item_id.into(),
        }
    }

    pub fn element(element_id: impl Into<String>) -> Self {
        Interaction::Element {
            element_id: element_id.into(),
        }
    }

    /// Element the interaction originated from, if any.
    pub fn element_id(&self) -> Option<&str> {
        match self {
            Interaction::Item { element_id, .. } | Interaction::Element { element_id } => {
                Some(element_id.as_str())
            }
            Interaction::Option { element_id, .. } => element_id.as_deref(),
            Interaction::Continue => None,
        }
    }
}

/// Result of the override lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextSlide {
    /// Jump to this slide. Always a slide present in the flow.
    Slide(SlideId),
    /// Advance to the next slide in flow order, or end.
    Sequential,
}

/// Result of full resolution including item actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Slide(SlideId),
    Sequential,
    Url(String),
}

impl From<NextSlide> for Destination {
    fn from(next: NextSlide) -> Self {
        match next {
            NextSlide::Slide(id) => Destination::Slide(id),
            NextSlide::Sequential => Destination::Sequential,
        }
    }
}

/// Pure navigation resolver. Knows nothing about locking or selection modes;
/// the caller decides whether to ask.
#[derive(Debug, Clone, Default)]
pub struct NavigationResolver;

impl NavigationResolver {
    pub fn new() -> Self {
        Self
    }

    /// Look the interaction up in the slide's logic-next map.
    ///
    /// Missing keys and targets that no longer exist both yield
    /// [`NextSlide::Sequential`].
    pub fn resolve_next(&self, flow: &Flow, slide: &Slide, interaction: &Interaction) -> NextSlide {
        let target = match interaction {
            Interaction::Option { option_id, .. } => slide.logic_next.options.get(option_id),
            Interaction::Item {
                element_id,
                item_id,
            } => slide
                .logic_next
                .elements
                .get(&item_logic_key(element_id, item_id)),
            Interaction::Element { .. } | Interaction::Continue => None,
        };

        match target {
            Some(target) if flow.contains_slide(target) => NextSlide::Slide(target.clone()),
            Some(target) => {
                debug!(
                    slide_id = %slide.id,
                    target = %target,
                    "logic-next target no longer exists, advancing sequentially"
                );
                NextSlide::Sequential
            }
            None => NextSlide::Sequential,
        }
    }

    /// Item-level action for an item interaction, ignoring `none` actions.
    pub fn resolve_item_action(
        &self,
        slide: &Slide,
        element_id: &str,
        item_id: &str,
    ) -> Option<ItemAction> {
        let item = slide.element(element_id)?.item(item_id)?;
        match item.action {
            Some(ItemAction::None) | None => None,
            Some(action) => Some(action),
        }
    }

    /// Full resolution: item action, then logic-next map, then sequential.
    pub fn resolve(&self, flow: &Flow, slide: &Slide, interaction: &Interaction) -> Destination {
        if let Interaction::Item {
            element_id,
            item_id,
        } = interaction
        {
            match self.resolve_item_action(slide, element_id, item_id) {
                Some(ItemAction::Url(url)) if !url.is_empty() => return Destination::Url(url),
                Some(ItemAction::Slide(target)) if flow.contains_slide(&target) => {
                    return Destination::Slide(target)
                }
                Some(action) => {
                    debug!(
                        element_id = %element_id,
                        item_id = %item_id,
                        ?action,
                        "item action target unusable, falling back to logic-next"
                    );
                }
                None => {}
            }
        }

        self.resolve_next(flow, slide, interaction).into()
    }
}

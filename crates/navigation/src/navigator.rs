use std::sync::Arc;

use tracing::{debug, info};

use swipeflow_core::flow::{Flow, Slide, SlideId};

use crate::resolver::{Destination, Interaction, NavigationResolver};

/// What the presentation layer should do after an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    GoTo { index: usize, slide_id: SlideId },
    OpenUrl(String),
    /// Remain on the current slide.
    Stay,
    /// Past the last slide.
    End,
}

/// Tracks the viewer's position in a flow and decides when the resolver is
/// consulted. Locked slides/elements and multi-selection elements never
/// navigate on selection; explicit continue controls always do.
#[derive(Debug, Clone)]
pub struct Navigator {
    flow: Arc<Flow>,
    resolver: NavigationResolver,
    current: usize,
    history: Vec<usize>,
    finished: bool,
}

impl Navigator {
    pub fn new(flow: Arc<Flow>) -> Self {
        Self {
            flow,
            resolver: NavigationResolver::new(),
            current: 0,
            history: Vec::new(),
            finished: false,
        }
    }

    pub fn flow(&self) -> &Arc<Flow> {
        &self.flow
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_slide(&self) -> Option<&Slide> {
        self.flow.slides.get(self.current)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fraction of the flow reached, in `[0.0, 1.0]`.
    pub fn progress(&self) -> f64 {
        let total = self.flow.slides.len();
        if total == 0 || self.finished {
            return 1.0;
        }
        (self.current + 1) as f64 / total as f64
    }

    /// Whether the current slide, or the element behind `interaction`,
    /// declares `lock_slide`.
    pub fn is_locked(&self, interaction: &Interaction) -> bool {
        let Some(slide) = self.current_slide() else {
            return true;
        };
        slide.lock_slide
            || interaction
                .element_id()
                .and_then(|id| slide.element(id))
                .map(|element| element.lock_slide)
                .unwrap_or(false)
    }

    /// Whether selecting through `interaction` must not navigate on its own.
    pub fn suppresses_auto_navigation(&self, interaction: &Interaction) -> bool {
        if self.is_locked(interaction) {
            return true;
        }
        self.current_slide()
            .and_then(|slide| interaction.element_id().and_then(|id| slide.element(id)))
            .map(|element| !element.selection.navigates_on_select())
            .unwrap_or(false)
    }

    /// Automatic navigation after a selection.
    pub fn on_select(&mut self, interaction: &Interaction) -> Transition {
        if self.finished {
            return Transition::End;
        }
        if self.suppresses_auto_navigation(interaction) {
            debug!(
                slide_index = self.current,
                ?interaction,
                "auto-navigation suppressed"
            );
            return Transition::Stay;
        }
        self.advance(interaction)
    }

    /// Navigation triggered by activating an element as a whole (button
    /// click, form submit). Locks apply; selection mode does not.
    pub fn on_activate(&mut self, interaction: &Interaction) -> Transition {
        if self.finished {
            return Transition::End;
        }
        if self.is_locked(interaction) {
            debug!(slide_index = self.current, ?interaction, "locked, activation does not navigate");
            return Transition::Stay;
        }
        self.advance(interaction)
    }

    /// Explicit continue control. `selection` is the last selection made on
    /// the slide, if any, so overrides still apply to multi-select answers.
    pub fn on_continue(&mut self, selection: Option<&Interaction>) -> Transition {
        if self.finished {
            return Transition::End;
        }
        self.advance(selection.unwrap_or(&Interaction::Continue))
    }

    /// Jump straight to a slide by id. Unknown ids leave the position as is.
    pub fn go_to(&mut self, slide_id: &str) -> Transition {
        match self.flow.slide_index(slide_id) {
            Some(index) => self.move_to(index),
            None => {
                debug!(slide_id, "go_to unknown slide ignored");
                Transition::Stay
            }
        }
    }

    /// Return to the previously shown slide.
    pub fn back(&mut self) -> Transition {
        match self.history.pop() {
            Some(index) => {
                self.finished = false;
                self.current = index;
                Transition::GoTo {
                    index,
                    slide_id: self.flow.slides[index].id.clone(),
                }
            }
            None => Transition::Stay,
        }
    }

    fn advance(&mut self, interaction: &Interaction) -> Transition {
        let Some(slide) = self.current_slide() else {
            self.finished = true;
            return Transition::End;
        };

        match self.resolver.resolve(&self.flow, slide, interaction) {
            Destination::Url(url) => Transition::OpenUrl(url),
            Destination::Slide(target) => match self.flow.slide_index(&target) {
                Some(index) => self.move_to(index),
                None => self.next_sequential(),
            },
            Destination::Sequential => self.next_sequential(),
        }
    }

    fn next_sequential(&mut self) -> Transition {
        let next = self.current + 1;
        if next < self.flow.slides.len() {
            self.move_to(next)
        } else {
            info!(flow_id = %self.flow.id, "flow finished");
            self.finished = true;
            Transition::End
        }
    }

    fn move_to(&mut self, index: usize) -> Transition {
        self.history.push(self.current);
        self.current = index;
        self.finished = false;
        Transition::GoTo {
            index,
            slide_id: self.flow.slides[index].id.clone(),
        }
    }
}

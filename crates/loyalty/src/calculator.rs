//! Points calculator: turns session activity into point amounts using the
//! flow's [`PointsConfig`]. Stateless with respect to the ledger; it only
//! tracks the answer streak and which slides were already rewarded.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use swipeflow_core::points::PointsConfig;

/// What is known about an answer when it is given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    /// `None` when the question has no right answer.
    pub correct: Option<bool>,
    /// Time from slide entry to answer.
    pub elapsed_ms: Option<u64>,
}

/// A computed award, ready to be added to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointsAward {
    pub amount: u64,
    pub reason: String,
    pub multiplier: f64,
    pub streak: u32,
}

#[derive(Debug, Clone)]
pub struct PointsCalculator {
    config: PointsConfig,
    streak: u32,
    visited: HashSet<String>,
}

impl PointsCalculator {
    pub fn new(config: &PointsConfig) -> Self {
        Self {
            config: config.clone(),
            streak: 0,
            visited: HashSet::new(),
        }
    }

    /// Award for an answer, applying streak and time-bonus multipliers.
    pub fn answer(&mut self, outcome: AnswerOutcome) -> PointsAward {
        let mut base = self.config.per_answer as u64;
        let reason = match outcome.correct {
            Some(true) => {
                self.streak += 1;
                base += self.config.per_correct as u64;
                "answer_correct"
            }
            Some(false) => {
                self.streak = 0;
                base += self.config.per_wrong as u64;
                "answer_wrong"
            }
            None => "answer",
        };

        let mut rate = 1.0;

        // Streak bonus from the second consecutive correct answer.
        if outcome.correct == Some(true) && self.streak >= 2 {
            rate *= self.config.streak_multiplier;
        }

        if outcome
            .elapsed_ms
            .map(|ms| ms <= self.config.time_bonus_window_ms)
            .unwrap_or(false)
        {
            rate *= self.config.time_bonus_multiplier;
        }

        let amount = (base as f64 * rate).round().max(0.0) as u64;

        debug!(
            base = base,
            rate = rate,
            streak = self.streak,
            amount = amount,
            "answer points computed"
        );

        PointsAward {
            amount,
            reason: reason.to_string(),
            multiplier: rate,
            streak: self.streak,
        }
    }

    pub fn form_complete(&self) -> PointsAward {
        PointsAward {
            amount: self.config.per_form_complete as u64,
            reason: "form_complete".to_string(),
            multiplier: 1.0,
            streak: self.streak,
        }
    }

    /// Award for entering a slide, once per slide per session.
    pub fn slide_visit(&mut self, slide_id: &str) -> Option<PointsAward> {
        if !self.visited.insert(slide_id.to_string()) {
            return None;
        }
        Some(PointsAward {
            amount: self.config.per_slide_visit as u64,
            reason: format!("slide_visit:{slide_id}"),
            multiplier: 1.0,
            streak: self.streak,
        })
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn config(&self) -> &PointsConfig {
        &self.config
    }
}

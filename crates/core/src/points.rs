//! Point-value configuration. The ledger only accumulates amounts; how many
//! points an action is worth is decided from this table.
//!
//! Flow documents use camelCase keys; the snake_case aliases cover values
//! loaded from `SWIPEFLOW__POINTS__*` environment variables.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PointsConfig {
    #[serde(alias = "per_answer")]
    pub per_answer: u32,
    #[serde(alias = "per_correct")]
    pub per_correct: u32,
    #[serde(alias = "per_wrong")]
    pub per_wrong: u32,
    #[serde(alias = "per_form_complete")]
    pub per_form_complete: u32,
    #[serde(alias = "per_slide_visit")]
    pub per_slide_visit: u32,
    /// Applied when an answer lands inside `time_bonus_window_ms`.
    #[serde(alias = "time_bonus_multiplier")]
    pub time_bonus_multiplier: f64,
    #[serde(alias = "time_bonus_window_ms")]
    pub time_bonus_window_ms: u64,
    /// Applied from the second consecutive correct answer on.
    #[serde(alias = "streak_multiplier")]
    pub streak_multiplier: f64,
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            per_answer: 10,
            per_correct: 20,
            per_wrong: 0,
            per_form_complete: 50,
            per_slide_visit: 5,
            time_bonus_multiplier: 1.5,
            time_bonus_window_ms: 5000,
            streak_multiplier: 1.2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_table_keeps_defaults() {
        let config: PointsConfig =
            serde_json::from_str(r#"{"perAnswer": 3, "streak_multiplier": 2.0}"#).unwrap();
        assert_eq!(config.per_answer, 3);
        assert_eq!(config.streak_multiplier, 2.0);
        assert_eq!(config.per_form_complete, 50);
    }
}

use serde::Deserialize;

use crate::points::PointsConfig;

/// Root runtime configuration. Loaded from environment variables with the
/// prefix `SWIPEFLOW__`.
#[derive(Debug, Clone, Deserialize)]
pub struct SwipeflowConfig {
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    /// Fallback point values for flows that carry no points table.
    #[serde(default)]
    pub points: PointsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_endpoint() -> String {
    "http://localhost:8080".to_string()
}
fn default_debounce_ms() -> u64 {
    2000
}
fn default_max_batch_size() -> usize {
    10
}
fn default_max_retries() -> u32 {
    3
}
fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            debounce_ms: default_debounce_ms(),
            max_batch_size: default_max_batch_size(),
            max_retries: default_max_retries(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for SwipeflowConfig {
    fn default() -> Self {
        Self {
            analytics: AnalyticsConfig::default(),
            points: PointsConfig::default(),
        }
    }
}

impl SwipeflowConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("SWIPEFLOW")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SwipeflowConfig::default();
        assert_eq!(config.analytics.debounce_ms, 2000);
        assert_eq!(config.analytics.max_batch_size, 10);
        assert_eq!(config.analytics.max_retries, 3);
        assert_eq!(config.points.per_answer, 10);
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: SwipeflowConfig =
            serde_json::from_str(r#"{"analytics": {"max_batch_size": 25}}"#).unwrap();
        assert_eq!(config.analytics.max_batch_size, 25);
        assert_eq!(config.analytics.endpoint, "http://localhost:8080");
        assert_eq!(config.points, PointsConfig::default());
    }
}

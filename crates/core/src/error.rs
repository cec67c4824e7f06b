use thiserror::Error;

pub type FlowResult<T> = Result<T, FlowError>;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Flow document error: {0}")]
    Document(String),

    #[error("Flow validation error: {0}")]
    Validation(String),

    #[error("Analytics transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for FlowError {
    fn from(err: config::ConfigError) -> Self {
        FlowError::Config(err.to_string())
    }
}

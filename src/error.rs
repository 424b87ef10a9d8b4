use thiserror::Error;

/// Errors raised by the dataflow engine.
///
/// Non-numeric payloads, out-of-domain inputs and a full queue are not errors;
/// the engine ignores or blocks on them instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid topic name: {0:?}")]
    InvalidTopicName(String),

    #[error("invalid configuration for `{agent}`: {reason}")]
    InvalidConfiguration { agent: String, reason: String },

    #[error("unknown agent type `{0}`")]
    UnknownAgentType(String),

    #[error("malformed configuration: {0}")]
    MalformedConfiguration(String),

    #[error("wiring contains a cycle: {}", .0.join(" -> "))]
    CycleDetected(Vec<String>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn invalid_configuration(agent: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::InvalidConfiguration {
            agent: agent.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

//! Error types for the vaani agent.

use crate::pipeline::messages::Timestamp;

/// Top-level error type for the sales voice agent.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Turn-taking configuration rejected at construction.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An event arrived with a timestamp earlier than the last processed one.
    #[error("out-of-order event at {at} (last processed {last})")]
    OutOfOrderEvent {
        /// Timestamp carried by the rejected event.
        at: Timestamp,
        /// Timestamp of the last processed event.
        last: Timestamp,
    },

    /// A lifecycle command that does not apply to the current state.
    #[error("spurious command: {0}")]
    SpuriousCommand(&'static str),

    /// Configuration file error.
    #[error("config error: {0}")]
    Config(String),

    /// Sales prompt loading error.
    #[error("prompt error: {0}")]
    Prompt(String),

    /// Event trace parsing error.
    #[error("trace error: {0}")]
    Trace(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AgentError>;

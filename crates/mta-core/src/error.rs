//! Error types for the orchestration engine.

use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("scenario not found: {0}")]
    InvalidScenario(String),

    #[error("maximum concurrent tests reached")]
    MaxTestsReached,

    #[error("test not found: {0}")]
    TestNotFound(Uuid),

    #[error("invalid status transition: {0}")]
    InvalidStatus(String),

    #[error("test is active and cannot be deleted: {0}")]
    TestActive(Uuid),

    #[error("LLM provider error: {0}")]
    Llm(String),

    #[error("game client error: {0}")]
    GameClient(String),

    #[error("voice coordination error: {0}")]
    Voice(String),

    #[error("storage error: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    pub fn llm(msg: impl Into<String>) -> Self {
        EngineError::Llm(msg.into())
    }

    pub fn game_client(msg: impl Into<String>) -> Self {
        EngineError::GameClient(msg.into())
    }

    pub fn voice(msg: impl Into<String>) -> Self {
        EngineError::Voice(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        EngineError::Store(msg.into())
    }

    /// `§6.1`/`§7` machine-readable error codes for the HTTP boundary.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            EngineError::InvalidScenario(_) => Some("INVALID_SCENARIO"),
            EngineError::MaxTestsReached => Some("MAX_TESTS_REACHED"),
            EngineError::TestNotFound(_) => Some("TEST_NOT_FOUND"),
            EngineError::InvalidStatus(_) => Some("INVALID_STATUS"),
            EngineError::TestActive(_) => Some("TEST_ACTIVE"),
            _ => None,
        }
    }
}

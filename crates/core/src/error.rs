// Application error type shared by core and the adapters

use crate::domain::DomainError;
use crate::port::EngineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Illegal pipeline or record transition
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Engine call failed (transport, rejection or timeout)
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Job store failure; adapters flatten their driver errors into this
    #[error("Database error: {0}")]
    Database(String),

    /// Bad caller input (RPC params)
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A pipeline run is already active
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Another run holds the pipeline; retrying later can succeed
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

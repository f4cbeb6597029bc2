use thiserror::Error;

use crate::store::EntityKind;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("entity store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("entity store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid entity payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("not signed in")]
    Unauthenticated,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A page-level load that failed or ran past its budget.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{message}")]
    TimedOut { message: &'static str },

    #[error("{message}")]
    Failed {
        message: &'static str,
        #[source]
        source: StoreError,
    },
}

impl LoadError {
    /// Text shown next to the retry affordance.
    pub fn user_message(&self) -> &'static str {
        match self {
            LoadError::TimedOut { message } | LoadError::Failed { message, .. } => message,
        }
    }
}

/// Failures talking to the hosted LLM / file-extraction integrations.
#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("integration returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("integration request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid integration payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Extraction(String),
}

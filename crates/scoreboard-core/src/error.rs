use thiserror::Error;

use crate::store::EntityKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("mutation failed: {0}")]
    Mutation(String),
    #[error("malformed {kind} record: {message}")]
    Malformed { kind: EntityKind, message: String },
    #[error("subscription failed: {0}")]
    Subscription(String),
}

impl StoreError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn malformed(kind: EntityKind, message: impl Into<String>) -> Self {
        Self::Malformed {
            kind,
            message: message.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

pub(crate) mod alerts;
pub(crate) mod attempts;
pub(crate) mod catalog;
pub(crate) mod content_import;
pub(crate) mod fanout;
pub(crate) mod grading;
pub(crate) mod hierarchy;
pub(crate) mod identity;
pub(crate) mod participation;
pub(crate) mod reports;

use thiserror::Error;

use crate::repositories::StoreError;

#[derive(Debug, Error)]
pub(crate) enum EngineError {
    /// The request names no scope the engine can report on (e.g. a teacher
    /// with no course assignment). Fatal for the request.
    #[error("{0}")]
    MissingScope(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("report request cancelled")]
    Cancelled,
}

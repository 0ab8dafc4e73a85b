use thiserror::Error;

/// Failure of a repository fetch or patch. `NotFound` and `PermissionDenied`
/// are surfaced to the caller and never retried; `Backend` covers
/// network/storage failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("backend failure: {0}")]
    Backend(String),
}

/// Platform could not schedule or cancel an alarm. Best-effort batch
/// operations log and swallow these so one bad alarm does not abort the rest.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("platform rejected alarm: {0}")]
    Platform(String),
}

#[derive(Debug, Error)]
pub enum CareError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

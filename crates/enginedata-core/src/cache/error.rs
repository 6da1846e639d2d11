//! Project loading errors

use thiserror::Error;

use crate::diagnostics::ParseError;

/// Errors reported by a [`ProjectSource`](super::ProjectSource)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// No project with this id exists
    #[error("Project not found: {0}")]
    NotFound(String),

    /// Reading the project failed
    #[error("I/O error: {0}")]
    IoError(String),

    /// Project text could not be parsed
    #[error("Invalid project data: {0}")]
    InvalidProject(#[from] ParseError),

    /// Remote source failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The fetch task stopped before producing a result
    #[error("Fetch ended without a result")]
    Interrupted,
}

/// Errors surfaced by a [`ProjectStore`](super::ProjectStore)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// Loading the project failed
    #[error("Failed to load project '{project_id}': {reason}")]
    ProjectFetchFailed {
        /// Project that failed to load
        project_id: String,
        /// Underlying fetch error
        reason: FetchError,
    },
}

impl CacheError {
    pub(crate) fn fetch_failed(project_id: &str, reason: FetchError) -> Self {
        CacheError::ProjectFetchFailed {
            project_id: project_id.to_string(),
            reason,
        }
    }
}

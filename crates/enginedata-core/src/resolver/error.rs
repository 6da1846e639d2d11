//! Reference resolution errors

use thiserror::Error;

use crate::cache::{CacheError, FetchError};

/// Why a single reference could not be resolved
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// The project has no calculation with this id
    #[error("Calculation {calculation_id} not found in project {project_id}")]
    CalculationNotFound {
        /// Project that was searched
        project_id: String,
        /// Marker id that was looked up
        calculation_id: String,
    },

    /// The referenced project could not be loaded
    #[error("Failed to load project '{project_id}': {reason}")]
    ProjectFetchFailed {
        /// Project that failed to load
        project_id: String,
        /// Underlying fetch error
        reason: FetchError,
    },

    /// The resolution task panicked or was cancelled
    #[error("Resolution task failed: {0}")]
    TaskFailed(String),
}

impl From<CacheError> for ResolveError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::ProjectFetchFailed { project_id, reason } => {
                ResolveError::ProjectFetchFailed { project_id, reason }
            }
        }
    }
}

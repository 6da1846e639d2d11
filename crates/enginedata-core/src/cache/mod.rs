//! Project Loading and Caching
//!
//! Seams between the core and whatever supplies parsed projects:
//! - [`ProjectSource`]: fetches one project (transport, disk, test double)
//! - [`ProjectStore`]: what the resolver loads projects through
//!
//! [`ProjectCache`] is the default store; [`UncachedStore`] fetches on every
//! request; [`DirectorySource`] reads result files from a local directory.

mod directory;
mod error;
mod project_cache;
mod uncached;

pub use directory::DirectorySource;
pub use error::{CacheError, FetchError};
pub use project_cache::{EntryState, ProjectCache};
pub use uncached::UncachedStore;

use async_trait::async_trait;
use std::sync::Arc;

use crate::results::EngineProject;

/// Supplies parsed projects by id
#[async_trait]
pub trait ProjectSource: Send + Sync {
    /// Fetch and parse one project. Timeouts are the implementation's concern.
    async fn fetch_project(&self, project_id: &str) -> Result<EngineProject, FetchError>;
}

/// Loads projects on behalf of the resolver
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Return the project, fetching it first if needed
    async fn ensure_loaded(&self, project_id: &str) -> Result<Arc<EngineProject>, CacheError>;

    /// Return the project only if it is already available
    fn get(&self, project_id: &str) -> Option<Arc<EngineProject>>;

    /// Forget the project so the next load fetches it again
    fn invalidate(&self, project_id: &str);
}

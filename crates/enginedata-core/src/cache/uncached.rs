//! Pass-through store without caching

use async_trait::async_trait;
use std::sync::Arc;

use super::{CacheError, ProjectSource, ProjectStore};
use crate::results::EngineProject;

/// Fetches from the source on every request
#[derive(Clone)]
pub struct UncachedStore {
    source: Arc<dyn ProjectSource>,
}

impl UncachedStore {
    /// Store that fetches from `source` on every call
    pub fn new(source: Arc<dyn ProjectSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl ProjectStore for UncachedStore {
    async fn ensure_loaded(&self, project_id: &str) -> Result<Arc<EngineProject>, CacheError> {
        let project = self
            .source
            .fetch_project(project_id)
            .await
            .map_err(|reason| CacheError::fetch_failed(project_id, reason))?;
        project
            .validate()
            .map_err(|e| CacheError::fetch_failed(project_id, e.into()))?;
        Ok(Arc::new(project))
    }

    fn get(&self, _project_id: &str) -> Option<Arc<EngineProject>> {
        None
    }

    fn invalidate(&self, _project_id: &str) {}
}

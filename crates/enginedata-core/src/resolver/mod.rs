//! Cross-Project Reference Resolution
//!
//! Turns a list of [`CalculationReference`]s, possibly spanning many projects,
//! into references carrying their data points. Projects are loaded through a
//! [`ProjectStore`]; references are resolved concurrently but reported in
//! input order, and one failing reference never stops the others.

mod error;
mod reference;

pub use error::ResolveError;
pub use reference::{count_resolved, resolved_only, CalculationReference};

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use crate::cache::ProjectStore;
use crate::config::IngestConfig;
use crate::results::sorted_by_rpm;

/// Running count of finished references
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolveProgress {
    /// References finished so far, successes and failures alike
    pub completed: usize,
    /// References in the request
    pub total: usize,
}

impl ResolveProgress {
    /// True once every reference has finished
    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}

/// A reference that could not be resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveFailure {
    /// Position of the reference in the input list
    pub index: usize,
    /// The reference as given
    pub reference: CalculationReference,
    /// Why it failed
    pub error: ResolveError,
}

/// Result of one `resolve` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveOutcome {
    /// References carrying data, in input order
    pub resolved: Vec<CalculationReference>,
    /// References that failed, in input order
    pub failures: Vec<ResolveFailure>,
}

impl ResolveOutcome {
    /// True when every reference resolved
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// One `project → calculation: reason` line per failure, or `None`
    pub fn failure_summary(&self) -> Option<String> {
        if self.failures.is_empty() {
            return None;
        }
        let lines: Vec<String> = self
            .failures
            .iter()
            .map(|f| format!("{}: {}", f.reference.label(), f.error))
            .collect();
        Some(lines.join("\n"))
    }
}

/// Resolves calculation references through a shared [`ProjectStore`]
#[derive(Clone)]
pub struct ReferenceResolver {
    store: Arc<dyn ProjectStore>,
    max_concurrent: usize,
    sort_by_rpm: bool,
}

impl ReferenceResolver {
    /// Resolver with default settings
    pub fn new(store: Arc<dyn ProjectStore>) -> Self {
        Self::with_config(store, &IngestConfig::default())
    }

    /// Resolver bounded by `config.max_concurrent_fetches`
    pub fn with_config(store: Arc<dyn ProjectStore>, config: &IngestConfig) -> Self {
        Self {
            store,
            max_concurrent: config.max_concurrent_fetches.max(1),
            sort_by_rpm: false,
        }
    }

    /// Sort newly attached data by ascending RPM instead of keeping file order
    pub fn sort_by_rpm(mut self, sort: bool) -> Self {
        self.sort_by_rpm = sort;
        self
    }

    /// Resolve `references` without progress reporting
    pub async fn resolve(&self, references: &[CalculationReference]) -> ResolveOutcome {
        let (progress, _) = watch::channel(ResolveProgress::default());
        self.resolve_with_progress(references, &progress).await
    }

    /// Resolve `references`, publishing progress after every finished reference.
    ///
    /// Dropping every receiver of `progress` only stops the updates. Dropping
    /// the returned future abandons the remaining lookups but never cancels a
    /// project fetch the store already started.
    pub async fn resolve_with_progress(
        &self,
        references: &[CalculationReference],
        progress: &watch::Sender<ResolveProgress>,
    ) -> ResolveOutcome {
        let total = references.len();
        let mut completed = 0;
        let mut results: Vec<Option<Result<CalculationReference, ResolveError>>> =
            (0..total).map(|_| None).collect();
        let publish = |completed: usize| {
            // No receivers left is fine
            let _ = progress.send(ResolveProgress { completed, total });
        };
        publish(0);

        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();
        for (index, reference) in references.iter().enumerate() {
            if reference.is_resolved() {
                results[index] = Some(Ok(reference.clone()));
                completed += 1;
                publish(completed);
                continue;
            }

            let store = Arc::clone(&self.store);
            let permits = Arc::clone(&permits);
            let reference = reference.clone();
            let sort = self.sort_by_rpm;
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let result = resolve_one(store.as_ref(), &reference, sort).await;
                (index, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => tracing::error!(error = %e, "reference resolution task failed"),
            }
            completed += 1;
            publish(completed);
        }

        let mut outcome = ResolveOutcome::default();
        for (index, (reference, result)) in references.iter().zip(results).enumerate() {
            let result = result
                .unwrap_or_else(|| Err(ResolveError::TaskFailed("task did not complete".into())));
            match result {
                Ok(resolved) => outcome.resolved.push(resolved),
                Err(error) => {
                    tracing::warn!(
                        project = %reference.project_id,
                        calculation = %reference.calculation_id,
                        %error,
                        "reference not resolved"
                    );
                    outcome.failures.push(ResolveFailure {
                        index,
                        reference: reference.clone(),
                        error,
                    });
                }
            }
        }

        tracing::debug!(
            total,
            resolved = outcome.resolved.len(),
            failed = outcome.failures.len(),
            "resolved calculation references"
        );
        outcome
    }
}

async fn resolve_one(
    store: &dyn ProjectStore,
    reference: &CalculationReference,
    sort: bool,
) -> Result<CalculationReference, ResolveError> {
    let project = store.ensure_loaded(&reference.project_id).await?;
    let calculation = project
        .calculation(&reference.calculation_id)
        .ok_or_else(|| ResolveError::CalculationNotFound {
            project_id: reference.project_id.clone(),
            calculation_id: reference.calculation_id.clone(),
        })?;

    let data = if sort {
        sorted_by_rpm(&calculation.data_points)
    } else {
        calculation.data_points.clone()
    };
    Ok(reference.with_data(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FetchError, ProjectCache, ProjectSource};
    use crate::results::{parse_result_file, EngineProject};
    use async_trait::async_trait;

    struct FixedSource;

    #[async_trait]
    impl ProjectSource for FixedSource {
        async fn fetch_project(&self, project_id: &str) -> Result<EngineProject, FetchError> {
            let text = "1 NATUR\nidx RPM Torque\n$1\n1 3000 150\n2 2000 140\n";
            Ok(parse_result_file(text, project_id).unwrap().value)
        }
    }

    fn resolver() -> ReferenceResolver {
        ReferenceResolver::new(Arc::new(ProjectCache::new(Arc::new(FixedSource))))
    }

    #[tokio::test]
    async fn test_calculation_not_found() {
        let refs = vec![
            CalculationReference::new("a", "A", "$1", "1"),
            CalculationReference::new("a", "A", "$9", "9"),
        ];
        let outcome = resolver().resolve(&refs).await;

        assert_eq!(outcome.resolved.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].index, 1);
        assert_eq!(
            outcome.failures[0].error,
            ResolveError::CalculationNotFound {
                project_id: "a".to_string(),
                calculation_id: "$9".to_string(),
            }
        );
        assert_eq!(
            outcome.failure_summary().unwrap(),
            "A → 9: Calculation $9 not found in project a"
        );
    }

    #[tokio::test]
    async fn test_sort_by_rpm() {
        let refs = vec![CalculationReference::new("a", "A", "$1", "1")];

        let rpms = |outcome: &ResolveOutcome| -> Vec<f64> {
            let data = outcome.resolved[0].data.as_ref().unwrap();
            data.iter().map(|p| p.rpm).collect()
        };

        let unsorted = resolver().resolve(&refs).await;
        assert_eq!(rpms(&unsorted), vec![3000.0, 2000.0]);

        let sorted = resolver().sort_by_rpm(true).resolve(&refs).await;
        assert_eq!(rpms(&sorted), vec![2000.0, 3000.0]);
    }

    #[tokio::test]
    async fn test_progress_reaches_total() {
        let refs = vec![
            CalculationReference::new("a", "A", "$1", "1"),
            CalculationReference::new("b", "B", "$1", "1"),
        ];
        let (tx, rx) = watch::channel(ResolveProgress::default());
        resolver().resolve_with_progress(&refs, &tx).await;
        assert_eq!(
            *rx.borrow(),
            ResolveProgress {
                completed: 2,
                total: 2
            }
        );
        assert!(rx.borrow().is_done());
    }

    #[tokio::test]
    async fn test_empty_input() {
        let outcome = resolver().resolve(&[]).await;
        assert!(outcome.resolved.is_empty());
        assert!(outcome.is_complete());
        assert!(outcome.failure_summary().is_none());
    }
}

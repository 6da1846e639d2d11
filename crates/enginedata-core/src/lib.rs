//! # EngineData Core Library
//!
//! Ingestion layer for engine simulation results.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Result file parsing (`.det` / `.pou` tabular exports)
//! - Cycle file parsing (`.pvd` pressure/volume traces)
//! - Project caching with single-flight loading
//! - Cross-project calculation reference resolution
//!
//! ## Example
//!
//! ```rust,ignore
//! use enginedata_core::prelude::*;
//! use std::sync::Arc;
//!
//! let config = IngestConfig::default();
//! let source = Arc::new(DirectorySource::new("projects", &config));
//! let cache = Arc::new(ProjectCache::new(source));
//!
//! let refs = vec![CalculationReference::new("vesta", "Vesta 1.6", "$1", "1")];
//! let outcome = ReferenceResolver::with_config(cache, &config).resolve(&refs).await;
//! for reference in &outcome.resolved {
//!     println!("{}: {} points", reference.label(), reference.data.as_ref().map_or(0, Vec::len));
//! }
//! ```

pub mod cache;
pub mod config;
pub mod cycle;
pub mod diagnostics;
pub mod resolver;
pub mod results;

pub use cycle::parse_cycle_file;
pub use results::parse_result_file;

use std::sync::Arc;

/// Resolve `references` through `store` with the default configuration
pub async fn resolve_references(
    store: Arc<dyn cache::ProjectStore>,
    references: &[resolver::CalculationReference],
) -> resolver::ResolveOutcome {
    resolver::ReferenceResolver::new(store)
        .resolve(references)
        .await
}

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::{
        CacheError, DirectorySource, FetchError, ProjectCache, ProjectSource, ProjectStore,
        UncachedStore,
    };
    pub use crate::config::IngestConfig;
    pub use crate::cycle::{CycleSample, CycleTrace, CylinderState, CylinderStats};
    pub use crate::diagnostics::{Diagnostic, ParseError, ParseOutcome};
    pub use crate::resolver::{
        CalculationReference, ReferenceResolver, ResolveError, ResolveOutcome, ResolveProgress,
    };
    pub use crate::results::{
        Calculation, ChannelValue, CylinderValues, DataPoint, EngineMetadata, EngineProject,
        EngineType,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Directory-backed project source
//!
//! Treats `<root>/<project_id>.<ext>` as the result file of a project,
//! trying each configured extension in order.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{FetchError, ProjectSource};
use crate::config::IngestConfig;
use crate::results::{EngineProject, ResultParser};

/// Reads and parses result files from a local directory
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    extensions: Vec<String>,
    parser: ResultParser,
}

impl DirectorySource {
    /// Source reading project files under `root`
    pub fn new<P: AsRef<Path>>(root: P, config: &IngestConfig) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            extensions: config.result_extensions.clone(),
            parser: ResultParser::new(config),
        }
    }

    /// Read a file, falling back to lossy decoding for non-UTF-8 exports
    async fn read_text(path: &Path) -> Result<Option<String>, FetchError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FetchError::IoError(format!("{}: {}", path.display(), e))),
        }
    }
}

/// A project id must name a file directly inside the root
fn is_plain_name(project_id: &str) -> bool {
    !project_id.is_empty()
        && project_id != "."
        && project_id != ".."
        && !project_id.contains(['/', '\\'])
}

#[async_trait]
impl ProjectSource for DirectorySource {
    async fn fetch_project(&self, project_id: &str) -> Result<EngineProject, FetchError> {
        if !is_plain_name(project_id) {
            return Err(FetchError::NotFound(project_id.to_string()));
        }

        for ext in &self.extensions {
            let file_name = format!("{}.{}", project_id, ext);
            let path = self.root.join(&file_name);
            let Some(text) = Self::read_text(&path).await? else {
                continue;
            };

            let outcome = self.parser.parse(&text, &file_name)?;
            if !outcome.is_clean() {
                tracing::warn!(
                    project = project_id,
                    file = %path.display(),
                    skipped = outcome.diagnostics.len(),
                    "result file parsed with diagnostics"
                );
            }
            return Ok(outcome.value);
        }

        Err(FetchError::NotFound(project_id.to_string()))
    }
}

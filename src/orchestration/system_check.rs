//! # System Prerequisite Check
//!
//! Satisfies the reserved `system-check` prerequisite before any phase runs,
//! and sizes the project for risk assessment.

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::PipelineParams;
use crate::error::{OrchestratorError, Result};

/// Extensions counted as migratable source files
pub const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

/// Directories never descended into when counting
const SKIPPED_DIRECTORIES: &[&str] = &["node_modules", ".git", "target", "dist", "build"];

#[async_trait]
pub trait PrerequisiteChecker: Send + Sync {
    /// Fail with `PrerequisiteError` when the run cannot start
    async fn check(&self, project_root: &Path, params: &PipelineParams) -> Result<()>;

    /// Number of source files under `project_root`
    async fn count_source_files(&self, project_root: &Path) -> Result<usize>;
}

#[derive(Debug, Clone, Default)]
pub struct FileSystemPrerequisiteChecker;

impl FileSystemPrerequisiteChecker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PrerequisiteChecker for FileSystemPrerequisiteChecker {
    async fn check(&self, project_root: &Path, params: &PipelineParams) -> Result<()> {
        let metadata = tokio::fs::metadata(project_root).await.map_err(|e| {
            OrchestratorError::PrerequisiteError(format!(
                "project root {} is not accessible: {e}",
                project_root.display()
            ))
        })?;
        if !metadata.is_dir() {
            return Err(OrchestratorError::PrerequisiteError(format!(
                "project root {} is not a directory",
                project_root.display()
            )));
        }

        debug!(
            project_root = %project_root.display(),
            dry_run = params.dry_run,
            "System prerequisites satisfied"
        );
        Ok(())
    }

    async fn count_source_files(&self, project_root: &Path) -> Result<usize> {
        let root = project_root.to_path_buf();
        tokio::task::spawn_blocking(move || count_files(&root))
            .await
            .map_err(|e| {
                OrchestratorError::RiskAssessmentError(format!("file scan task failed: {e}"))
            })?
    }
}

fn count_files(root: &Path) -> Result<usize> {
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];
    let mut count = 0;

    while let Some(dir) = pending.pop() {
        let entries = fs::read_dir(&dir).map_err(|e| {
            OrchestratorError::RiskAssessmentError(format!("cannot read {}: {e}", dir.display()))
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| OrchestratorError::RiskAssessmentError(e.to_string()))?;
            let file_type = entry
                .file_type()
                .map_err(|e| OrchestratorError::RiskAssessmentError(e.to_string()))?;
            let path = entry.path();

            if file_type.is_dir() {
                let skipped = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| SKIPPED_DIRECTORIES.contains(&name));
                if !skipped {
                    pending.push(path);
                }
            } else if file_type.is_file() && is_source_file(&path) {
                count += 1;
            }
        }
    }

    Ok(count)
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

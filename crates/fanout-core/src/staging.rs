//! Local packaging of directory trees before transfer

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use fanout_exec::LocalExecutor;
use tempfile::TempPath;
use tracing::{debug, warn};

use crate::error::CoreError;

/// A gzip tarball of one directory, removed when dropped
#[derive(Debug)]
pub struct StagedArchive {
    path: TempPath,
    file_name: String,
}

impl StagedArchive {
    /// Package `source` into `staging_dir/fanout-<dirname>-XXXX.tar.gz`
    ///
    /// The archive holds `<dirname>/...` so extracting it under a
    /// destination recreates the directory there.
    ///
    /// # Errors
    /// Returns `CoreError::StagingError` if `source` is not a directory or
    /// `tar` fails.
    pub async fn create(
        source: &Path,
        staging_dir: &Path,
        executor: &LocalExecutor,
    ) -> Result<Self, CoreError> {
        let source = tokio::fs::canonicalize(source).await.map_err(|e| {
            CoreError::StagingError(format!("cannot resolve {}: {e}", source.display()))
        })?;
        if !source.is_dir() {
            return Err(CoreError::StagingError(format!(
                "{} is not a directory",
                source.display()
            )));
        }

        let (parent, dir_name) = match (source.parent(), source.file_name()) {
            (Some(parent), Some(name)) => (parent.to_path_buf(), name.to_os_string()),
            _ => {
                return Err(CoreError::StagingError(format!(
                    "cannot archive {}",
                    source.display()
                )));
            }
        };

        let temp = tempfile::Builder::new()
            .prefix(&format!("fanout-{}-", dir_name.to_string_lossy()))
            .suffix(".tar.gz")
            .tempfile_in(staging_dir)
            .map_err(|e| CoreError::StagingError(e.to_string()))?
            .into_temp_path();

        let file_name = temp
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!(source = %source.display(), archive = %temp.display(), "packaging directory");

        let outcome = executor
            .run_program(
                "tar",
                [
                    OsStr::new("-czf"),
                    temp.as_os_str(),
                    OsStr::new("-C"),
                    parent.as_os_str(),
                    dir_name.as_os_str(),
                ],
            )
            .await
            .map_err(|e| CoreError::StagingError(e.to_string()))?;

        if !outcome.success() {
            return Err(CoreError::StagingError(format!(
                "tar exited with {}: {}",
                outcome.status,
                outcome.stderr.trim()
            )));
        }

        Ok(Self {
            path: temp,
            file_name,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Archive file name, reused for the remote copy
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Remove the archive now, logging instead of failing
    pub fn close(self) {
        let path: PathBuf = self.path.to_path_buf();
        if let Err(e) = self.path.close() {
            warn!(archive = %path.display(), error = %e, "failed to remove local archive");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_archive_created_and_removed() {
        let source = tempfile::tempdir().unwrap();
        let tree = source.path().join("site");
        std::fs::create_dir_all(tree.join("assets")).unwrap();
        std::fs::write(tree.join("index.html"), "<h1>hi</h1>").unwrap();
        std::fs::write(tree.join("assets/app.js"), "console.log(1)").unwrap();

        let staging = tempfile::tempdir().unwrap();
        let archive = StagedArchive::create(&tree, staging.path(), &LocalExecutor::new())
            .await
            .unwrap();

        assert!(archive.file_name().starts_with("fanout-site-"));
        assert!(archive.file_name().ends_with(".tar.gz"));
        assert!(archive.path().is_file());

        let listing = LocalExecutor::new()
            .run_program("tar", [OsStr::new("-tzf"), archive.path().as_os_str()])
            .await
            .unwrap();
        assert!(listing.stdout.contains("site/index.html"));
        assert!(listing.stdout.contains("site/assets/app.js"));

        let path = archive.path().to_path_buf();
        archive.close();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_source() {
        let staging = tempfile::tempdir().unwrap();
        let result = StagedArchive::create(
            Path::new("/definitely/not/here"),
            staging.path(),
            &LocalExecutor::new(),
        )
        .await;

        assert!(matches!(result, Err(CoreError::StagingError(_))));
    }

    #[tokio::test]
    async fn test_file_source_rejected() {
        let staging = tempfile::tempdir().unwrap();
        let file = staging.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();

        let result = StagedArchive::create(&file, staging.path(), &LocalExecutor::new()).await;
        assert!(matches!(result, Err(CoreError::StagingError(_))));
    }
}

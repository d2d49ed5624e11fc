use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::models::cv::ScoreKey;

/// Scratch directory for one record's pass through the stages.
///
/// Namespaced by (user, job offer) so concurrent runs never share files.
/// Everything inside is removed when the workspace is dropped, on success
/// and failure alike.
#[derive(Debug)]
pub struct StageWorkspace {
    dir: TempDir,
}

impl StageWorkspace {
    pub fn create(base: &Path, key: ScoreKey) -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("cv_{}_{}_", key.user_id, key.job_offer_id))
            .tempdir_in(base)?;
        debug!("Created stage workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Single-record CSV fed to stage 1.
    pub fn input(&self) -> PathBuf {
        self.dir.path().join("input.csv")
    }

    /// Stage 1 output, input to stages 2 and 3.
    pub fn normalized(&self) -> PathBuf {
        self.dir.path().join("normalized.csv")
    }

    pub fn org_scores(&self) -> PathBuf {
        self.dir.path().join("org_scores.json")
    }

    pub fn job_match(&self) -> PathBuf {
        self.dir.path().join("job_match.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_is_namespaced_and_removed_on_drop() {
        let base = tempfile::tempdir().unwrap();
        let key = ScoreKey {
            user_id: 12,
            job_offer_id: 3,
        };

        let ws = StageWorkspace::create(base.path(), key).unwrap();
        let root = ws.path().to_path_buf();
        assert!(root
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("cv_12_3_")));

        std::fs::write(ws.input(), "x").unwrap();
        std::fs::write(ws.job_match(), "{}").unwrap();
        drop(ws);

        assert!(!root.exists());
    }

    #[test]
    fn test_two_workspaces_for_same_key_do_not_collide() {
        let base = tempfile::tempdir().unwrap();
        let key = ScoreKey {
            user_id: 1,
            job_offer_id: 1,
        };
        let a = StageWorkspace::create(base.path(), key).unwrap();
        let b = StageWorkspace::create(base.path(), key).unwrap();
        assert_ne!(a.path(), b.path());
    }
}

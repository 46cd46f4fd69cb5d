use crate::backend::{Backend, EnrollmentRow, ProfileRow, ProgressRow};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Backend rows exported to a JSON file, in the same shapes the REST API returns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub profiles: Vec<ProfileRow>,
    pub enrollments: Vec<EnrollmentRow>,
    pub progress: Vec<ProgressRow>,
}

#[derive(Debug, Clone)]
pub struct SnapshotBackend {
    snapshot: Snapshot,
    source: Option<PathBuf>,
}

impl SnapshotBackend {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read backend snapshot: {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse backend snapshot: {}", path.display()))?;

        Ok(Self {
            source: Some(path.to_path_buf()),
            ..Self::from_snapshot(snapshot)
        })
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            source: None,
        }
    }
}

impl Backend for SnapshotBackend {
    fn profile(&self, user_id: &str) -> Result<Option<ProfileRow>> {
        Ok(self
            .snapshot
            .profiles
            .iter()
            .find(|profile| profile.id == user_id)
            .cloned())
    }

    fn enrollments(&self, user_id: &str) -> Result<Vec<EnrollmentRow>> {
        Ok(self
            .snapshot
            .enrollments
            .iter()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect())
    }

    fn progress(&self, user_id: &str) -> Result<Vec<ProgressRow>> {
        Ok(self
            .snapshot
            .progress
            .iter()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect())
    }

    fn all_enrollments(&self) -> Result<Vec<EnrollmentRow>> {
        Ok(self.snapshot.enrollments.clone())
    }

    fn describe(&self) -> String {
        match &self.source {
            Some(path) => format!("snapshot ({})", path.display()),
            None => "snapshot (in-memory)".to_string(),
        }
    }
}

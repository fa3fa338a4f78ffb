//! The project's feature checklist, `claude-features.json`.

use crate::store::{self, StoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const FEATURES_FILE: &str = "claude-features.json";
const MAX_NEXT_ITEMS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    Passing,
    Failing,
    InProgress,
    /// Anything unrecognized counts as pending.
    #[default]
    #[serde(other)]
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: FeatureStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureList {
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Default, PartialEq)]
pub struct FeatureSummary {
    pub total: usize,
    pub passing: usize,
    pub failing: usize,
    pub in_progress: usize,
    pub pending: usize,
    /// Failing and in-progress features, in file order.
    pub next_items: Vec<Feature>,
}

pub fn features_path(work_dir: &Path) -> PathBuf {
    work_dir.join(FEATURES_FILE)
}

impl FeatureList {
    /// `None` when the project has no checklist.
    pub fn load(work_dir: &Path) -> Result<Option<Self>, StoreError> {
        store::read_json_file(&features_path(work_dir))
    }

    pub fn with_status(&self, status: FeatureStatus) -> impl Iterator<Item = &Feature> {
        self.features.iter().filter(move |f| f.status == status)
    }

    pub fn summary(&self) -> FeatureSummary {
        let mut summary = FeatureSummary {
            total: self.features.len(),
            ..Default::default()
        };
        for feature in &self.features {
            match feature.status {
                FeatureStatus::Passing => summary.passing += 1,
                FeatureStatus::Failing => summary.failing += 1,
                FeatureStatus::InProgress => summary.in_progress += 1,
                FeatureStatus::Pending => summary.pending += 1,
            }
        }
        summary.next_items = self
            .features
            .iter()
            .filter(|f| matches!(f.status, FeatureStatus::Failing | FeatureStatus::InProgress))
            .take(MAX_NEXT_ITEMS)
            .cloned()
            .collect();
        summary
    }
}

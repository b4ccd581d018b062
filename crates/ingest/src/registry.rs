//! Ingestion registry, grounded in
//! `original_source/data_input/file_ingestor.py`'s `FileIngestor`: runs the
//! fetch → detect_format → profile pipeline and persists results in a
//! workspace-local JSON registry (spec.md §4.6).

use std::collections::BTreeMap;
use std::path::PathBuf;

use ba_domain::bio::ingest::{DatasetValidation, FileProfile};
use ba_domain::error::Result;
use tokio::sync::RwLock;

use crate::{format, profile, source, validate};

pub struct IngestRegistry {
    workspace_dir: PathBuf,
    registry_path: PathBuf,
    entries: RwLock<BTreeMap<String, FileProfile>>,
}

impl IngestRegistry {
    pub async fn new(workspace_dir: impl Into<PathBuf>) -> Self {
        let workspace_dir = workspace_dir.into();
        let registry_path = workspace_dir.join("registry.json");
        let entries = load_registry(&registry_path).await;
        Self { workspace_dir, registry_path, entries: RwLock::new(entries) }
    }

    /// Ingest one source, registering it under `label` (defaulting to the
    /// fetched file's name) and persisting the registry.
    pub async fn ingest(&self, source_input: &str) -> Result<FileProfile> {
        self.ingest_labeled(source_input, None).await
    }

    pub async fn ingest_labeled(&self, source_input: &str, label: Option<&str>) -> Result<FileProfile> {
        let detected = source::detect_source(source_input);
        let fetched = source::fetch(&self.workspace_dir, detected).await.map_err(|e| {
            tracing::warn!(source = source_input, error = %e, "ingestion fetch failed");
            e
        })?;
        let file_format = format::detect_format(&fetched.local_path).await?;
        let mut file_profile = profile::profile(&fetched, &file_format).await?;
        file_profile.fetched_file_ref = fetched.local_path.clone();

        let key = label.map(str::to_string).unwrap_or_else(|| fetched.original_name.clone());
        {
            let mut entries = self.entries.write().await;
            entries.insert(key, file_profile.clone());
        }
        self.save().await?;
        Ok(file_profile)
    }

    pub async fn get(&self, label: &str) -> Option<FileProfile> {
        self.entries.read().await.get(label).cloned()
    }

    pub async fn list(&self) -> Vec<(String, FileProfile)> {
        self.entries.read().await.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Validate a subset of previously-ingested labels (all labels if empty)
    /// against an analysis type, `"auto"` to infer it.
    pub async fn validate(&self, labels: &[String], analysis_type: &str) -> DatasetValidation {
        let entries = self.entries.read().await;
        let profiles: Vec<FileProfile> = if labels.is_empty() {
            entries.values().cloned().collect()
        } else {
            labels.iter().filter_map(|l| entries.get(l).cloned()).collect()
        };
        validate::validate(&profiles, analysis_type)
    }

    async fn save(&self) -> Result<()> {
        let entries = self.entries.read().await;
        let json = serde_json::to_string_pretty(&*entries)?;
        let tmp_path = self.registry_path.with_extension("json.tmp");
        tokio::fs::create_dir_all(&self.workspace_dir).await?;
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &self.registry_path).await?;
        Ok(())
    }
}

async fn load_registry(path: &PathBuf) -> BTreeMap<String, FileProfile> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
        Err(_) => BTreeMap::new(),
    }
}

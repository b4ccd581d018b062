//! File ingestion data model (spec.md §3/§4.6): fetched files, detected
//! formats, per-format profiles, and dataset validation results.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where a file to ingest came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceDescriptor {
    LocalPath { path: PathBuf },
    HttpUrl { url: String },
    S3Uri { uri: String },
    GcsUri { uri: String },
    InlineBytes { len: usize },
    UploadTempPath { path: PathBuf },
}

/// Compression detected from magic bytes, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Zstd,
}

/// A file downloaded/copied into the workspace-local ingested directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedFile {
    pub local_path: PathBuf,
    pub original_name: String,
    pub source: SourceDescriptor,
    pub size_bytes: u64,
    pub content_hash: String,
    pub fetch_ts: chrono::DateTime<chrono::Utc>,
    pub compression: Compression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormatCategory {
    Sequence,
    Alignment,
    Variant,
    Expression,
    Annotation,
    Ranges,
    Structure,
    Phylogeny,
    Tabular,
    Image,
    Document,
    Archive,
    Other,
}

/// The detected format of a fetched file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFormat {
    pub name: String,
    pub category: FileFormatCategory,
    pub canonical_extension: String,
    pub is_binary: bool,
    #[serde(default)]
    pub expected_companion_extensions: Vec<String>,
    pub detection_confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualitySeverity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityFlag {
    pub severity: QualitySeverity,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    Good,
    Acceptable,
    Poor,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedAnalysis {
    pub name: String,
    pub tools: Vec<String>,
    pub prerequisites: Vec<String>,
    pub priority: u32,
    pub example_query: String,
}

/// Per-column type inference for tabular profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: String,
    pub null_count: usize,
    pub unique_sample: Vec<String>,
}

/// The result of profiling a fetched+format-detected file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileProfile {
    pub fetched_file_ref: PathBuf,
    pub format: FileFormat,
    /// Format-specific statistics, e.g. `{"read_count": "120000", "gc_pct": "41.2"}`.
    #[serde(default)]
    pub statistics: BTreeMap<String, String>,
    pub preview: String,
    #[serde(default)]
    pub column_info: Option<Vec<ColumnInfo>>,
    #[serde(default)]
    pub quality_flags: Vec<QualityFlag>,
    pub overall_quality: QualityLevel,
    #[serde(default)]
    pub suggested_analyses: Vec<SuggestedAnalysis>,
    #[serde(default)]
    pub present_companions: Vec<String>,
    #[serde(default)]
    pub missing_companions: Vec<String>,
}

/// Result of validating a set of profiles against an analysis type's
/// prerequisites (spec.md §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetValidation {
    pub analysis_type: String,
    pub passed: Vec<String>,
    pub failed: Vec<String>,
    pub warnings: Vec<String>,
    pub missing: Vec<String>,
    pub ready: bool,
    pub suggested_fixes: Vec<String>,
}

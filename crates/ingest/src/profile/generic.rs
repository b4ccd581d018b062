//! Fallback profiler for formats without a dedicated profiler (BED, images,
//! archives, unknown files): size and a bounded text preview when the file
//! looks like text.

use ba_domain::bio::ingest::{FetchedFile, FileFormat, FileProfile, QualityLevel, QualitySeverity};
use ba_domain::error::Result;

use super::{flag, stats_map};

const PREVIEW_BYTES: usize = 512;

pub async fn profile(fetched: &FetchedFile, format: &FileFormat) -> Result<FileProfile> {
    let mut flags = Vec::new();
    if fetched.size_bytes == 0 {
        flags.push(flag(QualitySeverity::Error, "EMPTY_FILE", "File is zero bytes"));
    }

    let preview = if format.is_binary {
        format!("<binary {} file, {} bytes>", format.name, fetched.size_bytes)
    } else {
        let bytes = tokio::fs::read(&fetched.local_path).await.unwrap_or_default();
        let head = &bytes[..bytes.len().min(PREVIEW_BYTES)];
        String::from_utf8_lossy(head).to_string()
    };

    let overall_quality = if flags.iter().any(|f| f.severity == QualitySeverity::Error) {
        QualityLevel::Poor
    } else {
        QualityLevel::Unknown
    };

    Ok(FileProfile {
        fetched_file_ref: fetched.local_path.clone(),
        format: format.clone(),
        statistics: stats_map(vec![("size_bytes", fetched.size_bytes.to_string())]),
        preview,
        column_info: None,
        quality_flags: flags,
        overall_quality,
        suggested_analyses: Vec::new(),
        present_companions: Vec::new(),
        missing_companions: Vec::new(),
    })
}

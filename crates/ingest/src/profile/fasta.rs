//! FASTA profiler, grounded in `profilers.py`'s generic sequence profiling:
//! sequence count, total/mean length, GC% for nucleotide sequences.

use ba_domain::bio::ingest::{FetchedFile, FileFormat, FileProfile, QualityLevel, QualitySeverity};
use ba_domain::error::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{flag, stats_map};

pub async fn profile(fetched: &FetchedFile, format: &FileFormat) -> Result<FileProfile> {
    let file = tokio::fs::File::open(&fetched.local_path).await?;
    let mut lines = BufReader::new(file).lines();

    let mut sequence_count = 0u64;
    let mut total_len: u64 = 0;
    let mut gc_count: u64 = 0;
    let mut first_header = None;

    while let Some(line) = lines.next_line().await? {
        if let Some(header) = line.strip_prefix('>') {
            sequence_count += 1;
            if first_header.is_none() {
                first_header = Some(header.to_string());
            }
        } else {
            total_len += line.len() as u64;
            gc_count += line.bytes().filter(|b| matches!(b, b'G' | b'C' | b'g' | b'c')).count() as u64;
        }
    }

    let mean_len = if sequence_count > 0 { total_len as f64 / sequence_count as f64 } else { 0.0 };
    let gc_pct = if total_len > 0 { gc_count as f64 / total_len as f64 * 100.0 } else { 0.0 };

    let mut flags = Vec::new();
    if sequence_count == 0 {
        flags.push(flag(QualitySeverity::Error, "EMPTY_FASTA", "No sequences found"));
    }

    let overall_quality = if flags.iter().any(|f| f.severity == QualitySeverity::Error) {
        QualityLevel::Poor
    } else {
        QualityLevel::Good
    };

    Ok(FileProfile {
        fetched_file_ref: fetched.local_path.clone(),
        format: format.clone(),
        statistics: stats_map(vec![
            ("sequence_count", sequence_count.to_string()),
            ("total_length", total_len.to_string()),
            ("mean_length", format!("{mean_len:.1}")),
            ("gc_pct", format!("{gc_pct:.2}")),
        ]),
        preview: first_header.map(|h| format!(">{h}")).unwrap_or_else(|| "empty".into()),
        column_info: None,
        quality_flags: flags,
        overall_quality,
        suggested_analyses: Vec::new(),
        present_companions: Vec::new(),
        missing_companions: Vec::new(),
    })
}

//! Tabular (CSV/TSV) profiler, grounded in `profilers.py`'s `TabularProfiler`:
//! delimiter inference from comma/tab counts, per-column dtype inference from
//! a sample of non-empty values, null counts, unique-value samples.

use ba_domain::bio::ingest::{
    ColumnInfo, FetchedFile, FileFormat, FileProfile, QualityLevel, QualitySeverity,
};
use ba_domain::error::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{flag, stats_map};

const SAMPLE_ROWS: usize = 100;

pub async fn profile(fetched: &FetchedFile, format: &FileFormat) -> Result<FileProfile> {
    let file = tokio::fs::File::open(&fetched.local_path).await?;
    let mut lines = BufReader::new(file).lines();

    let Some(header_line) = lines.next_line().await? else {
        return Ok(empty_profile(fetched, format));
    };

    let delimiter = infer_delimiter(&header_line);
    let headers: Vec<String> = header_line.split(delimiter).map(|s| s.trim().to_string()).collect();

    let mut samples: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    let mut null_counts: Vec<usize> = vec![0; headers.len()];
    let mut row_count = 0usize;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        row_count += 1;
        let fields: Vec<&str> = line.split(delimiter).collect();
        for (i, sample) in samples.iter_mut().enumerate() {
            let value = fields.get(i).copied().unwrap_or("").trim();
            if value.is_empty() {
                null_counts[i] += 1;
            } else if sample.len() < SAMPLE_ROWS {
                sample.push(value.to_string());
            }
        }
    }

    let column_info: Vec<ColumnInfo> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let dtype = infer_dtype(&samples[i]);
            let mut unique_sample: Vec<String> = Vec::new();
            for v in &samples[i] {
                if !unique_sample.contains(v) {
                    unique_sample.push(v.clone());
                }
                if unique_sample.len() >= 10 {
                    break;
                }
            }
            ColumnInfo { name: name.clone(), dtype, null_count: null_counts[i], unique_sample }
        })
        .collect();

    let mut flags = Vec::new();
    if row_count == 0 {
        flags.push(flag(QualitySeverity::Error, "EMPTY_TABLE", "No data rows found"));
    }
    for col in &column_info {
        if row_count > 0 && col.null_count as f64 / row_count as f64 > 0.5 {
            flags.push(flag(
                QualitySeverity::Warning,
                "HIGH_NULL_RATE",
                format!("Column '{}' is more than half empty", col.name),
            ));
        }
    }

    let overall_quality = if flags.iter().any(|f| f.severity == QualitySeverity::Error) {
        QualityLevel::Poor
    } else if flags.iter().any(|f| f.severity == QualitySeverity::Warning) {
        QualityLevel::Acceptable
    } else {
        QualityLevel::Good
    };

    Ok(FileProfile {
        fetched_file_ref: fetched.local_path.clone(),
        format: format.clone(),
        statistics: stats_map(vec![("rows", row_count.to_string()), ("columns", headers.len().to_string())]),
        preview: format!("{row_count} rows x {} columns: {}", headers.len(), headers.join(", ")),
        column_info: Some(column_info),
        quality_flags: flags,
        overall_quality,
        suggested_analyses: Vec::new(),
        present_companions: Vec::new(),
        missing_companions: Vec::new(),
    })
}

fn empty_profile(fetched: &FetchedFile, format: &FileFormat) -> FileProfile {
    FileProfile {
        fetched_file_ref: fetched.local_path.clone(),
        format: format.clone(),
        statistics: stats_map(vec![("rows", "0".into())]),
        preview: "empty file".into(),
        column_info: Some(Vec::new()),
        quality_flags: vec![flag(QualitySeverity::Error, "EMPTY_FILE", "File has no content")],
        overall_quality: QualityLevel::Poor,
        suggested_analyses: Vec::new(),
        present_companions: Vec::new(),
        missing_companions: Vec::new(),
    }
}

fn infer_delimiter(first_line: &str) -> char {
    let tabs = first_line.matches('\t').count();
    let commas = first_line.matches(',').count();
    if tabs > commas { '\t' } else { ',' }
}

/// >80% of sampled non-empty values parseable as numeric → numeric; if none
/// of those have a decimal point, narrow to integer; else string/mixed.
fn infer_dtype(samples: &[String]) -> String {
    if samples.is_empty() {
        return "string".to_string();
    }
    let numeric_count = samples.iter().filter(|v| v.parse::<f64>().is_ok()).count();
    let ratio = numeric_count as f64 / samples.len() as f64;
    if ratio > 0.8 {
        let all_integer = samples.iter().all(|v| !v.contains('.') && v.parse::<i64>().is_ok());
        if all_integer {
            "integer".to_string()
        } else {
            "numeric".to_string()
        }
    } else if numeric_count > 0 {
        "mixed".to_string()
    } else {
        "string".to_string()
    }
}

//! BAM/SAM/CRAM profiler, grounded in `profilers.py`'s `BamProfiler`: shells
//! out to `samtools flagstat`/`idxstats` for mapping rate, duplication rate,
//! and per-chromosome counts.

use ba_domain::bio::ingest::{FetchedFile, FileFormat, FileProfile, QualityLevel, QualitySeverity};
use ba_domain::error::Result;

use super::{flag, stats_map};

pub async fn profile(fetched: &FetchedFile, format: &FileFormat) -> Result<FileProfile> {
    let mut flags = Vec::new();
    let mut stats = Vec::new();

    match run_samtools(&["flagstat", &path_str(fetched)]).await {
        Ok(output) => {
            let (mapped_pct, dup_pct) = parse_flagstat(&output);
            if let Some(pct) = mapped_pct {
                stats.push(("mapping_rate_pct", format!("{pct:.2}")));
                if pct < 80.0 {
                    flags.push(flag(
                        QualitySeverity::Warning,
                        "LOW_MAPPING_RATE",
                        format!("Mapping rate {pct:.1}% is below 80%"),
                    ));
                }
            }
            if let Some(pct) = dup_pct {
                stats.push(("duplication_rate_pct", format!("{pct:.2}")));
            }
        }
        Err(e) => {
            flags.push(flag(
                QualitySeverity::Info,
                "SAMTOOLS_UNAVAILABLE",
                format!("Could not run samtools flagstat: {e}"),
            ));
        }
    }

    let index_exists = has_index(fetched).await;
    if !index_exists && format.name == "BAM" {
        flags.push(flag(
            QualitySeverity::Warning,
            "MISSING_INDEX",
            "No .bai index found — indexed access requires `samtools index`",
        ));
    }

    let overall_quality = if flags.iter().any(|f| f.severity == QualitySeverity::Error) {
        QualityLevel::Poor
    } else if flags.iter().any(|f| f.severity == QualitySeverity::Warning) {
        QualityLevel::Acceptable
    } else if stats.is_empty() {
        QualityLevel::Unknown
    } else {
        QualityLevel::Good
    };

    Ok(FileProfile {
        fetched_file_ref: fetched.local_path.clone(),
        format: format.clone(),
        statistics: stats_map(stats),
        preview: format!("{} alignment file, {}", format.name, fetched.original_name),
        column_info: None,
        quality_flags: flags,
        overall_quality,
        suggested_analyses: Vec::new(),
        present_companions: Vec::new(),
        missing_companions: Vec::new(),
    })
}

async fn has_index(fetched: &FetchedFile) -> bool {
    for ext in ["bai", "crai", "csi"] {
        let candidate = format!("{}.{ext}", fetched.local_path.display());
        if tokio::fs::metadata(&candidate).await.is_ok() {
            return true;
        }
    }
    false
}

fn path_str(fetched: &FetchedFile) -> String {
    fetched.local_path.to_string_lossy().to_string()
}

async fn run_samtools(args: &[&str]) -> std::result::Result<String, String> {
    let output = tokio::process::Command::new("samtools")
        .args(args)
        .output()
        .await
        .map_err(|e| e.to_string())?;
    if !output.status.success() {
        return Err(String::from_utf8_lossy(&output.stderr).to_string());
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Parses `samtools flagstat` text output for the mapped% and duplicate% lines.
fn parse_flagstat(output: &str) -> (Option<f64>, Option<f64>) {
    let mut mapped = None;
    let mut dup_total = None;
    let mut total = None;
    for line in output.lines() {
        if let Some(pct) = extract_percentage(line, "mapped (") {
            mapped = Some(pct);
        }
        if line.contains("duplicates") {
            if let Some(count) = line.split_whitespace().next().and_then(|s| s.parse::<f64>().ok()) {
                dup_total = Some(count);
            }
        }
        if line.contains("in total") {
            if let Some(count) = line.split_whitespace().next().and_then(|s| s.parse::<f64>().ok()) {
                total = Some(count);
            }
        }
    }
    let dup_pct = match (dup_total, total) {
        (Some(d), Some(t)) if t > 0.0 => Some(d / t * 100.0),
        _ => None,
    };
    (mapped, dup_pct)
}

fn extract_percentage(line: &str, marker: &str) -> Option<f64> {
    let idx = line.find(marker)?;
    let rest = &line[idx + marker.len()..];
    let pct_str: String = rest.chars().take_while(|c| c.is_ascii_digit() || *c == '.').collect();
    pct_str.parse().ok()
}

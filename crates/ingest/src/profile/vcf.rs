//! VCF profiler, grounded in `profilers.py`'s `VcfProfiler`: header fields,
//! sample names, per-variant alt-allele classification, filter histogram.

use std::collections::BTreeMap;

use ba_domain::bio::ingest::{FetchedFile, FileFormat, FileProfile, QualityLevel, QualitySeverity};
use ba_domain::error::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{flag, stats_map};

pub async fn profile(fetched: &FetchedFile, format: &FileFormat) -> Result<FileProfile> {
    let file = tokio::fs::File::open(&fetched.local_path).await?;
    let mut lines = BufReader::new(file).lines();

    let mut sample_names: Vec<String> = Vec::new();
    let mut info_fields: Vec<String> = Vec::new();
    let mut variant_count: u64 = 0;
    let mut pass_count: u64 = 0;
    let mut filter_histogram: BTreeMap<String, u64> = BTreeMap::new();
    let mut allele_types: BTreeMap<&'static str, u64> = BTreeMap::new();

    while let Some(line) = lines.next_line().await? {
        if line.starts_with("##INFO=") {
            if let Some(id) = extract_id(&line) {
                info_fields.push(id);
            }
            continue;
        }
        if let Some(header) = line.strip_prefix("#CHROM") {
            // header is "\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO[\tFORMAT\tsample...]"
            // after the #CHROM prefix is stripped, so skip the 9 fixed columns.
            sample_names = header
                .split('\t')
                .skip(9)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 5 {
            continue;
        }
        variant_count += 1;

        let filter_val = fields.get(6).copied().unwrap_or(".");
        *filter_histogram.entry(filter_val.to_string()).or_insert(0) += 1;
        if filter_val == "PASS" {
            pass_count += 1;
        }

        let reference = fields[3];
        for alt in fields[4].split(',') {
            let kind = classify_allele(reference, alt);
            *allele_types.entry(kind).or_insert(0) += 1;
        }
    }

    let pass_rate = if variant_count > 0 { pass_count as f64 / variant_count as f64 * 100.0 } else { 0.0 };
    let is_sites_only = sample_names.is_empty();

    let mut flags = Vec::new();
    if variant_count == 0 {
        flags.push(flag(QualitySeverity::Error, "EMPTY_VCF", "No variant records found"));
    }
    if variant_count > 0 && pass_rate < 50.0 {
        flags.push(flag(
            QualitySeverity::Warning,
            "LOW_PASS_RATE",
            format!("Only {pass_rate:.1}% of variants PASS filters"),
        ));
    }
    if is_sites_only {
        flags.push(flag(
            QualitySeverity::Info,
            "SITES_ONLY",
            "No sample genotype columns — this is a sites-only VCF",
        ));
    }

    let overall_quality = if flags.iter().any(|f| f.severity == QualitySeverity::Error) {
        QualityLevel::Poor
    } else if flags.iter().any(|f| f.severity == QualitySeverity::Warning) {
        QualityLevel::Acceptable
    } else {
        QualityLevel::Good
    };

    let allele_summary = allele_types
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(FileProfile {
        fetched_file_ref: fetched.local_path.clone(),
        format: format.clone(),
        statistics: stats_map(vec![
            ("total_variants", variant_count.to_string()),
            ("samples", sample_names.len().to_string()),
            ("pass_rate_pct", format!("{pass_rate:.1}")),
            ("info_field_count", info_fields.len().to_string()),
            ("allele_types", allele_summary),
        ]),
        preview: format!(
            "{variant_count} variants across {} samples, {pass_rate:.1}% PASS",
            sample_names.len()
        ),
        column_info: None,
        quality_flags: flags,
        overall_quality,
        suggested_analyses: Vec::new(),
        present_companions: Vec::new(),
        missing_companions: Vec::new(),
    })
}

fn extract_id(info_line: &str) -> Option<String> {
    let start = info_line.find("ID=")? + 3;
    let rest = &info_line[start..];
    let end = rest.find(|c| c == ',' || c == '>')?;
    Some(rest[..end].to_string())
}

fn classify_allele(reference: &str, alt: &str) -> &'static str {
    if alt == "*" || alt.starts_with('<') {
        return "Complex";
    }
    if reference.len() == 1 && alt.len() == 1 {
        "SNV"
    } else if reference.len() == alt.len() {
        "MNV"
    } else if alt.len() > reference.len() {
        "Ins"
    } else {
        "Del"
    }
}

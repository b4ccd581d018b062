//! Format-specific profilers, grounded in
//! `original_source/data_input/profilers.py`. Each profiler fills in
//! `FileProfile.statistics`/`preview`/`column_info`/`quality_flags` for its format;
//! `profile()` dispatches by `FileFormat.name` and falls back to a generic
//! byte/line-count profile for anything without a dedicated profiler.

mod bam;
mod fasta;
mod fastq;
mod generic;
mod tabular;
mod vcf;

use std::collections::BTreeMap;

use ba_domain::bio::ingest::{
    FetchedFile, FileFormat, FileProfile, QualityFlag, QualityLevel, QualitySeverity,
    SuggestedAnalysis,
};
use ba_domain::error::Result;

pub async fn profile(fetched: &FetchedFile, format: &FileFormat) -> Result<FileProfile> {
    let mut profile = match format.name.as_str() {
        "FASTQ" => fastq::profile(fetched, format).await?,
        "VCF" => vcf::profile(fetched, format).await?,
        "BAM" | "SAM" | "CRAM" => bam::profile(fetched, format).await?,
        "CSV" | "TSV" => tabular::profile(fetched, format).await?,
        "FASTA" => fasta::profile(fetched, format).await?,
        _ => generic::profile(fetched, format).await?,
    };

    let (present, missing) = companions(fetched, format).await;
    profile.present_companions = present;
    profile.missing_companions = missing;
    profile.suggested_analyses = suggest_analyses(format, &profile);
    profile.overall_quality = overall_quality(&profile.quality_flags, profile.overall_quality);
    Ok(profile)
}

async fn companions(fetched: &FetchedFile, format: &FileFormat) -> (Vec<String>, Vec<String>) {
    let mut present = Vec::new();
    let mut missing = Vec::new();

    for ext in &format.expected_companion_extensions {
        let candidate = format!("{}.{}", fetched.local_path.display(), ext);
        if tokio::fs::metadata(&candidate).await.is_ok() {
            present.push(candidate);
        } else {
            missing.push(format!("{}.{}", fetched.original_name, ext));
        }
    }

    // Paired-end FASTQ mate detection by filename pattern (spec.md §4.6).
    if format.name == "FASTQ" {
        if let Some(mate) = mate_file_candidate(fetched) {
            if tokio::fs::metadata(&mate).await.is_ok() {
                present.push(mate.display().to_string());
            } else {
                missing.push(
                    mate.file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default(),
                );
            }
        }
    }

    (present, missing)
}

fn mate_file_candidate(fetched: &FetchedFile) -> Option<std::path::PathBuf> {
    let name = fetched.local_path.file_name()?.to_string_lossy().to_string();
    const PAIRS: &[(&str, &str)] = &[("_1", "_2"), ("_R1", "_R2"), (".R1.", ".R2.")];
    for (a, b) in PAIRS {
        if let Some(idx) = name.find(a) {
            let mate_name = format!("{}{}{}", &name[..idx], b, &name[idx + a.len()..]);
            return Some(fetched.local_path.with_file_name(mate_name));
        }
        if let Some(idx) = name.find(b) {
            let mate_name = format!("{}{}{}", &name[..idx], a, &name[idx + b.len()..]);
            return Some(fetched.local_path.with_file_name(mate_name));
        }
    }
    None
}

fn overall_quality(flags: &[QualityFlag], current: QualityLevel) -> QualityLevel {
    if flags.iter().any(|f| f.severity == QualitySeverity::Error) {
        return QualityLevel::Poor;
    }
    if flags.iter().any(|f| f.severity == QualitySeverity::Warning) {
        return if current == QualityLevel::Unknown { QualityLevel::Acceptable } else { current };
    }
    if current == QualityLevel::Unknown {
        return QualityLevel::Good;
    }
    current
}

fn suggest_analyses(format: &FileFormat, profile: &FileProfile) -> Vec<SuggestedAnalysis> {
    match format.name.as_str() {
        "FASTQ" => vec![SuggestedAnalysis {
            name: "Quality control and trimming".into(),
            tools: vec!["FastQC".into(), "fastp".into()],
            prerequisites: vec![],
            priority: 1,
            example_query: "Run FastQC on these reads and trim adapters with fastp".into(),
        }],
        "VCF" => vec![SuggestedAnalysis {
            name: "Variant annotation and filtering".into(),
            tools: vec!["bcftools".into(), "VEP".into()],
            prerequisites: vec!["tabix index".into()],
            priority: 1,
            example_query: "Annotate these variants with VEP and filter for PASS calls".into(),
        }],
        "BAM" | "SAM" | "CRAM" => vec![SuggestedAnalysis {
            name: "Alignment QC".into(),
            tools: vec!["samtools flagstat".into(), "samtools idxstats".into()],
            prerequisites: vec!["BAM index".into()],
            priority: 1,
            example_query: "Report the mapping rate and duplication rate for this BAM".into(),
        }],
        "CSV" | "TSV" => {
            let mut suggestions = vec![SuggestedAnalysis {
                name: "Exploratory data analysis".into(),
                tools: vec!["pandas".into(), "seaborn".into()],
                prerequisites: vec![],
                priority: 2,
                example_query: "Summarize and visualize the distributions in this table".into(),
            }];
            if looks_like_count_matrix(profile) {
                suggestions.insert(
                    0,
                    SuggestedAnalysis {
                        name: "Differential expression".into(),
                        tools: vec!["DESeq2".into(), "edgeR".into(), "limma".into()],
                        prerequisites: vec!["sample metadata".into()],
                        priority: 1,
                        example_query: "Run DESeq2 on this count matrix comparing the two conditions".into(),
                    },
                );
            }
            suggestions
        }
        _ => Vec::new(),
    }
}

fn looks_like_count_matrix(profile: &FileProfile) -> bool {
    let Some(columns) = &profile.column_info else {
        return false;
    };
    let has_gene_col = columns.iter().any(|c| {
        let lower = c.name.to_lowercase();
        lower.contains("gene") || lower.contains("ensembl") || lower.contains("symbol")
    });
    let numeric_cols = columns.iter().filter(|c| c.dtype == "numeric" || c.dtype == "integer").count();
    has_gene_col && numeric_cols >= 2
}

pub(crate) fn flag(severity: QualitySeverity, code: &str, message: impl Into<String>) -> QualityFlag {
    QualityFlag { severity, code: code.to_string(), message: message.into() }
}

pub(crate) fn stats_map(pairs: Vec<(&str, String)>) -> BTreeMap<String, String> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

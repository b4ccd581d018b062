//! Dataset validation, grounded in
//! `original_source/data_input/dataset_validator.py`'s `DatasetValidator`:
//! per-analysis-type checks that a set of profiles is ready for downstream
//! analysis.

use ba_domain::bio::ingest::{
    DatasetValidation, FileFormatCategory, FileProfile, QualityLevel, QualitySeverity,
};

pub fn validate(profiles: &[FileProfile], analysis_type: &str) -> DatasetValidation {
    let analysis_type = if analysis_type == "auto" {
        detect_analysis_type(profiles)
    } else {
        analysis_type.to_string()
    };

    match analysis_type.as_str() {
        "rnaseq" => validate_rnaseq(profiles),
        "variant" => validate_variant(profiles),
        "singlecell" => validate_singlecell(profiles),
        "alignment" => validate_alignment(profiles),
        other => validate_generic(profiles, other),
    }
}

fn detect_analysis_type(profiles: &[FileProfile]) -> String {
    let formats: Vec<&str> = profiles.iter().map(|p| p.format.name.as_str()).collect();

    if formats.iter().any(|f| matches!(*f, "AnnData (h5ad)" | "Loom" | "Matrix Market")) {
        return "singlecell".into();
    }
    if formats.iter().any(|f| *f == "VCF" || *f == "BCF") {
        return "variant".into();
    }
    if formats.iter().any(|f| *f == "FASTQ") {
        return "alignment".into();
    }
    for p in profiles {
        if p.format.category == FileFormatCategory::Tabular {
            if let Some(cols) = &p.column_info {
                if cols.iter().any(|c| {
                    let l = c.name.to_lowercase();
                    l.contains("gene") || l.contains("ensembl")
                }) {
                    return "rnaseq".into();
                }
            }
        }
    }
    "generic".into()
}

fn validate_rnaseq(profiles: &[FileProfile]) -> DatasetValidation {
    let mut passed = Vec::new();
    let mut failed = Vec::new();
    let mut warnings = Vec::new();
    let mut missing = Vec::new();
    let mut suggested_fixes = Vec::new();

    let mut has_counts = false;
    let mut has_metadata = false;
    let mut has_annotation = false;

    for p in profiles {
        let file_name = display_name(p);
        if p.format.category == FileFormatCategory::Tabular {
            if let Some(cols) = &p.column_info {
                let lower: Vec<String> = cols.iter().map(|c| c.name.to_lowercase()).collect();
                let has_gene_col = lower.iter().any(|c| c.contains("gene") || c.contains("ensembl") || c.contains("symbol"));
                let numeric_cols = cols.iter().filter(|c| c.dtype == "numeric" || c.dtype == "integer").count();
                if has_gene_col && numeric_cols >= 2 {
                    has_counts = true;
                    passed.push(format!("Expression matrix found: {file_name}"));
                }
                if lower.iter().any(|c| ["sample", "condition", "group", "treatment", "batch"].iter().any(|m| c.contains(m))) {
                    has_metadata = true;
                    passed.push(format!("Sample metadata found: {file_name}"));
                }
            }
        }
        if matches!(p.format.name.as_str(), "GTF" | "GFF3" | "GFF") {
            has_annotation = true;
            passed.push(format!("Gene annotation found: {file_name}"));
        }
    }

    if !has_counts {
        failed.push("No expression count matrix detected".to_string());
        missing.push("Count matrix (CSV/TSV with gene IDs and sample counts)".to_string());
        suggested_fixes.push("Provide a count matrix file (genes as rows, samples as columns)".to_string());
    }
    if !has_metadata {
        warnings.push("No sample metadata file detected".to_string());
        suggested_fixes.push(
            "Provide a metadata CSV with columns: sample_id, condition (and optionally: batch, sex, age)".to_string(),
        );
    }
    if !has_annotation {
        warnings.push("No gene annotation (GTF/GFF) — will use gene IDs for enrichment".to_string());
    }

    for p in profiles {
        let errors: Vec<&str> = p.quality_flags.iter().filter(|f| f.severity == QualitySeverity::Error).map(|f| f.message.as_str()).collect();
        if !errors.is_empty() {
            failed.push(format!("Quality issues in {}: {}", display_name(p), errors.join("; ")));
        }
    }

    DatasetValidation {
        analysis_type: "RNA-seq Analysis".to_string(),
        ready: has_counts,
        passed,
        failed,
        warnings,
        missing,
        suggested_fixes,
    }
}

fn validate_variant(profiles: &[FileProfile]) -> DatasetValidation {
    let mut passed = Vec::new();
    let mut failed = Vec::new();
    let mut warnings = Vec::new();
    let mut missing = Vec::new();
    let mut suggested_fixes = Vec::new();

    let mut has_vcf = false;
    let mut total_variants: u64 = 0;

    for p in profiles {
        if p.format.name == "VCF" || p.format.name == "BCF" {
            has_vcf = true;
            let variants: u64 = p.statistics.get("total_variants").and_then(|s| s.parse().ok()).unwrap_or(0);
            total_variants += variants;
            let samples = p.statistics.get("samples").cloned().unwrap_or_else(|| "?".into());
            passed.push(format!("VCF found: {} ({variants} variants, {samples} samples)", display_name(p)));

            if !p.missing_companions.is_empty() {
                warnings.push(format!("Missing index for {} — some tools require tabix index", display_name(p)));
                suggested_fixes.push(format!("Create index: tabix -p vcf {}", display_name(p)));
            }
        }
    }

    if !has_vcf {
        failed.push("No VCF/BCF file found".to_string());
        missing.push("VCF file with variants".to_string());
    }
    if has_vcf && total_variants == 0 {
        failed.push("VCF file(s) contain no variants".to_string());
    }

    let valid = has_vcf && total_variants > 0;
    DatasetValidation {
        analysis_type: "Variant Analysis".to_string(),
        ready: valid,
        passed,
        failed,
        warnings,
        missing,
        suggested_fixes,
    }
}

fn validate_singlecell(profiles: &[FileProfile]) -> DatasetValidation {
    let mut passed = Vec::new();
    let mut failed = Vec::new();
    let mut warnings = Vec::new();
    let mut missing = Vec::new();

    let mut has_expression = false;
    for p in profiles {
        match p.format.name.as_str() {
            "AnnData (h5ad)" | "Loom" | "HDF5" => {
                has_expression = true;
                passed.push(format!("Expression data found: {}", display_name(p)));
            }
            "Matrix Market" => {
                has_expression = true;
                passed.push(format!("Sparse matrix found: {}", display_name(p)));
                warnings.push("MTX format requires barcodes.tsv.gz and features.tsv.gz in the same directory".to_string());
            }
            _ => {}
        }
    }

    if !has_expression {
        failed.push("No single-cell expression data found".to_string());
        missing.push("Expression matrix (.h5ad, .h5, .mtx, or .loom)".to_string());
    }

    DatasetValidation {
        analysis_type: "Single-Cell Analysis".to_string(),
        ready: has_expression,
        passed,
        failed,
        warnings,
        missing,
        suggested_fixes: Vec::new(),
    }
}

fn validate_alignment(profiles: &[FileProfile]) -> DatasetValidation {
    let mut passed = Vec::new();
    let mut failed = Vec::new();
    let mut warnings = Vec::new();
    let mut missing = Vec::new();

    let fastq_files: Vec<&FileProfile> = profiles.iter().filter(|p| p.format.name == "FASTQ").collect();
    let mut has_reference = false;

    for p in &fastq_files {
        let avg_len = p.statistics.get("mean_read_length").cloned().unwrap_or_else(|| "?".into());
        passed.push(format!("Reads found: {} ({avg_len} bp avg)", display_name(p)));
    }
    if profiles.iter().any(|p| p.format.name == "FASTA") {
        has_reference = true;
        passed.push("Reference genome present".to_string());
    }

    if fastq_files.is_empty() {
        failed.push("No FASTQ files found".to_string());
        missing.push("FASTQ sequencing reads".to_string());
    } else if fastq_files.len() >= 2 {
        passed.push(format!("Multiple FASTQ files detected ({}) — likely paired-end", fastq_files.len()));
    } else {
        warnings.push("Only one FASTQ file — if paired-end, provide the mate file".to_string());
    }

    if !has_reference {
        warnings.push("No reference genome provided — you'll need to specify one (e.g., GRCh38) during alignment".to_string());
    }

    for p in &fastq_files {
        for f in p.quality_flags.iter().filter(|f| f.severity != QualitySeverity::Info) {
            warnings.push(format!("{}: {}", display_name(p), f.message));
        }
    }

    let ready = !fastq_files.is_empty();
    DatasetValidation {
        analysis_type: "Read Alignment".to_string(),
        ready,
        passed,
        failed,
        warnings,
        missing,
        suggested_fixes: Vec::new(),
    }
}

fn validate_generic(profiles: &[FileProfile], label: &str) -> DatasetValidation {
    let mut passed = Vec::new();
    let mut failed = Vec::new();

    for p in profiles {
        match p.overall_quality {
            QualityLevel::Good | QualityLevel::Acceptable => {
                passed.push(format!("{}: {} ok", display_name(p), p.format.name));
            }
            _ => failed.push(format!("{}: quality is {:?}", display_name(p), p.overall_quality)),
        }
    }

    let ready = profiles.iter().any(|p| !matches!(p.overall_quality, QualityLevel::Poor));
    DatasetValidation {
        analysis_type: if label == "generic" { "General Analysis".to_string() } else { label.to_string() },
        ready,
        passed,
        failed,
        warnings: Vec::new(),
        missing: Vec::new(),
        suggested_fixes: Vec::new(),
    }
}

fn display_name(profile: &FileProfile) -> String {
    profile
        .fetched_file_ref
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| profile.fetched_file_ref.display().to_string())
}

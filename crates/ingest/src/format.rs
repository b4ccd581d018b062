//! Format detection, grounded in `original_source/data_input/format_detector.py`:
//! an extension map backed by magic-byte/content inspection for ambiguous or
//! extensionless files. Content-based detection wins ties at lower confidence
//! per spec.md §4.6.

use std::path::Path;

use ba_domain::bio::ingest::{FileFormat, FileFormatCategory};

struct FormatRule {
    extensions: &'static [&'static str],
    name: &'static str,
    category: FileFormatCategory,
    is_binary: bool,
    companions: &'static [&'static str],
}

const RULES: &[FormatRule] = &[
    FormatRule { extensions: &["fastq", "fq"], name: "FASTQ", category: FileFormatCategory::Sequence, is_binary: false, companions: &[] },
    FormatRule { extensions: &["fasta", "fa", "fna", "faa"], name: "FASTA", category: FileFormatCategory::Sequence, is_binary: false, companions: &["fai"] },
    FormatRule { extensions: &["sam"], name: "SAM", category: FileFormatCategory::Alignment, is_binary: false, companions: &[] },
    FormatRule { extensions: &["bam"], name: "BAM", category: FileFormatCategory::Alignment, is_binary: true, companions: &["bai"] },
    FormatRule { extensions: &["cram"], name: "CRAM", category: FileFormatCategory::Alignment, is_binary: true, companions: &["crai"] },
    FormatRule { extensions: &["vcf"], name: "VCF", category: FileFormatCategory::Variant, is_binary: false, companions: &["tbi", "csi"] },
    FormatRule { extensions: &["bcf"], name: "BCF", category: FileFormatCategory::Variant, is_binary: true, companions: &["csi"] },
    FormatRule { extensions: &["gtf"], name: "GTF", category: FileFormatCategory::Annotation, is_binary: false, companions: &[] },
    FormatRule { extensions: &["gff3", "gff"], name: "GFF3", category: FileFormatCategory::Annotation, is_binary: false, companions: &[] },
    FormatRule { extensions: &["bed"], name: "BED", category: FileFormatCategory::Ranges, is_binary: false, companions: &[] },
    FormatRule { extensions: &["bedgraph"], name: "bedGraph", category: FileFormatCategory::Ranges, is_binary: false, companions: &[] },
    FormatRule { extensions: &["pdb"], name: "PDB", category: FileFormatCategory::Structure, is_binary: false, companions: &[] },
    FormatRule { extensions: &["cif"], name: "mmCIF", category: FileFormatCategory::Structure, is_binary: false, companions: &[] },
    FormatRule { extensions: &["nwk", "newick", "tree"], name: "Newick", category: FileFormatCategory::Phylogeny, is_binary: false, companions: &[] },
    FormatRule { extensions: &["h5ad"], name: "AnnData (h5ad)", category: FileFormatCategory::Expression, is_binary: true, companions: &[] },
    FormatRule { extensions: &["loom"], name: "Loom", category: FileFormatCategory::Expression, is_binary: true, companions: &[] },
    FormatRule { extensions: &["h5", "hdf5"], name: "HDF5", category: FileFormatCategory::Expression, is_binary: true, companions: &[] },
    FormatRule { extensions: &["mtx"], name: "Matrix Market", category: FileFormatCategory::Expression, is_binary: false, companions: &["barcodes.tsv.gz", "features.tsv.gz"] },
    FormatRule { extensions: &["csv"], name: "CSV", category: FileFormatCategory::Tabular, is_binary: false, companions: &[] },
    FormatRule { extensions: &["tsv", "txt"], name: "TSV", category: FileFormatCategory::Tabular, is_binary: false, companions: &[] },
    FormatRule { extensions: &["xlsx", "xls"], name: "Excel", category: FileFormatCategory::Tabular, is_binary: true, companions: &[] },
    FormatRule { extensions: &["png", "jpg", "jpeg", "svg", "tiff"], name: "Image", category: FileFormatCategory::Image, is_binary: true, companions: &[] },
    FormatRule { extensions: &["pdf"], name: "PDF", category: FileFormatCategory::Document, is_binary: true, companions: &[] },
    FormatRule { extensions: &["json"], name: "JSON", category: FileFormatCategory::Document, is_binary: false, companions: &[] },
    FormatRule { extensions: &["tar", "zip", "gz", "tgz"], name: "Archive", category: FileFormatCategory::Archive, is_binary: true, companions: &[] },
];

/// Detect a format from extension, then corroborate/override with a peek at
/// the file's content for ambiguous or extensionless inputs.
pub async fn detect_format(path: &Path) -> ba_domain::error::Result<FileFormat> {
    let (stem_ext, canonical) = double_extension(path);

    if let Some(rule) = RULES.iter().find(|r| r.extensions.contains(&stem_ext.as_str())) {
        let mut confidence = 0.9;
        // Content inspection can still override a generic .txt extension.
        if rule.name == "TSV" {
            if let Some(detected) = sniff_text_content(path).await {
                confidence = 0.6;
                return Ok(build_format(detected, confidence, &canonical));
            }
        }
        return Ok(FileFormat {
            name: rule.name.to_string(),
            category: rule.category,
            canonical_extension: canonical,
            is_binary: rule.is_binary,
            expected_companion_extensions: rule.companions.iter().map(|s| s.to_string()).collect(),
            detection_confidence: confidence,
        });
    }

    if let Some(detected) = sniff_text_content(path).await {
        return Ok(build_format(detected, 0.4, &canonical));
    }

    Ok(FileFormat {
        name: "Unknown".to_string(),
        category: FileFormatCategory::Other,
        canonical_extension: canonical,
        is_binary: is_probably_binary(path).await,
        expected_companion_extensions: Vec::new(),
        detection_confidence: 0.1,
    })
}

fn build_format(name: &'static str, confidence: f64, canonical: &str) -> FileFormat {
    let rule = RULES.iter().find(|r| r.name == name);
    FileFormat {
        name: name.to_string(),
        category: rule.map(|r| r.category).unwrap_or(FileFormatCategory::Other),
        canonical_extension: canonical.to_string(),
        is_binary: rule.map(|r| r.is_binary).unwrap_or(false),
        expected_companion_extensions: rule
            .map(|r| r.companions.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default(),
        detection_confidence: confidence,
    }
}

/// Handles double extensions like `.fastq.gz`, mirroring `FetchedFile.extension`
/// in `data_source.py`.
fn double_extension(path: &Path) -> (String, String) {
    const DOUBLE: &[&str] = &[
        "fastq.gz", "fasta.gz", "fa.gz", "fq.gz", "vcf.gz", "bed.gz", "gff.gz", "gtf.gz",
        "sam.gz", "tar.gz", "tar.bz2", "tar.xz", "csv.gz", "tsv.gz",
    ];
    let name_lower = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    for pattern in DOUBLE {
        if name_lower.ends_with(pattern) {
            let stem_ext = pattern.split('.').next().unwrap_or(pattern).to_string();
            return (stem_ext, format!(".{pattern}"));
        }
    }
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let canonical = if ext.is_empty() { String::new() } else { format!(".{ext}") };
    (ext, canonical)
}

/// Peek at the first line(s) of a text file to disambiguate tabular vs plain
/// text vs FASTA/FASTQ content when the extension alone is inconclusive.
async fn sniff_text_content(path: &Path) -> Option<&'static str> {
    let bytes = tokio::fs::read(path).await.ok()?;
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(4096)]).to_string();
    let first_line = head.lines().next()?;

    if first_line.starts_with('>') {
        return Some("FASTA");
    }
    if first_line.starts_with('@') && head.lines().nth(2).is_some_and(|l| l.starts_with('+')) {
        return Some("FASTQ");
    }
    if first_line.starts_with("##fileformat=VCF") {
        return Some("VCF");
    }
    let tabs = first_line.matches('\t').count();
    let commas = first_line.matches(',').count();
    if tabs > commas && tabs > 0 {
        return Some("TSV");
    }
    if commas > 0 {
        return Some("CSV");
    }
    None
}

async fn is_probably_binary(path: &Path) -> bool {
    let Ok(bytes) = tokio::fs::read(path).await else {
        return false;
    };
    bytes.iter().take(512).any(|b| *b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn detects_fastq_gz_double_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample_R1.fastq.gz");
        std::fs::write(&path, b"irrelevant").unwrap();
        let fmt = detect_format(&path).await.unwrap();
        assert_eq!(fmt.name, "FASTQ");
        assert_eq!(fmt.canonical_extension, ".fastq.gz");
    }

    #[tokio::test]
    async fn detects_csv_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counts.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "gene_id,sample1,sample2").unwrap();
        let fmt = detect_format(&path).await.unwrap();
        assert_eq!(fmt.name, "CSV");
        assert_eq!(fmt.category, FileFormatCategory::Tabular);
    }

    #[tokio::test]
    async fn sniffs_tsv_content_for_txt_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "gene_id\tsample1\tsample2").unwrap();
        let fmt = detect_format(&path).await.unwrap();
        assert_eq!(fmt.name, "TSV");
        assert!(fmt.detection_confidence < 0.9);
    }
}

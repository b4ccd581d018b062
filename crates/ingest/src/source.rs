//! Source detection and fetch, grounded in
//! `original_source/data_input/data_source.py`'s `DataSource`/`FileFetcher`.

use std::path::{Path, PathBuf};

use ba_domain::bio::ingest::{Compression, FetchedFile, SourceDescriptor};
use ba_domain::error::{Error, Result};
use sha2::{Digest, Sha256};

/// A source string classified but not yet fetched.
#[derive(Debug, Clone)]
pub struct DetectedSource {
    pub descriptor: SourceDescriptor,
    pub original_name: String,
    /// Populated only for inline/pasted content — the bytes to write out on fetch.
    pub inline_content: Option<Vec<u8>>,
}

/// Auto-detect a source string's type (spec.md §4.6's `detect_source`).
pub fn detect_source(input: &str) -> DetectedSource {
    let trimmed = input.trim();

    if let Some(rest) = trimmed.strip_prefix("s3://") {
        let (_bucket, key) = split_bucket_key(rest);
        let name = key_basename(&key).unwrap_or_else(|| "s3_file".into());
        return DetectedSource {
            descriptor: SourceDescriptor::S3Uri { uri: trimmed.to_string() },
            original_name: name,
            inline_content: None,
        };
    }
    if let Some(rest) = trimmed.strip_prefix("gs://") {
        let (_bucket, key) = split_bucket_key(rest);
        let name = key_basename(&key).unwrap_or_else(|| "gcs_file".into());
        return DetectedSource {
            descriptor: SourceDescriptor::GcsUri { uri: trimmed.to_string() },
            original_name: name,
            inline_content: None,
        };
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") || trimmed.starts_with("ftp://") {
        let name = trimmed
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("downloaded_file")
            .to_string();
        return DetectedSource {
            descriptor: SourceDescriptor::HttpUrl { url: trimmed.to_string() },
            original_name: name,
            inline_content: None,
        };
    }
    if trimmed.starts_with('>') || looks_like_sequence(trimmed) {
        let ext = if trimmed.starts_with('>') { "fasta" } else { "txt" };
        let bytes = trimmed.as_bytes().to_vec();
        return DetectedSource {
            descriptor: SourceDescriptor::InlineBytes { len: bytes.len() },
            original_name: format!("input.{ext}"),
            inline_content: Some(bytes),
        };
    }
    if Path::new(trimmed).exists() {
        let name = Path::new(trimmed)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| trimmed.to_string());
        return DetectedSource {
            descriptor: SourceDescriptor::LocalPath { path: PathBuf::from(trimmed) },
            original_name: name,
            inline_content: None,
        };
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        let name = Path::new(trimmed)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| trimmed.to_string());
        return DetectedSource {
            descriptor: SourceDescriptor::LocalPath { path: PathBuf::from(trimmed) },
            original_name: name,
            inline_content: None,
        };
    }

    let bytes = trimmed.as_bytes().to_vec();
    DetectedSource {
        descriptor: SourceDescriptor::InlineBytes { len: bytes.len() },
        original_name: "input_data.txt".to_string(),
        inline_content: Some(bytes),
    }
}

fn split_bucket_key(rest: &str) -> (String, String) {
    match rest.split_once('/') {
        Some((bucket, key)) => (bucket.to_string(), key.to_string()),
        None => (rest.to_string(), String::new()),
    }
}

fn key_basename(key: &str) -> Option<String> {
    if key.is_empty() {
        return None;
    }
    key.rsplit('/').next().map(str::to_string)
}

fn looks_like_sequence(text: &str) -> bool {
    let cleaned: String = text
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if cleaned.len() < 10 {
        return false;
    }
    const NUCLEOTIDE: &str = "ACGTURYKMSWBDHVN";
    const PROTEIN: &str = "ACDEFGHIKLMNPQRSTVWY";
    let chars: std::collections::HashSet<char> = cleaned.chars().collect();
    chars.iter().all(|c| NUCLEOTIDE.contains(*c)) || chars.iter().all(|c| PROTEIN.contains(*c))
}

/// Fetch a detected source into `workspace_dir/ingested/`, collision-free.
pub async fn fetch(workspace_dir: &Path, detected: DetectedSource) -> Result<FetchedFile> {
    let ingested_dir = workspace_dir.join("ingested");
    tokio::fs::create_dir_all(&ingested_dir).await?;

    let target_path = unique_target_path(&ingested_dir, &detected.original_name).await;

    match &detected.descriptor {
        SourceDescriptor::LocalPath { path } => {
            if !path.exists() {
                return Err(Error::Other(format!("file not found: {}", path.display())));
            }
            if path != &target_path {
                tokio::fs::copy(path, &target_path).await?;
            }
        }
        SourceDescriptor::UploadTempPath { path } => {
            tokio::fs::copy(path, &target_path).await?;
        }
        SourceDescriptor::HttpUrl { url } => {
            let resp = reqwest::Client::new()
                .get(url)
                .header("User-Agent", "BioAgent/1.0")
                .timeout(std::time::Duration::from_secs(300))
                .send()
                .await
                .map_err(|e| Error::Other(format!("failed to download {url}: {e}")))?;
            let bytes = resp
                .bytes()
                .await
                .map_err(|e| Error::Other(format!("failed to read response body for {url}: {e}")))?;
            tokio::fs::write(&target_path, &bytes).await?;
        }
        SourceDescriptor::S3Uri { uri } => fetch_via_cli("aws", &["s3", "cp", uri, &path_str(&target_path)]).await?,
        SourceDescriptor::GcsUri { uri } => fetch_via_cli("gsutil", &["cp", uri, &path_str(&target_path)]).await?,
        SourceDescriptor::InlineBytes { .. } => {
            let content = detected
                .inline_content
                .as_ref()
                .ok_or_else(|| Error::Other("inline source missing content".into()))?;
            tokio::fs::write(&target_path, content).await?;
        }
    }

    let metadata = tokio::fs::metadata(&target_path).await?;
    let content_hash = hash_file(&target_path).await?;
    let compression = detect_compression(&target_path).await?;

    Ok(FetchedFile {
        local_path: target_path,
        original_name: detected.original_name,
        source: detected.descriptor,
        size_bytes: metadata.len(),
        content_hash,
        fetch_ts: chrono::Utc::now(),
        compression,
    })
}

async fn unique_target_path(dir: &Path, filename: &str) -> PathBuf {
    let mut candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, suffix) = split_stem_suffix(filename);
    let mut counter = 1u32;
    loop {
        candidate = dir.join(format!("{stem}_{counter}{suffix}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

fn split_stem_suffix(filename: &str) -> (String, String) {
    match filename.find('.') {
        Some(idx) => (filename[..idx].to_string(), filename[idx..].to_string()),
        None => (filename.to_string(), String::new()),
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

async fn fetch_via_cli(program: &str, args: &[&str]) -> Result<()> {
    let output = tokio::process::Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| Error::Other(format!("{program} not available: {e}")))?;
    if !output.status.success() {
        return Err(Error::Other(format!(
            "{program} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}

async fn hash_file(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

async fn detect_compression(path: &Path) -> Result<Compression> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut magic = [0u8; 4];
    use tokio::io::AsyncReadExt;
    let n = file.read(&mut magic).await?;
    if n < 2 {
        return Ok(Compression::None);
    }
    if magic[0] == 0x1f && magic[1] == 0x8b {
        return Ok(Compression::Gzip);
    }
    if n >= 3 && &magic[0..3] == b"BZh" {
        return Ok(Compression::Bzip2);
    }
    if n >= 4 && magic == [0x28, 0xb5, 0x2f, 0xfd] {
        return Ok(Compression::Zstd);
    }
    Ok(Compression::None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_source_classifies_url() {
        let d = detect_source("https://example.com/data/variants.vcf");
        assert!(matches!(d.descriptor, SourceDescriptor::HttpUrl { .. }));
        assert_eq!(d.original_name, "variants.vcf");
    }

    #[test]
    fn detect_source_classifies_s3() {
        let d = detect_source("s3://my-bucket/experiment/counts.csv");
        assert!(matches!(d.descriptor, SourceDescriptor::S3Uri { .. }));
        assert_eq!(d.original_name, "counts.csv");
    }

    #[test]
    fn detect_source_classifies_fasta_paste() {
        let d = detect_source(">seq1\nACGTACGTACGTACGT");
        assert!(matches!(d.descriptor, SourceDescriptor::InlineBytes { .. }));
        assert_eq!(d.original_name, "input.fasta");
    }

    #[test]
    fn detect_source_classifies_raw_sequence() {
        let d = detect_source("ACGTACGTACGTACGTACGT");
        assert_eq!(d.original_name, "input.txt");
    }
}

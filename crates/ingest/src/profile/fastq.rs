//! FASTQ profiler, grounded in `profilers.py`'s `FastqProfiler`: sample up to
//! `SAMPLE_READS` reads, compute GC%/length/quality stats, flag anomalies.

use ba_domain::bio::ingest::{FetchedFile, FileFormat, FileProfile, QualityLevel, QualitySeverity};
use ba_domain::error::Result;

use super::{flag, stats_map};

const SAMPLE_READS: usize = 10_000;

pub async fn profile(fetched: &FetchedFile, format: &FileFormat) -> Result<FileProfile> {
    let raw = tokio::fs::read(&fetched.local_path).await?;
    let decoded;
    let text: &[u8] = if fetched.compression == ba_domain::bio::ingest::Compression::Gzip {
        // Decompression of gzip streams is handled synchronously via flate2; since
        // the whole file is already read into memory this adds no extra cost.
        let mut decoder = flate2::read::GzDecoder::new(&raw[..]);
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut buf)
            .map_err(|e| ba_domain::error::Error::Parse(format!("gzip decode failed: {e}")))?;
        decoded = buf;
        &decoded
    } else {
        &raw
    };

    let mut lines = String::from_utf8_lossy(text).lines().map(str::to_string).collect::<Vec<_>>().into_iter();
    let mut read_count = 0usize;
    let mut gc_count: u64 = 0;
    let mut total_bases: u64 = 0;
    let mut min_len = usize::MAX;
    let mut max_len = 0usize;
    let mut length_sum: u64 = 0;
    let mut qual_sum: u64 = 0;
    let mut qual_count: u64 = 0;
    let mut lengths_vary = false;

    loop {
        let Some(header) = lines.next() else { break };
        if !header.starts_with('@') {
            continue;
        }
        let Some(seq) = lines.next() else { break };
        let Some(_plus) = lines.next() else { break };
        let Some(qual) = lines.next() else { break };

        let len = seq.len();
        if min_len != usize::MAX && len != min_len {
            lengths_vary = true;
        }
        min_len = min_len.min(len);
        max_len = max_len.max(len);
        length_sum += len as u64;
        total_bases += len as u64;
        gc_count += seq.bytes().filter(|b| matches!(b, b'G' | b'C' | b'g' | b'c')).count() as u64;
        for q in qual.bytes() {
            qual_sum += (q.saturating_sub(33)) as u64;
            qual_count += 1;
        }

        read_count += 1;
        if read_count >= SAMPLE_READS {
            break;
        }
    }

    let gc_pct = if total_bases > 0 { gc_count as f64 / total_bases as f64 * 100.0 } else { 0.0 };
    let mean_len = if read_count > 0 { length_sum as f64 / read_count as f64 } else { 0.0 };
    let mean_phred = if qual_count > 0 { qual_sum as f64 / qual_count as f64 } else { 0.0 };

    let mut flags = Vec::new();
    if read_count == 0 {
        flags.push(flag(QualitySeverity::Error, "EMPTY_FASTQ", "No reads found in file"));
    }
    if mean_phred > 0.0 && mean_phred < 20.0 {
        flags.push(flag(
            QualitySeverity::Warning,
            "LOW_QUALITY_READS",
            format!("Mean Phred quality {mean_phred:.1} is below 20"),
        ));
    }
    if !(35.0..=65.0).contains(&gc_pct) && total_bases > 0 {
        flags.push(flag(
            QualitySeverity::Warning,
            "UNUSUAL_GC_CONTENT",
            format!("GC content {gc_pct:.1}% is outside the typical 35-65% range"),
        ));
    }
    if lengths_vary {
        flags.push(flag(
            QualitySeverity::Info,
            "VARIABLE_READ_LENGTH",
            "Read lengths vary across the sampled reads",
        ));
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
        statistics: stats_map(vec![
            ("sampled_read_count", read_count.to_string()),
            ("gc_pct", format!("{gc_pct:.2}")),
            ("mean_read_length", format!("{mean_len:.1}")),
            ("min_read_length", if min_len == usize::MAX { "0".into() } else { min_len.to_string() }),
            ("max_read_length", max_len.to_string()),
            ("mean_phred", format!("{mean_phred:.1}")),
        ]),
        preview: format!("{read_count} reads sampled, mean length {mean_len:.0}bp, GC {gc_pct:.1}%"),
        column_info: None,
        quality_flags: flags,
        overall_quality,
        suggested_analyses: Vec::new(),
        present_companions: Vec::new(),
        missing_companions: Vec::new(),
    })
}

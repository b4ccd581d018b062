use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An author on a `Paper`. Grounded in the source literature client's
/// `Author` dataclass (name + derived last-name/initials).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub family: String,
    pub given: Option<String>,
    pub orcid: Option<String>,
}

impl Author {
    /// Initials built from the given name, e.g. "Jane Q" -> "JQ".
    pub fn initials(&self) -> String {
        match &self.given {
            Some(given) => given
                .split_whitespace()
                .filter_map(|p| p.chars().next())
                .map(|c| c.to_ascii_uppercase())
                .collect(),
            None => String::new(),
        }
    }
}

/// Unified paper representation across literature sources (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<Author>,
    pub year: Option<u32>,
    #[serde(default)]
    pub venue: Option<String>,
    /// Identifier mapping, e.g. {"doi": "...", "pmid": "...", "pmcid": "...", "s2": "...", "arxiv": "..."}.
    #[serde(default)]
    pub identifiers: BTreeMap<String, String>,
    #[serde(default)]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub citation_count: Option<u32>,
    #[serde(default)]
    pub reference_count: Option<u32>,
    #[serde(default)]
    pub is_open_access: bool,
    #[serde(default)]
    pub pdf_url: Option<String>,
    pub source_tag: String,
    #[serde(default)]
    pub relevance_score: Option<f64>,
}

impl Paper {
    /// Identity key per spec.md §3: lowercased DOI, else PMID, else
    /// normalized-title prefix. Used for cross-source deduplication.
    pub fn identity_key(&self) -> String {
        if let Some(doi) = self.identifiers.get("doi").filter(|v| !v.is_empty()) {
            return format!("doi:{}", doi.to_lowercase());
        }
        if let Some(pmid) = self.identifiers.get("pmid").filter(|v| !v.is_empty()) {
            return format!("pmid:{pmid}");
        }
        let normalized: String = self
            .title
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        format!("title:{}", &normalized[..normalized.len().min(100)])
    }

    /// Merge in values for fields this paper lacks, from a duplicate found
    /// during orchestrator deduplication. The identity-winning record's
    /// non-empty fields always take precedence.
    pub fn merge_missing_from(&mut self, other: &Paper) {
        if self.abstract_text.is_none() {
            self.abstract_text = other.abstract_text.clone();
        }
        if self.venue.is_none() {
            self.venue = other.venue.clone();
        }
        if self.citation_count.is_none() {
            self.citation_count = other.citation_count;
        }
        if self.reference_count.is_none() {
            self.reference_count = other.reference_count;
        }
        if self.pdf_url.is_none() {
            self.pdf_url = other.pdf_url.clone();
        }
        if !self.is_open_access {
            self.is_open_access = other.is_open_access;
        }
        for (k, v) in &other.identifiers {
            self.identifiers.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }

    pub fn first_author_et_al(&self) -> String {
        match self.authors.as_slice() {
            [] => "Unknown".into(),
            [a] => a.family.clone(),
            [a, b] => format!("{} and {}", a.family, b.family),
            [a, ..] => format!("{} et al.", a.family),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(title: &str, doi: &str, pmid: &str) -> Paper {
        let mut identifiers = BTreeMap::new();
        if !doi.is_empty() {
            identifiers.insert("doi".into(), doi.into());
        }
        if !pmid.is_empty() {
            identifiers.insert("pmid".into(), pmid.into());
        }
        Paper {
            title: title.into(),
            authors: vec![],
            year: Some(2024),
            venue: None,
            identifiers,
            abstract_text: None,
            citation_count: None,
            reference_count: None,
            is_open_access: false,
            pdf_url: None,
            source_tag: "test".into(),
            relevance_score: None,
        }
    }

    #[test]
    fn identity_key_prefers_doi_over_pmid() {
        let p = paper("Some Title", "10.1/ABC", "12345");
        assert_eq!(p.identity_key(), "doi:10.1/abc");
    }

    #[test]
    fn identity_key_falls_back_to_title() {
        let p = paper("Some Title!", "", "");
        assert_eq!(p.identity_key(), "title:sometitle");
    }

    #[test]
    fn merge_missing_from_fills_gaps_only() {
        let mut a = paper("A", "10.1/a", "");
        a.citation_count = Some(5);
        let mut b = paper("A", "", "999");
        b.citation_count = Some(99);
        b.pdf_url = Some("http://example.com/a.pdf".into());
        a.merge_missing_from(&b);
        assert_eq!(a.citation_count, Some(5));
        assert_eq!(a.pdf_url.as_deref(), Some("http://example.com/a.pdf"));
        assert_eq!(a.identifiers.get("pmid").map(String::as_str), Some("999"));
    }
}

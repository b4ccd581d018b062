//! Multi-source literature orchestrator (spec.md §4.5), grounded in
//! `Research_Agent/literature/clients.py`'s `LiteratureSearchOrchestrator`:
//! fan out to every requested source, merge by identity key, rank by a
//! weighted relevance score, and degrade silently on a per-source failure.

use std::collections::HashMap;
use std::sync::Arc;

use ba_domain::bio::Paper;
use ba_domain::error::Result;
use serde::{Deserialize, Serialize};

use ba_domain::bio::UniProtRecord;

use crate::sources::crossref::CrossRefClient;
use crate::sources::europepmc::EuropePmcClient;
use crate::sources::pubmed::PubMedClient;
use crate::sources::semantic_scholar::SemanticScholarClient;
use crate::sources::uniprot::UniProtClient;
use crate::sources::unpaywall::UnpaywallClient;
use crate::sources::LiteratureSource;

pub const DEFAULT_SOURCES: &[&str] = &["pubmed", "semantic_scholar", "europe_pmc"];

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
    #[serde(default = "default_max_per_source")]
    pub max_per_source: usize,
    #[serde(default)]
    pub year_from: Option<u32>,
    #[serde(default)]
    pub year_to: Option<u32>,
}

fn default_max_per_source() -> usize {
    20
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationDirection {
    In,
    Out,
    Both,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub papers: Vec<Paper>,
    pub query: String,
    pub total_found: usize,
    pub sources_searched: Vec<String>,
    /// Set when every requested source failed; the result is still `Ok`
    /// but callers should surface this to the user (spec.md §4.5).
    pub warning: Option<String>,
}

/// Configuration for constructing an orchestrator's concrete clients.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    pub ncbi_api_key: Option<String>,
    pub ncbi_email: Option<String>,
    pub s2_api_key: Option<String>,
}

pub struct LiteratureOrchestrator {
    pubmed: Arc<PubMedClient>,
    s2: Arc<SemanticScholarClient>,
    europe_pmc: Arc<EuropePmcClient>,
    crossref: Arc<CrossRefClient>,
    unpaywall: Arc<UnpaywallClient>,
    uniprot: Arc<UniProtClient>,
}

impl LiteratureOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            pubmed: Arc::new(PubMedClient::new(
                config.ncbi_api_key.clone(),
                config.ncbi_email.clone(),
            )),
            s2: Arc::new(SemanticScholarClient::new(config.s2_api_key.clone())),
            europe_pmc: Arc::new(EuropePmcClient::default()),
            crossref: Arc::new(CrossRefClient::new(config.ncbi_email.clone())),
            unpaywall: Arc::new(UnpaywallClient::new(config.ncbi_email)),
            uniprot: Arc::new(UniProtClient::new()),
        }
    }

    fn source_for(&self, name: &str) -> Option<Arc<dyn LiteratureSource>> {
        match name {
            "pubmed" => Some(self.pubmed.clone() as Arc<dyn LiteratureSource>),
            "semantic_scholar" => Some(self.s2.clone() as Arc<dyn LiteratureSource>),
            "europe_pmc" => Some(self.europe_pmc.clone() as Arc<dyn LiteratureSource>),
            "crossref" => Some(self.crossref.clone() as Arc<dyn LiteratureSource>),
            _ => None,
        }
    }

    pub async fn search(&self, req: SearchRequest) -> Result<SearchResult> {
        let sources: Vec<String> = req
            .sources
            .unwrap_or_else(|| DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect());

        let mut all_papers = Vec::new();
        let mut succeeded = 0usize;
        for name in &sources {
            let Some(client) = self.source_for(name) else {
                continue;
            };
            match client
                .search(&req.query, req.max_per_source, req.year_from, req.year_to)
                .await
            {
                Ok(papers) => {
                    succeeded += 1;
                    all_papers.extend(papers);
                }
                Err(e) => {
                    tracing::warn!(source = %name, error = %e, "literature source failed, degrading silently");
                }
            }
        }

        let warning = if succeeded == 0 && !sources.is_empty() {
            Some("all requested sources failed".to_string())
        } else {
            None
        };

        let deduplicated = deduplicate(all_papers);
        let ranked = rank(deduplicated, &req.query);

        Ok(SearchResult {
            papers: ranked.clone(),
            query: req.query,
            total_found: ranked.len(),
            sources_searched: sources,
            warning,
        })
    }

    pub async fn get_paper(&self, identifier: &str, id_type: &str) -> Result<Option<Paper>> {
        let kind = if id_type == "auto" {
            classify_identifier(identifier)
        } else {
            id_type
        };

        match kind {
            "doi" => {
                if let Some(paper) = self.s2.get_by_id(&format!("DOI:{identifier}")).await? {
                    return Ok(Some(paper));
                }
                self.crossref.get_by_id(identifier).await
            }
            "pmid" => self.pubmed.get_by_id(identifier).await,
            _ => self.s2.get_by_id(identifier).await,
        }
    }

    pub async fn citation_network(
        &self,
        paper_id: &str,
        direction: CitationDirection,
        cap: usize,
    ) -> Result<SearchResult> {
        let normalized = normalize_s2_id(paper_id);
        let mut papers = Vec::new();
        if matches!(direction, CitationDirection::In | CitationDirection::Both) {
            papers.extend(self.s2.citations(&normalized, cap).await?);
        }
        if matches!(direction, CitationDirection::Out | CitationDirection::Both) {
            papers.extend(self.s2.references(&normalized, cap).await?);
        }
        let deduplicated = deduplicate(papers);
        Ok(SearchResult {
            total_found: deduplicated.len(),
            papers: deduplicated,
            query: format!("citation network for {paper_id}"),
            sources_searched: vec!["semantic_scholar".into()],
            warning: None,
        })
    }

    pub async fn recommendations(&self, paper_id: &str, cap: usize) -> Result<Vec<Paper>> {
        let normalized = normalize_s2_id(paper_id);
        self.s2.recommendations(&normalized, cap).await
    }

    pub async fn open_access_pdf(&self, doi: &str) -> Result<Option<String>> {
        self.unpaywall.oa_lookup(doi).await
    }

    /// Look up a protein/sequence record by UniProt accession (spec.md §4.8).
    pub async fn uniprot_record(&self, accession: &str) -> Result<UniProtRecord> {
        self.uniprot.get_record(accession).await
    }

    /// Free-text search over UniProtKB, returning up to `limit` records.
    pub async fn uniprot_search(&self, query: &str, limit: usize) -> Result<Vec<UniProtRecord>> {
        self.uniprot.search(query, limit).await
    }
}

fn classify_identifier(identifier: &str) -> &'static str {
    if identifier.starts_with("10.") {
        "doi"
    } else if identifier.chars().all(|c| c.is_ascii_digit()) {
        "pmid"
    } else {
        "s2"
    }
}

fn normalize_s2_id(paper_id: &str) -> String {
    if paper_id.starts_with("10.") {
        format!("DOI:{paper_id}")
    } else {
        paper_id.to_string()
    }
}

/// Merge-on-dedup per spec.md §4.5: the record with the highest-valued
/// identifier wins, and missing fields are backfilled from duplicates.
fn deduplicate(papers: Vec<Paper>) -> Vec<Paper> {
    let mut order: Vec<String> = Vec::new();
    let mut by_key: HashMap<String, Paper> = HashMap::new();

    for paper in papers {
        let key = paper.identity_key();
        match by_key.get_mut(&key) {
            Some(existing) => existing.merge_missing_from(&paper),
            None => {
                order.push(key.clone());
                by_key.insert(key, paper);
            }
        }
    }

    order.into_iter().filter_map(|k| by_key.remove(&k)).collect()
}

/// Weighted relevance ranking per spec.md §4.5: title-term overlap (10/term)
/// + log10(1+citations)*5 + recency bonus. Stable sort, ties broken by
/// citation_count desc then year desc.
fn rank(mut papers: Vec<Paper>, query: &str) -> Vec<Paper> {
    use chrono::Datelike;
    let query_terms: std::collections::HashSet<String> =
        query.to_lowercase().split_whitespace().map(String::from).collect();
    let current_year = chrono::Utc::now().year();

    for paper in &mut papers {
        let title_terms: std::collections::HashSet<String> = paper
            .title
            .to_lowercase()
            .split_whitespace()
            .map(String::from)
            .collect();
        let overlap = query_terms.intersection(&title_terms).count();
        let mut score = overlap as f64 * 10.0;

        if let Some(citations) = paper.citation_count {
            score += ((citations as f64) + 1.0).log10() * 5.0;
        }
        if let Some(year) = paper.year {
            let age = current_year as i64 - year as i64;
            if (0..=5).contains(&age) {
                score += (5.0 - age as f64) * 2.0;
            }
        }
        paper.relevance_score = Some(score);
    }

    papers.sort_by(|a, b| {
        let score_a = a.relevance_score.unwrap_or(0.0);
        let score_b = b.relevance_score.unwrap_or(0.0);
        score_b
            .partial_cmp(&score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.citation_count.unwrap_or(0).cmp(&a.citation_count.unwrap_or(0)))
            .then_with(|| b.year.unwrap_or(0).cmp(&a.year.unwrap_or(0)))
    });
    papers
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn paper(title: &str, doi: &str, citations: Option<u32>, year: Option<u32>) -> Paper {
        let mut identifiers = BTreeMap::new();
        if !doi.is_empty() {
            identifiers.insert("doi".into(), doi.into());
        }
        Paper {
            title: title.into(),
            authors: vec![],
            year,
            venue: None,
            identifiers,
            abstract_text: None,
            citation_count: citations,
            reference_count: None,
            is_open_access: false,
            pdf_url: None,
            source_tag: "test".into(),
            relevance_score: None,
        }
    }

    #[test]
    fn deduplicate_merges_by_doi() {
        let a = paper("CRISPR gene editing", "10.1/x", Some(10), Some(2022));
        let mut b = paper("CRISPR gene editing", "10.1/x", None, None);
        b.pdf_url = Some("http://example.com/p.pdf".into());
        let result = deduplicate(vec![a, b]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].citation_count, Some(10));
        assert_eq!(result[0].pdf_url.as_deref(), Some("http://example.com/p.pdf"));
    }

    #[test]
    fn rank_prefers_title_overlap() {
        let a = paper("unrelated topic entirely", "10.1/a", None, None);
        let b = paper("CRISPR gene editing review", "10.1/b", None, None);
        let ranked = rank(vec![a, b], "crispr editing");
        assert_eq!(ranked[0].identifiers.get("doi").unwrap(), "10.1/b");
    }

    #[test]
    fn rank_breaks_ties_by_citation_count() {
        let a = paper("same title", "10.1/a", Some(5), None);
        let b = paper("same title", "10.1/b", Some(50), None);
        let ranked = rank(vec![a, b], "unrelated");
        assert_eq!(ranked[0].identifiers.get("doi").unwrap(), "10.1/b");
    }
}

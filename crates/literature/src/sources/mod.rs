pub mod crossref;
pub mod europepmc;
pub mod pubmed;
pub mod semantic_scholar;
pub mod uniprot;
pub mod unpaywall;

use async_trait::async_trait;
use ba_domain::bio::Paper;
use ba_domain::error::Result;

/// A single literature source, polymorphic over an optional capability
/// set (spec.md §4.5: search, get_by_id, citations, references,
/// recommendations, oa_lookup). Sources that don't support a capability
/// return `Ok(None)`/`Ok(vec![])` rather than an error — callers treat an
/// unsupported capability the same as "not found."
#[async_trait]
pub trait LiteratureSource: Send + Sync {
    /// Short tag used in `Paper::source_tag` and the orchestrator's
    /// `sources_searched` list.
    fn tag(&self) -> &'static str;

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        year_from: Option<u32>,
        year_to: Option<u32>,
    ) -> Result<Vec<Paper>>;

    async fn get_by_id(&self, _identifier: &str) -> Result<Option<Paper>> {
        Ok(None)
    }

    async fn citations(&self, _identifier: &str, _cap: usize) -> Result<Vec<Paper>> {
        Ok(Vec::new())
    }

    async fn references(&self, _identifier: &str, _cap: usize) -> Result<Vec<Paper>> {
        Ok(Vec::new())
    }

    async fn recommendations(&self, _identifier: &str, _cap: usize) -> Result<Vec<Paper>> {
        Ok(Vec::new())
    }

    async fn oa_lookup(&self, _doi: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

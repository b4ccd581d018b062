//! Multi-source literature search and citation network orchestration
//! (spec.md §4.5), grounded in `Research_Agent/literature/clients.py` and
//! `Research_Agent/literature/` (see DESIGN.md).

pub mod client;
pub mod orchestrator;
pub mod sources;

pub use orchestrator::{
    CitationDirection, LiteratureOrchestrator, OrchestratorConfig, SearchRequest, SearchResult,
    DEFAULT_SOURCES,
};
pub use sources::LiteratureSource;

//! `ba-memory` — the memory subsystem (spec.md §4.7): transcript summaries,
//! a content-addressable artifact store, a knowledge graph, and a retrieval
//! index, all in-process behind the [`MemoryProvider`] trait.
//!
//! [`LocalMemoryProvider`] is the sole implementation: everything lives under
//! `MemoryConfig.state_dir`/`artifacts_dir` as plain files, loaded
//! best-effort at startup and persisted atomically on every write.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use ba_domain::config::MemoryConfig;
//! use ba_memory::{create_provider, MemoryProvider, RagSearchRequest};
//!
//! # async fn example() -> ba_domain::error::Result<()> {
//! let cfg = MemoryConfig::default();
//! let provider = create_provider(&cfg)?;
//!
//! let results = provider
//!     .search(RagSearchRequest { query: "user's favourite language".into(), limit: Some(5), threshold: 0.3 })
//!     .await?;
//!
//! println!("found {} memories", results.count);
//! # Ok(())
//! # }
//! ```

pub mod local;
pub mod provider;
pub mod types;
pub mod user_facts;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use local::LocalMemoryProvider;
pub use provider::MemoryProvider;
pub use types::{
    IngestResponse, MemoryIngestRequest, RagAnswerRequest, RagAnswerResponse, RagSearchRequest,
    RagSearchResponse, RetrievedMemoryDto, SessionRequest, UserPersonaRequest,
};
pub use user_facts::UserFactsBuilder;

use std::sync::Arc;

use ba_domain::config::MemoryConfig;
use ba_domain::error::Result;

/// Build the in-process [`LocalMemoryProvider`], rooted at `cfg.state_dir`.
pub fn create_provider(cfg: &MemoryConfig) -> Result<Arc<dyn MemoryProvider>> {
    let provider = LocalMemoryProvider::new(cfg)?;
    tracing::info!(
        state_dir = %cfg.state_dir.display(),
        artifacts_dir = %cfg.artifacts_dir.display(),
        embedding_model = %cfg.embedding_model,
        "local memory store ready"
    );
    Ok(Arc::new(provider))
}

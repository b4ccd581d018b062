use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Memory subsystem configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// The memory subsystem is in-process (spec §4.7): transcript, rolling
// summaries, artifact store, knowledge graph, and retrieval index all live
// under `state_dir`, persisted as the plain files the workspace layout
// names (`memory/summaries.json`, `memory/kg.json`, `memory/index/`).

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Root directory for memory state (summaries, knowledge graph, index).
    #[serde(default = "d_state_dir")]
    pub state_dir: PathBuf,
    /// Root directory for the content-addressable artifact store.
    #[serde(default = "d_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    /// Character budget for the rolling/additive transcript summary.
    #[serde(default = "d_summary_chars")]
    pub summary_char_budget: usize,
    /// Token budget for context assembled from memory at turn time.
    #[serde(default = "d_context_tokens")]
    pub context_token_budget: usize,
    /// Name of the embedding model backing the retrieval index.
    ///
    /// Pluggable by design (open question in the source spec): any model
    /// producing fixed-width dense vectors can be swapped in here without
    /// touching the retrieval index's ANN logic.
    #[serde(default = "d_embedding_model")]
    pub embedding_model: String,
    /// Number of nearest neighbors returned by a retrieval query.
    #[serde(default = "d_top_k")]
    pub retrieval_top_k: usize,
    #[serde(default = "d_user")]
    pub default_user_id: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            state_dir: d_state_dir(),
            artifacts_dir: d_artifacts_dir(),
            summary_char_budget: d_summary_chars(),
            context_token_budget: d_context_tokens(),
            embedding_model: d_embedding_model(),
            retrieval_top_k: d_top_k(),
            default_user_id: d_user(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_state_dir() -> PathBuf {
    PathBuf::from("./data/memory")
}
fn d_artifacts_dir() -> PathBuf {
    PathBuf::from("./data/artifacts")
}
fn d_summary_chars() -> usize {
    8_000
}
fn d_context_tokens() -> usize {
    4_000
}
fn d_embedding_model() -> String {
    "local-lexical-v1".into()
}
fn d_top_k() -> usize {
    8
}
fn d_user() -> String {
    "default_user".into()
}

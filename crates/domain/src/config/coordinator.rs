use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Coordinator / specialist / QC orchestration (spec §4.3)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Controls the coordinator's intent routing, specialist fan-out, and
/// QC review pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Enable multi-specialist orchestration. When `false`, every turn
    /// runs as a single agent loop scoped to `general_specialist`.
    #[serde(default)]
    pub enabled: bool,
    /// Maximum number of specialists (primary + secondaries) dispatched
    /// for a single query.
    #[serde(default = "d_max_specialists")]
    pub max_specialists: usize,
    /// Run selected specialists concurrently rather than sequentially.
    #[serde(default = "d_true")]
    pub parallel_specialists: bool,
    /// Agent ID used when no keyword match is confident, or as the
    /// fallback target if orchestration fails.
    #[serde(default = "d_general_specialist")]
    pub general_specialist: String,
    /// Per-specialist wall-clock timeout (milliseconds).
    #[serde(default = "d_specialist_timeout_ms")]
    pub specialist_timeout_ms: u64,
    /// Hard outer cap for the whole coordinated turn (milliseconds),
    /// independent of how many specialists ran.
    #[serde(default = "d_outer_timeout_ms")]
    pub outer_timeout_ms: u64,
    /// Whether a QC reviewer pass annotates the synthesized answer.
    #[serde(default)]
    pub qc_enabled: bool,
    /// Role name (looked up via `[llm.roles]`) used for the QC pass.
    /// Intentionally smaller/cheaper than the executor role.
    #[serde(default = "d_qc_role")]
    pub qc_role: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_specialists: d_max_specialists(),
            parallel_specialists: true,
            general_specialist: d_general_specialist(),
            specialist_timeout_ms: d_specialist_timeout_ms(),
            outer_timeout_ms: d_outer_timeout_ms(),
            qc_enabled: false,
            qc_role: d_qc_role(),
        }
    }
}

fn d_max_specialists() -> usize {
    3
}
fn d_true() -> bool {
    true
}
fn d_general_specialist() -> String {
    "general".into()
}
fn d_specialist_timeout_ms() -> u64 {
    60_000
}
fn d_outer_timeout_ms() -> u64 {
    180_000
}
fn d_qc_role() -> String {
    "summarizer".into()
}

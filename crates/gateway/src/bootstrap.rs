//! AppState construction and background-task spawning extracted from `main.rs`.
//!
//! This module exposes two public functions that CLI commands (`serve`, `run`,
//! `chat`) share so they can boot the full runtime without an HTTP listener.

use std::sync::Arc;

use anyhow::Context;
use sha2::{Digest, Sha256};

use ba_domain::config::{Config, ConfigSeverity};
use ba_memory::create_provider as create_memory_provider;
use ba_providers::registry::ProviderRegistry;
use ba_sessions::{IdentityResolver, LifecycleManager, SessionStore, TranscriptWriter};
use ba_specialists::registry::SkillsRegistry;
use ba_tools::ProcessManager;

use crate::state::AppState;
use crate::workspace::bootstrap::BootstrapTracker;
use crate::workspace::files::WorkspaceReader;

/// Validate config, initialize every subsystem and return a fully-wired
/// [`AppState`].  This is the shared "boot" path used by `serve`, `run` and
/// `chat`.
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Workspace reader ─────────────────────────────────────────────
    let workspace = Arc::new(WorkspaceReader::new(config.workspace.path.clone()));
    tracing::info!(path = %config.workspace.path.display(), "workspace reader ready");

    // ── Bootstrap tracker ────────────────────────────────────────────
    let bootstrap = Arc::new(
        BootstrapTracker::new(config.workspace.state_path.clone())
            .context("initializing bootstrap tracker")?,
    );

    // ── Skills ───────────────────────────────────────────────────────
    let skills = Arc::new(SkillsRegistry::load(&config.skills.path).context("loading skills")?);
    tracing::info!(skills_count = skills.list().len(), "skills loaded");

    // ── Memory subsystem (spec.md §4.7) ───────────────────────────────
    let memory: Arc<dyn ba_memory::MemoryProvider> =
        create_memory_provider(&config.memory_backend).context("creating memory provider")?;

    // ── Literature orchestrator (spec.md §4.5) ────────────────────────
    let literature = Arc::new(ba_literature::LiteratureOrchestrator::new(
        ba_literature::OrchestratorConfig {
            ncbi_api_key: std::env::var("NCBI_API_KEY").ok(),
            ncbi_email: std::env::var("NCBI_EMAIL").ok(),
            s2_api_key: std::env::var("S2_API_KEY").ok(),
        },
    ));
    tracing::info!("literature orchestrator ready");

    // ── Ingestion registry (spec.md §4.6) ─────────────────────────────
    let ingest_dir = config.workspace.state_path.join("ingest");
    let ingest = Arc::new(ba_ingest::IngestRegistry::new(ingest_dir.clone()).await);
    tracing::info!(path = %ingest_dir.display(), "ingestion registry ready");

    // ── LLM providers ────────────────────────────────────────────────
    let llm = Arc::new(
        ProviderRegistry::from_config(&config.llm).context("initializing LLM providers")?,
    );
    if llm.is_empty() {
        tracing::info!(
            "no LLM providers initialized — configure API keys to enable LLM endpoints"
        );
    } else {
        tracing::info!(providers = llm.len(), "LLM provider registry ready");
    }

    // ── Session management ───────────────────────────────────────────
    let sessions = Arc::new(
        SessionStore::new(&config.workspace.state_path)
            .context("initializing session store")?,
    );
    let identity = Arc::new(IdentityResolver::from_config(
        &config.sessions.identity_links,
    ));
    let lifecycle = Arc::new(LifecycleManager::new(config.sessions.lifecycle.clone()));
    let transcript_dir = sessions.transcript_dir();
    let transcripts = Arc::new(TranscriptWriter::new(&transcript_dir));
    tracing::info!(
        agent_id = %config.sessions.agent_id,
        dm_scope = ?config.sessions.dm_scope,
        identity_links = identity.len(),
        "session management ready"
    );

    // ── Process manager (exec/process tools) ───────────────────────
    let processes = Arc::new(ProcessManager::new(config.tools.exec.clone()));
    tracing::info!("process manager ready");

    // ── Session locks (per-session concurrency) ──────────────────────
    let session_locks = Arc::new(crate::runtime::session_lock::SessionLockMap::new());
    tracing::info!("session lock map ready");

    // ── Cancel map (per-session cancellation) ─────────────────────────
    let cancel_map = Arc::new(crate::runtime::cancel::CancelMap::new());
    tracing::info!("cancel map ready");

    // ── Run store ────────────────────────────────────────────────────
    let run_store = Arc::new(crate::runtime::runs::RunStore::new(
        &config.workspace.state_path,
    ));
    tracing::info!("run store ready");

    // ── Skill engine (callable skills: web.fetch, etc.) ─────────────
    let skill_engine = Arc::new(
        crate::skills::build_default_engine().context("initializing skill engine")?,
    );
    tracing::info!(skills = skill_engine.len(), "skill engine ready");

    // ── API token (read once, hash for constant-time comparison) ────
    // Priority: config.server.api_token > env var (config.server.api_token_env)
    let api_token_hash = {
        let env_var = &config.server.api_token_env;
        let token = config
            .server
            .api_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(|t| ("config".to_string(), t.to_string()))
            .or_else(|| {
                std::env::var(env_var)
                    .ok()
                    .filter(|t| !t.is_empty())
                    .map(|t| (format!("env:{env_var}"), t))
            });
        match token {
            Some((source, t)) => {
                tracing::info!(source = %source, "API bearer-token auth enabled");
                Some(Sha256::digest(t.as_bytes()).to_vec())
            }
            None => {
                tracing::warn!(
                    "API bearer-token auth DISABLED — set server.api_token in config.toml or {env_var} env var"
                );
                None
            }
        }
    };

    // ── Admin token (read once, hash for constant-time comparison) ──
    // Priority: config.admin.token > env var (config.admin.token_env)
    let admin_token_hash = {
        let env_var = &config.admin.token_env;
        let token = config
            .admin
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(|t| ("config".to_string(), t.to_string()))
            .or_else(|| {
                std::env::var(env_var)
                    .ok()
                    .filter(|t| !t.is_empty())
                    .map(|t| (format!("env:{env_var}"), t))
            });
        match token {
            Some((source, t)) => {
                tracing::info!(source = %source, "admin bearer-token auth enabled");
                Some(Sha256::digest(t.as_bytes()).to_vec())
            }
            None => {
                tracing::warn!(
                    "admin bearer-token auth DISABLED — set admin.token in config.toml or {env_var} env var"
                );
                None
            }
        }
    };

    // ── Compile exec denied-patterns at startup ──────────────────────
    let denied_command_set = Arc::new(
        regex::RegexSet::new(&config.tools.exec_security.denied_patterns)
            .context("invalid regex in tools.exec_security.denied_patterns")?,
    );
    tracing::info!(
        patterns = config.tools.exec_security.denied_patterns.len(),
        "exec denied-patterns compiled"
    );

    // ── Compile exec approval-patterns at startup ────────────────────
    let approval_command_set = Arc::new(
        regex::RegexSet::new(&config.tools.exec_security.approval_patterns)
            .context("invalid regex in tools.exec_security.approval_patterns")?,
    );
    tracing::info!(
        patterns = config.tools.exec_security.approval_patterns.len(),
        "exec approval-patterns compiled"
    );
    let approval_store = Arc::new(crate::runtime::approval::ApprovalStore::new(
        std::time::Duration::from_secs(config.tools.exec_security.approval_timeout_sec),
    ));

    // ── App state (without agents — needed for AgentManager init) ───
    let mut state = AppState {
        config: config.clone(),
        memory,
        literature,
        ingest,
        skills,
        workspace,
        bootstrap,
        llm,
        sessions,
        identity,
        lifecycle,
        transcripts,
        processes,
        session_locks,
        cancel_map,
        agents: None,
        run_store,
        skill_engine,
        user_facts_cache: Arc::new(parking_lot::RwLock::new(std::collections::HashMap::new())),
        tool_defs_cache: Arc::new(parking_lot::RwLock::new(std::collections::HashMap::new())),
        api_token_hash,
        admin_token_hash,
        denied_command_set,
        approval_command_set,
        approval_store,
    };

    // ── Agent manager (sub-agents) ──────────────────────────────────
    if !config.agents.is_empty() {
        let agent_mgr = crate::runtime::agent::AgentManager::from_config(&state);
        tracing::info!(agent_count = agent_mgr.len(), "agent manager ready");
        state.agents = Some(Arc::new(agent_mgr));
    }

    Ok(state)
}

/// Spawn the long-running background tokio tasks (session flush, process
/// cleanup, session-lock pruning).
///
/// Call this **after** [`build_app_state`] when running the HTTP server.
/// CLI one-shot commands (`run`) typically skip this.
pub fn spawn_background_tasks(state: &AppState) {
    // ── Periodic session flush ───────────────────────────────────────
    {
        let sessions = state.sessions.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
            loop {
                interval.tick().await;
                if let Err(e) = sessions.flush().await {
                    tracing::warn!(error = %e, "session store flush failed");
                }
            }
        });
    }

    // ── Periodic process cleanup + session lock pruning ──────────────
    {
        let processes = state.processes.clone();
        let session_locks = state.session_locks.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                processes.cleanup_stale();
                session_locks.prune_idle();
            }
        });
    }

    tracing::info!("background tasks spawned");
}

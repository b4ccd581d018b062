pub mod admin;
pub mod agents;
pub mod auth;
pub mod chat;
pub mod context;
pub mod memory;
pub mod providers;
pub mod runs;
pub mod sessions;
pub mod skills;
pub mod tools;

use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Routes are split into **public** (no auth required) and **protected**
/// (gated behind the `BIOAGENT_API_TOKEN` bearer-token middleware).
///
/// `state` is needed to wire up the auth middleware at build time.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        // Health probe (public, no auth)
        .route("/v1/health", get(admin::health))
        // OpenAPI spec (public, no auth)
        .route("/v1/openapi.json", get(admin::openapi_spec));

    let protected = Router::new()
        // Context introspection
        .route("/v1/context", get(context::get_context))
        .route("/v1/context/assembled", get(context::get_assembled))
        // Skills
        .route("/v1/skills", get(skills::list_skills))
        .route("/v1/skills/:name/doc", get(skills::read_skill_doc))
        .route("/v1/skills/:name/resource", get(skills::read_skill_resource))
        .route("/v1/skills/reload", post(skills::reload_skills))
        // Memory (search, ingest, per-user profile)
        .route("/v1/memory/search", post(memory::search))
        .route("/v1/memory/ingest", post(memory::ingest))
        .route("/v1/memory/about", get(memory::about_user))
        .route("/v1/memory/health", get(memory::health))
        .route("/v1/memory/:id", put(memory::update_entry))
        .route("/v1/memory/:id", delete(memory::delete_entry))
        .route("/v1/session/init", post(memory::init_session))
        .route("/v1/session/end", post(memory::end_session))
        // Session management (gateway-owned)
        .route("/v1/sessions", get(sessions::list_sessions))
        .route("/v1/sessions/resolve", post(sessions::resolve_session))
        .route("/v1/sessions/reset", post(sessions::reset_session))
        // Chat (core runtime)
        .route("/v1/chat", post(chat::chat))
        .route("/v1/chat/stream", post(chat::chat_stream))
        // Tools (exec / process / invoke / approval)
        .route("/v1/tools/exec", post(tools::exec_tool))
        .route("/v1/tools/process", post(tools::process_tool))
        .route("/v1/tools/invoke", post(tools::invoke_tool))
        .route("/v1/tools/exec/pending", get(tools::list_pending_approvals))
        .route("/v1/tools/exec/approve/:id", post(tools::approve_exec))
        .route("/v1/tools/exec/deny/:id", post(tools::deny_exec))
        // Runs (execution tracking)
        .route("/v1/runs", get(runs::list_runs))
        .route("/v1/runs/:id", get(runs::get_run))
        .route("/v1/runs/:id/nodes", get(runs::get_run_nodes))
        .route("/v1/runs/:id/events", get(runs::run_events_sse))
        // Agents (audit / introspection)
        .route("/v1/agents", get(agents::list_agents))
        // Providers / Models
        .route("/v1/models", get(providers::list_providers))
        .route("/v1/models/roles", get(providers::list_roles))
        // Metrics
        .route("/v1/metrics", get(admin::metrics))
        // Admin
        .route("/v1/admin/info", get(admin::system_info))
        .route("/v1/admin/workspace/files", get(admin::list_workspace_files))
        .route("/v1/admin/skills", get(admin::list_skills_detailed))
        // Apply API auth middleware to all protected routes.
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_api_token,
        ));

    public
        .merge(protected)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

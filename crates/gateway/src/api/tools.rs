//! Tools API endpoints (exec / process / invoke / approval).
//!
//! - `POST /v1/tools/exec`    — spawn a command (foreground or background)
//! - `POST /v1/tools/process` — manage background process sessions
//! - `POST /v1/tools/invoke`  — generic tool dispatch
//! - `GET  /v1/tools/exec/pending` — list exec commands awaiting approval
//! - `POST /v1/tools/exec/approve/:id` / `deny/:id` — resolve a pending approval

use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use uuid::Uuid;

use ba_tools::exec::{self, ExecRequest};
use ba_tools::process::{self, ProcessRequest};

use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/tools/exec
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn exec_tool(
    State(state): State<AppState>,
    Json(req): Json<ExecRequest>,
) -> impl IntoResponse {
    // Enforce denied-patterns denylist (precompiled RegexSet) before executing.
    if state.denied_command_set.is_match(&req.command) {
        tracing::warn!(command = %req.command, "exec blocked by denied_patterns");
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({
                "error": "command blocked by security policy",
            })),
        )
            .into_response();
    }

    let resp = exec::exec(&state.processes, req).await;
    Json(serde_json::to_value(resp).unwrap_or_default()).into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/tools/process
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn process_tool(
    State(state): State<AppState>,
    Json(req): Json<ProcessRequest>,
) -> impl IntoResponse {
    let resp = process::handle_process(&state.processes, req).await;
    Json(serde_json::to_value(resp).unwrap_or_default())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/tools/invoke
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Request body for generic tool invocation.
#[derive(Debug, Deserialize)]
pub struct ToolInvokeRequest {
    /// Tool name (e.g. `"literature.search"`, `"exec"`).
    pub tool: String,
    /// Tool arguments.
    #[serde(default)]
    pub args: serde_json::Value,
    /// Optional session key for provenance / cancellation.
    #[serde(default)]
    pub session_key: Option<String>,
    /// Optional timeout in milliseconds (default 30_000, max 120_000).
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Generic tool dispatch endpoint, used for ops introspection and testing.
///
/// Always returns 200 with `ok: true/false` in the body (tool errors are
/// not HTTP errors); returns 504 only if the per-call timeout is exceeded.
pub async fn invoke_tool(
    State(state): State<AppState>,
    Json(req): Json<ToolInvokeRequest>,
) -> impl IntoResponse {
    let start = std::time::Instant::now();
    let request_id = Uuid::new_v4().to_string();

    let timeout = Duration::from_millis(req.timeout_ms.unwrap_or(30_000).min(120_000));

    let dispatch = crate::runtime::tools::dispatch_tool(
        &state,
        &req.tool,
        &req.args,
        req.session_key.as_deref(),
    );

    let (content, is_error) = match tokio::time::timeout(timeout, dispatch).await {
        Ok(result) => result,
        Err(_) => (
            format!("tool invoke timed out after {}ms", timeout.as_millis()),
            true,
        ),
    };

    let duration_ms = start.elapsed().as_millis() as u64;

    if is_error {
        Json(serde_json::json!({
            "request_id": request_id,
            "ok": false,
            "error": {
                "kind": "failed",
                "message": content,
            },
            "duration_ms": duration_ms,
        }))
        .into_response()
    } else {
        let result: serde_json::Value =
            serde_json::from_str(&content).unwrap_or(serde_json::Value::String(content));

        Json(serde_json::json!({
            "request_id": request_id,
            "ok": true,
            "result": result,
            "duration_ms": duration_ms,
        }))
        .into_response()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Exec approval workflow
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_pending_approvals(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "pending": state.approval_store.list_pending() }))
}

pub async fn approve_exec(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    if state.approval_store.approve(&id) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct DenyBody {
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn deny_exec(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<DenyBody>>,
) -> impl IntoResponse {
    let reason = body.map(|Json(b)| b.reason).unwrap_or(None);
    if state.approval_store.deny(&id, reason) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

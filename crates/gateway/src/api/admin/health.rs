//! Health, metrics, and system info endpoints.

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

use super::guard::AdminGuard;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/health — lightweight health probe (public, no auth)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/openapi.json — OpenAPI 3.0 spec (public, no auth)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn openapi_spec() -> impl IntoResponse {
    use axum::http::header;

    let spec = serde_json::json!({
        "openapi": "3.0.3",
        "info": {
            "title": "BioAgent Gateway API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "BioAgent gateway — multi-agent bioinformatics research assistant with literature search, file ingestion, long-term memory, and tool dispatch."
        },
        "servers": [{ "url": "/", "description": "Current host" }],
        "security": [{ "BearerAuth": [] }],
        "components": {
            "securitySchemes": {
                "BearerAuth": {
                    "type": "http",
                    "scheme": "bearer",
                    "description": "BIOAGENT_API_TOKEN bearer token"
                }
            },
            "schemas": {
                "Error": {
                    "type": "object",
                    "properties": {
                        "error": { "type": "string" }
                    }
                }
            }
        },
        "paths": {
            "/v1/health": {
                "get": {
                    "summary": "Health probe",
                    "tags": ["Admin"],
                    "security": [],
                    "responses": { "200": { "description": "Server is healthy" } }
                }
            },
            "/v1/chat": {
                "post": {
                    "summary": "Send a chat message (non-streaming)",
                    "tags": ["Chat"],
                    "requestBody": { "required": true, "content": { "application/json": { "schema": { "type": "object", "required": ["message"], "properties": { "message": { "type": "string" }, "session_key": { "type": "string" }, "model": { "type": "string" } } } } } },
                    "responses": { "200": { "description": "Chat response" } }
                }
            },
            "/v1/chat/stream": {
                "post": {
                    "summary": "Send a chat message (SSE streaming)",
                    "tags": ["Chat"],
                    "requestBody": { "required": true, "content": { "application/json": { "schema": { "type": "object", "required": ["message"], "properties": { "message": { "type": "string" }, "session_key": { "type": "string" }, "model": { "type": "string" } } } } } },
                    "responses": { "200": { "description": "SSE event stream" } }
                }
            },
            "/v1/sessions": {
                "get": {
                    "summary": "List all sessions",
                    "tags": ["Sessions"],
                    "responses": { "200": { "description": "Array of sessions" } }
                }
            },
            "/v1/runs": {
                "get": {
                    "summary": "List runs with optional filters",
                    "tags": ["Runs"],
                    "parameters": [
                        { "name": "status", "in": "query", "schema": { "type": "string" } },
                        { "name": "limit", "in": "query", "schema": { "type": "integer", "default": 50 } },
                        { "name": "offset", "in": "query", "schema": { "type": "integer", "default": 0 } }
                    ],
                    "responses": { "200": { "description": "Paginated run list" } }
                }
            },
            "/v1/runs/{id}": {
                "get": {
                    "summary": "Get run by ID",
                    "tags": ["Runs"],
                    "parameters": [{ "name": "id", "in": "path", "required": true, "schema": { "type": "string", "format": "uuid" } }],
                    "responses": { "200": { "description": "Run object" }, "404": { "description": "Not found" } }
                }
            },
            "/v1/memory/search": {
                "post": {
                    "summary": "Search long-term memory",
                    "tags": ["Memory"],
                    "requestBody": { "required": true, "content": { "application/json": { "schema": { "type": "object", "required": ["query"], "properties": { "query": { "type": "string" }, "limit": { "type": "integer" } } } } } },
                    "responses": { "200": { "description": "Search results" } }
                }
            },
            "/v1/memory/ingest": {
                "post": {
                    "summary": "Ingest content into memory",
                    "tags": ["Memory"],
                    "requestBody": { "required": true, "content": { "application/json": { "schema": { "type": "object", "required": ["content"], "properties": { "content": { "type": "string" }, "source": { "type": "string" }, "metadata": { "type": "object" } } } } } },
                    "responses": { "200": { "description": "Ingested" } }
                }
            },
            "/v1/skills": {
                "get": {
                    "summary": "List available skills",
                    "tags": ["Skills"],
                    "responses": { "200": { "description": "Array of skill descriptors" } }
                }
            },
            "/v1/models": {
                "get": {
                    "summary": "List configured LLM providers",
                    "tags": ["Providers"],
                    "responses": { "200": { "description": "Provider list" } }
                }
            },
            "/v1/models/readiness": {
                "get": {
                    "summary": "Provider readiness check",
                    "tags": ["Providers"],
                    "security": [],
                    "responses": { "200": { "description": "Readiness status" } }
                }
            },
            "/v1/tools/exec": {
                "post": {
                    "summary": "Execute a tool directly",
                    "tags": ["Tools"],
                    "responses": { "200": { "description": "Tool execution result" } }
                }
            },
            "/v1/metrics": {
                "get": {
                    "summary": "Runtime metrics",
                    "tags": ["Admin"],
                    "responses": { "200": { "description": "Metrics object" } }
                }
            },
            "/v1/admin/info": {
                "get": {
                    "summary": "System info (admin-only)",
                    "tags": ["Admin"],
                    "responses": { "200": { "description": "System info" }, "401": { "description": "Unauthorized" } }
                }
            },
            "/v1/context": {
                "get": {
                    "summary": "Get current context pack",
                    "tags": ["Context"],
                    "responses": { "200": { "description": "Context data" } }
                }
            }
        },
        "tags": [
            { "name": "Chat", "description": "Core chat/turn execution" },
            { "name": "Sessions", "description": "Session lifecycle management" },
            { "name": "Runs", "description": "Run execution tracking" },
            { "name": "Memory", "description": "Long-term memory" },
            { "name": "Skills", "description": "Skill registry and engine" },
            { "name": "Providers", "description": "LLM provider management" },
            { "name": "Tools", "description": "Direct tool execution" },
            { "name": "Context", "description": "Context pack introspection" },
            { "name": "Admin", "description": "Administrative and system endpoints" }
        ]
    });

    ([(header::CONTENT_TYPE, "application/json")], Json(spec))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/metrics — runtime metrics (protected, no admin token check)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let (_, run_total) = state.run_store.list(None, None, None, 0, 0);
    let sessions = state.sessions.list();

    Json(serde_json::json!({
        "runs": {
            "total": run_total,
        },
        "sessions": {
            "total": sessions.len(),
        },
        "providers": state.llm.len(),
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/admin/info — system info (admin auth required)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn system_info(
    _guard: AdminGuard,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let admin_token_set = state.admin_token_hash.is_some();

    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "server": {
            "host": state.config.server.host,
            "port": state.config.server.port,
        },
        "admin_token_set": admin_token_set,
        "workspace_path": state.config.workspace.path.display().to_string(),
        "skills_path": state.config.skills.path.display().to_string(),
        "memory_state_dir": state.config.memory_backend.state_dir.display().to_string(),
        "provider_count": state.llm.len(),
        "session_count": state.sessions.list().len(),
    }))
}

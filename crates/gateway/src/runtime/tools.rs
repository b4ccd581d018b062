//! Tool registry for the runtime — builds tool definitions for the LLM and
//! dispatches tool calls to local handlers or specialist sub-agents.

use serde_json::Value;

use ba_domain::config::ToolPolicy;
use ba_domain::tool::ToolDefinition;
use ba_tools::exec::{self, ExecRequest};
use ba_tools::process::{self, ProcessRequest};

use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool definitions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build the set of tool definitions exposed to the LLM.
///
/// When `tool_policy` is `Some`, definitions are filtered through it so that
/// sub-agents only see tools their config permits.
pub fn build_tool_definitions(
    state: &AppState,
    tool_policy: Option<&ToolPolicy>,
) -> Vec<ToolDefinition> {
    let mut defs = Vec::new();

    // ── Built-in local tools ──────────────────────────────────────
    defs.push(ToolDefinition {
        name: "exec".into(),
        description: "Run a shell command. Returns output or a background session ID.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "Shell command to execute" },
                "background": { "type": "boolean", "description": "Run in background" },
                "workdir": { "type": "string", "description": "Working directory" },
                "timeout_sec": { "type": "integer", "description": "Hard timeout in seconds" }
            },
            "required": ["command"]
        }),
    });

    defs.push(ToolDefinition {
        name: "process".into(),
        description: "Manage background processes: list, poll, log, write, kill, remove.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["list", "poll", "log", "write", "kill", "clear", "remove"],
                    "description": "Action to perform"
                },
                "session_id": { "type": "string", "description": "Process session ID" },
                "data": { "type": "string", "description": "Data to write to stdin" }
            },
            "required": ["action"]
        }),
    });

    // ── Skill tools ───────────────────────────────────────────────
    defs.push(ToolDefinition {
        name: "skill.read_doc".into(),
        description: "Read the full documentation (SKILL.md) for a specialist skill.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Specialist name (e.g. 'literature')" }
            },
            "required": ["name"]
        }),
    });

    defs.push(ToolDefinition {
        name: "skill.read_resource".into(),
        description: "Read a bundled resource from a specialist (references/, scripts/, assets/).".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Specialist name" },
                "path": { "type": "string", "description": "Resource path (e.g. 'references/api.md')" }
            },
            "required": ["name", "path"]
        }),
    });

    // ── Memory tools ────────────────────────────────────────
    defs.push(ToolDefinition {
        name: "memory.search".into(),
        description: "Search long-term memory for relevant facts, notes, and session history.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
                "limit": { "type": "integer", "description": "Max results (default 10)" }
            },
            "required": ["query"]
        }),
    });

    defs.push(ToolDefinition {
        name: "memory.ingest".into(),
        description: "Store a fact or note in long-term memory.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "content": { "type": "string", "description": "Content to store" },
                "source": { "type": "string", "description": "Source label (e.g. 'user', 'agent')" }
            },
            "required": ["content"]
        }),
    });

    // ── Literature tools ────────────────────────────────────────────
    defs.push(ToolDefinition {
        name: "literature.search".into(),
        description: "Search PubMed, Semantic Scholar, Europe PMC, CrossRef, bioRxiv and Unpaywall for papers matching a query, deduplicated and ranked by relevance.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
                "sources": { "type": "array", "items": { "type": "string" }, "description": "Subset of sources to query (default: all)" },
                "max_per_source": { "type": "integer", "description": "Max results to fetch per source (default 20)" },
                "year_from": { "type": "integer" },
                "year_to": { "type": "integer" }
            },
            "required": ["query"]
        }),
    });

    defs.push(ToolDefinition {
        name: "literature.get_paper".into(),
        description: "Fetch full metadata for a single paper by DOI, PMID, or Semantic Scholar ID.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "identifier": { "type": "string", "description": "DOI, PMID, or S2 paper id" },
                "id_type": { "type": "string", "enum": ["auto", "doi", "pmid", "s2"], "description": "Identifier type (default 'auto')" }
            },
            "required": ["identifier"]
        }),
    });

    defs.push(ToolDefinition {
        name: "uniprot.lookup".into(),
        description: "Fetch a protein record from UniProtKB by accession (e.g. 'P15056').".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "accession": { "type": "string", "description": "UniProt accession" }
            },
            "required": ["accession"]
        }),
    });

    defs.push(ToolDefinition {
        name: "uniprot.search".into(),
        description: "Free-text search over UniProtKB, returning matching protein records.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query (e.g. gene or protein name)" },
                "limit": { "type": "integer", "description": "Max records to return (default 10, max 25)" }
            },
            "required": ["query"]
        }),
    });

    defs.push(ToolDefinition {
        name: "citation.format".into(),
        description: "Format a list of papers into a numbered reference list in a given citation style.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "papers": { "type": "array", "items": { "type": "object" }, "description": "Papers to cite (as returned by literature.search)" },
                "style": { "type": "string", "enum": ["apa", "vancouver"], "description": "Citation style (default 'vancouver')" }
            },
            "required": ["papers"]
        }),
    });

    // ── Ingestion tools ──────────────────────────────────────────────
    defs.push(ToolDefinition {
        name: "ingest.fetch".into(),
        description: "Fetch a file (local path or URL) into the workspace, detect its format, profile its contents, and register it in the dataset registry.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "source": { "type": "string", "description": "Local path or URL to ingest" }
            },
            "required": ["source"]
        }),
    });

    defs.push(ToolDefinition {
        name: "ingest.profile".into(),
        description: "Return the stored profile and quality flags for a previously-ingested dataset.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "dataset_id": { "type": "string", "description": "Dataset id returned by ingest.fetch" }
            },
            "required": ["dataset_id"]
        }),
    });

    // ── Stub tools (common aliases that aren't wired yet) ─────────
    defs.push(ToolDefinition {
        name: "web.search".into(),
        description: "Search the web (SERP). Currently unavailable — returns an error with alternatives.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" }
            },
            "required": ["query"]
        }),
    });

    defs.push(ToolDefinition {
        name: "http.request".into(),
        description: "Make an HTTP request. Currently unavailable — returns an error with alternatives.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "URL to fetch" },
                "method": { "type": "string", "description": "HTTP method (GET, POST, etc.)" }
            },
            "required": ["url"]
        }),
    });

    // ── Agent delegation tools ──────────────────────────────────────
    // Only expose these if agents are configured.
    if let Some(ref agents) = state.agents {
        if !agents.is_empty() {
            defs.push(ToolDefinition {
                name: "agent.run".into(),
                description: "Delegate a task to a specialist sub-agent. The sub-agent runs in its own session with scoped tools and skills. Returns the agent's final answer.".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "agent_id": { "type": "string", "description": "ID of the agent to run (from agent.list)" },
                        "task": { "type": "string", "description": "The task or question to give the agent" },
                        "model": { "type": "string", "description": "Optional model override (e.g. 'openai/gpt-4o')" }
                    },
                    "required": ["agent_id", "task"]
                }),
            });

            defs.push(ToolDefinition {
                name: "agent.list".into(),
                description: "List all available sub-agents and their capabilities.".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {}
                }),
            });
        }
    }

    // ── Apply tool policy filter ─────────────────────────────────
    if let Some(policy) = tool_policy {
        defs.retain(|d| policy.allows(&d.name));
    }

    defs
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool dispatch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Dispatch a single tool call. Returns (result_content, is_error).
pub async fn dispatch_tool(
    state: &AppState,
    tool_name: &str,
    arguments: &Value,
    session_key: Option<&str>,
) -> (String, bool) {
    match tool_name {
        "exec" => dispatch_exec(state, arguments).await,
        "process" => dispatch_process(state, arguments).await,
        "skill.read_doc" => dispatch_skill_read_doc(state, arguments),
        "skill.read_resource" => dispatch_skill_read_resource(state, arguments),
        "memory.search" => dispatch_memory_search(state, arguments).await,
        "memory.ingest" => dispatch_memory_ingest(state, arguments).await,
        "literature.search" => dispatch_literature_search(state, arguments).await,
        "literature.get_paper" => dispatch_literature_get_paper(state, arguments).await,
        "uniprot.lookup" => dispatch_uniprot_lookup(state, arguments).await,
        "uniprot.search" => dispatch_uniprot_search(state, arguments).await,
        "citation.format" => dispatch_citation_format(arguments),
        "ingest.fetch" => dispatch_ingest_fetch(state, arguments).await,
        "ingest.profile" => dispatch_ingest_profile(state, arguments).await,
        "agent.run" => dispatch_agent_run(state, arguments, session_key).await,
        "agent.list" => dispatch_agent_list(state),
        "web.search" => stub_tool("web.search", "Web search is not yet configured. Use exec with curl or a search CLI tool as an alternative."),
        "http.request" => stub_tool("http.request", "HTTP requests are not yet configured. Use exec with curl as an alternative."),
        _ => (
            serde_json::json!({
                "error": format!("Unknown tool: '{tool_name}'"),
                "message": "This tool is not registered. Check available tools.",
            })
            .to_string(),
            true,
        ),
    }
}

async fn dispatch_exec(state: &AppState, arguments: &Value) -> (String, bool) {
    let req: ExecRequest = match serde_json::from_value(arguments.clone()) {
        Ok(r) => r,
        Err(e) => return (format!("invalid exec arguments: {e}"), true),
    };
    let resp = exec::exec(&state.processes, req).await;
    let json = serde_json::to_string_pretty(&resp).unwrap_or_default();
    (json, false)
}

async fn dispatch_process(state: &AppState, arguments: &Value) -> (String, bool) {
    let req: ProcessRequest = match serde_json::from_value(arguments.clone()) {
        Ok(r) => r,
        Err(e) => return (format!("invalid process arguments: {e}"), true),
    };
    let resp = process::handle_process(&state.processes, req).await;
    let json = serde_json::to_string_pretty(&resp).unwrap_or_default();
    (json, false)
}

fn dispatch_skill_read_doc(state: &AppState, arguments: &Value) -> (String, bool) {
    let name = arguments
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    match state.skills.read_doc(name) {
        Ok(doc) => (doc, false),
        Err(e) => (format!("skill doc error: {e}"), true),
    }
}

fn dispatch_skill_read_resource(state: &AppState, arguments: &Value) -> (String, bool) {
    let name = arguments
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let path = arguments
        .get("path")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    match state.skills.read_resource(name, path) {
        Ok(content) => (content, false),
        Err(e) => (format!("resource error: {e}"), true),
    }
}

async fn dispatch_memory_search(state: &AppState, arguments: &Value) -> (String, bool) {
    let query = arguments
        .get("query")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let limit = arguments
        .get("limit")
        .and_then(|v| v.as_u64())
        .map(|v| v as u32);

    let req = ba_memory::RagSearchRequest { query, limit };

    match state.memory.search(req).await {
        Ok(results) => {
            let json = serde_json::to_string_pretty(&results).unwrap_or_default();
            (json, false)
        }
        Err(e) => (format!("memory search error: {e}"), true),
    }
}

async fn dispatch_memory_ingest(state: &AppState, arguments: &Value) -> (String, bool) {
    let content = arguments
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let source = arguments
        .get("source")
        .and_then(|v| v.as_str())
        .map(String::from);

    let req = ba_memory::MemoryIngestRequest {
        content,
        source,
        session_id: None,
        metadata: None,
        extract_entities: None,
    };

    match state.memory.ingest(req).await {
        Ok(resp) => {
            let json = serde_json::to_string_pretty(&resp).unwrap_or_default();
            (json, false)
        }
        Err(e) => (format!("memory ingest error: {e}"), true),
    }
}

async fn dispatch_literature_search(state: &AppState, arguments: &Value) -> (String, bool) {
    let req: ba_literature::SearchRequest = match serde_json::from_value(arguments.clone()) {
        Ok(r) => r,
        Err(e) => return (format!("invalid literature.search arguments: {e}"), true),
    };
    match state.literature.search(req).await {
        Ok(result) => (serde_json::to_string_pretty(&result).unwrap_or_default(), false),
        Err(e) => (format!("literature search error: {e}"), true),
    }
}

async fn dispatch_literature_get_paper(state: &AppState, arguments: &Value) -> (String, bool) {
    let identifier = arguments.get("identifier").and_then(|v| v.as_str()).unwrap_or("");
    let id_type = arguments
        .get("id_type")
        .and_then(|v| v.as_str())
        .unwrap_or("auto");
    match state.literature.get_paper(identifier, id_type).await {
        Ok(paper) => (serde_json::to_string_pretty(&paper).unwrap_or_default(), false),
        Err(e) => (format!("get_paper error: {e}"), true),
    }
}

async fn dispatch_uniprot_lookup(state: &AppState, arguments: &Value) -> (String, bool) {
    let accession = arguments.get("accession").and_then(|v| v.as_str()).unwrap_or("");
    match state.literature.uniprot_record(accession).await {
        Ok(record) => (serde_json::to_string_pretty(&record).unwrap_or_default(), false),
        Err(e) => (format!("uniprot lookup error: {e}"), true),
    }
}

async fn dispatch_uniprot_search(state: &AppState, arguments: &Value) -> (String, bool) {
    let query = arguments.get("query").and_then(|v| v.as_str()).unwrap_or("");
    let limit = arguments.get("limit").and_then(|v| v.as_u64()).unwrap_or(10) as usize;
    match state.literature.uniprot_search(query, limit).await {
        Ok(records) => (serde_json::to_string_pretty(&records).unwrap_or_default(), false),
        Err(e) => (format!("uniprot search error: {e}"), true),
    }
}

fn dispatch_citation_format(arguments: &Value) -> (String, bool) {
    let papers: Vec<ba_domain::bio::Paper> = match arguments
        .get("papers")
        .cloned()
        .map(serde_json::from_value)
    {
        Some(Ok(p)) => p,
        Some(Err(e)) => return (format!("invalid papers: {e}"), true),
        None => return ("missing required argument: papers".into(), true),
    };
    let style = arguments
        .get("style")
        .and_then(|v| v.as_str())
        .unwrap_or("vancouver");
    let style = match ba_domain::bio::citation::CitationStyleKind::parse(style) {
        Some(s) => s,
        None => return (format!("unknown citation style: {style}"), true),
    };
    let formatted = ba_domain::bio::citation::format_reference_list(&papers, style);
    (formatted, false)
}

async fn dispatch_ingest_fetch(state: &AppState, arguments: &Value) -> (String, bool) {
    let source = arguments.get("source").and_then(|v| v.as_str()).unwrap_or("");
    if source.is_empty() {
        return ("missing required argument: source".into(), true);
    }
    match state.ingest.ingest(source).await {
        Ok(record) => (serde_json::to_string_pretty(&record).unwrap_or_default(), false),
        Err(e) => (format!("ingest error: {e}"), true),
    }
}

async fn dispatch_ingest_profile(state: &AppState, arguments: &Value) -> (String, bool) {
    let dataset_id = arguments.get("dataset_id").and_then(|v| v.as_str()).unwrap_or("");
    match state.ingest.get(dataset_id).await {
        Some(record) => (serde_json::to_string_pretty(&record).unwrap_or_default(), false),
        None => (format!("unknown dataset_id: {dataset_id}"), true),
    }
}

async fn dispatch_agent_run(
    state: &AppState,
    arguments: &Value,
    session_key: Option<&str>,
) -> (String, bool) {
    let agent_id = match arguments.get("agent_id").and_then(|v| v.as_str()) {
        Some(id) => id,
        None => return ("missing required argument: agent_id".into(), true),
    };
    let task = match arguments.get("task").and_then(|v| v.as_str()) {
        Some(t) => t,
        None => return ("missing required argument: task".into(), true),
    };
    let model = arguments
        .get("model")
        .and_then(|v| v.as_str())
        .map(String::from);

    let parent_key = session_key.unwrap_or("anonymous");

    super::agent::run_agent(state, agent_id, task, model, parent_key).await
}

fn dispatch_agent_list(state: &AppState) -> (String, bool) {
    let manager = match &state.agents {
        Some(m) => m,
        None => {
            return (
                serde_json::json!({ "agents": [], "count": 0 }).to_string(),
                false,
            );
        }
    };

    let agents: Vec<_> = manager
        .list()
        .into_iter()
        .map(|id| {
            let runtime = manager.get(&id);
            match runtime {
                Some(r) => serde_json::json!({
                    "id": id,
                    "tools_allow": r.config.tool_policy.allow,
                    "tools_deny": r.config.tool_policy.deny,
                    "models": r.config.models,
                    "memory_mode": r.config.memory_mode,
                }),
                None => serde_json::json!({ "id": id }),
            }
        })
        .collect();

    (
        serde_json::json!({
            "agents": agents,
            "count": agents.len(),
        })
        .to_string(),
        false,
    )
}

fn stub_tool(name: &str, message: &str) -> (String, bool) {
    (
        serde_json::json!({
            "error": format!("Tool '{name}' is not available"),
            "message": message,
            "suggestion": "Use the 'exec' tool with appropriate CLI commands as a workaround."
        })
        .to_string(),
        true,
    )
}

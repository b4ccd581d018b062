/// Shared error type used across all BioAgent crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("Memory: {0}")]
    Memory(String),

    #[error("memory backend: {0}")]
    MemoryBackend(String),

    #[error("skill not found: {0}")]
    SkillNotFound(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("tool argument: {0}")]
    ToolArgument(String),

    #[error("tool handler {tool}: {message}")]
    ToolHandler { tool: String, message: String },

    #[error("tool {tool} timed out after {timeout_ms}ms")]
    ToolTimeout { tool: String, timeout_ms: u64 },

    #[error("cancelled")]
    Cancelled,

    #[error("external API {source} transient error: {message}")]
    ExternalApiTransient { source: String, message: String },

    #[error("external API {source} permanent error: {message}")]
    ExternalApiPermanent { source: String, message: String },

    #[error("LLM transport: {0}")]
    LlmTransport(String),

    #[error("parse: {0}")]
    Parse(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

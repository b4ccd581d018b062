use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A boxed async stream, used for LLM streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Events emitted during LLM streaming (provider-agnostic): partial
/// responses and tool call assembly as a provider sends them over the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// A text token chunk.
    #[serde(rename = "token")]
    Token { text: String },

    /// Reasoning/chain-of-thought content, kept separate from the final
    /// answer text (e.g. DeepSeek's `reasoning_content` delta field).
    #[serde(rename = "thinking")]
    Thinking { text: String },

    /// A tool call has started.
    #[serde(rename = "tool_call_started")]
    ToolCallStarted { call_id: String, tool_name: String },

    /// Incremental tool call argument data.
    #[serde(rename = "tool_call_delta")]
    ToolCallDelta { call_id: String, delta: String },

    /// A tool call is complete with full arguments.
    #[serde(rename = "tool_call_finished")]
    ToolCallFinished {
        call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },

    /// Stream is finished.
    #[serde(rename = "done")]
    Done {
        usage: Option<Usage>,
        finish_reason: Option<String>,
    },

    /// An error occurred during streaming.
    #[serde(rename = "error")]
    Error { message: String },
}

/// Token usage for a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One event in a turn's SSE stream (spec.md §3/§6): a tagged variant over
/// {thinking, tool_start, tool_result, code_output, text_delta, error, done,
/// disconnect}, each carrying a typed payload and a timestamp. A stream is
/// an ordered, append-only sequence of these events for one user turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnStreamEvent {
    /// Routing/reasoning narration (spec.md §4.4's routing decision, recorded
    /// as a `thinking` event).
    Thinking {
        content: String,
        timestamp: DateTime<Utc>,
    },

    /// Emitted by the dispatcher on tool entry (spec.md §3 "Observable effects").
    ToolStart {
        tool: String,
        input: serde_json::Value,
        timestamp: DateTime<Utc>,
    },

    /// Emitted by the dispatcher on tool exit. `output` may be a truncated
    /// preview (head+tail with a length-delta marker) for oversized payloads.
    ToolResult {
        tool: String,
        output: String,
        execution_time: f64,
        timestamp: DateTime<Utc>,
    },

    /// Output of the code-execution tool specifically, kept distinct from a
    /// generic `tool_result` so stdout/stderr/plots stay separately typed.
    CodeOutput {
        stdout: String,
        stderr: String,
        plots: Vec<String>,
        execution_time: f64,
        timestamp: DateTime<Utc>,
    },

    /// Incremental assistant text.
    TextDelta {
        delta: String,
        timestamp: DateTime<Utc>,
    },

    /// A recoverable or terminal error surfaced mid-turn.
    Error {
        error: String,
        details: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Terminal success event: total turn token usage (when known), elapsed
    /// time, and the set of tools invoked during the turn.
    Done {
        total_tokens: Option<u32>,
        execution_time: f64,
        tools_used: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// Terminal event on cancellation (spec.md §3's "emitting a `disconnect`
    /// terminal event" on subscriber disconnect or unwind).
    Disconnect { timestamp: DateTime<Utc> },
}

//! Coordinator — intent routing, specialist fan-out, and QC review.
//!
//! Given a user query the coordinator classifies intent, dispatches one
//! primary specialist plus optional secondaries as independent agent
//! loops, merges their outputs into a single synthesized answer, and
//! optionally runs a QC reviewer pass over the result.

use ba_domain::tool::Message;
use ba_providers::ChatRequest;
use tokio::sync::mpsc;

use crate::state::AppState;

use super::agent;
use super::cancel::CancelToken;
use super::turn::{finalize_run_success, TurnEvent, TurnInput};

/// One specialist's contribution to a coordinated turn.
struct SpecialistResult {
    agent_id: String,
    text: String,
    is_error: bool,
}

/// Run a turn through the coordinator: route → fan out to specialists →
/// synthesize → optional QC. Falls back to a single general-specialist
/// agent loop if orchestration itself fails (spec §4.3 "Fallback").
///
/// Mirrors `run_turn_inner`'s contract: shares the run record, transcript
/// persistence, and usage accounting via [`finalize_run_success`].
pub(super) async fn run_coordinated_turn(
    state: AppState,
    input: TurnInput,
    tx: mpsc::Sender<TurnEvent>,
    cancel: &CancelToken,
    run_id: uuid::Uuid,
) -> anyhow::Result<()> {
    match try_run_coordinated(&state, &input, &tx, cancel, run_id).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::warn!(
                error = %e,
                "multi-agent orchestration failed, falling back to single general agent"
            );
            run_single_agent_fallback(&state, &input, &tx, run_id).await
        }
    }
}

async fn try_run_coordinated(
    state: &AppState,
    input: &TurnInput,
    tx: &mpsc::Sender<TurnEvent>,
    cancel: &CancelToken,
    run_id: uuid::Uuid,
) -> anyhow::Result<()> {
    let cfg = &state.config.coordinator;
    let manager = state
        .agents
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("coordinator enabled but no agents configured"))?;

    let turn_started = chrono::Utc::now();
    let specialists = route(state, &input.user_message, cfg.max_specialists);
    let _ = tx
        .send(TurnEvent::Thinking {
            content: format!(
                "routing query to specialist(s): {}",
                specialists.join(", ")
            ),
            timestamp: chrono::Utc::now(),
        })
        .await;

    if cancel.is_cancelled() {
        return Ok(());
    }

    let results: Vec<SpecialistResult> = if cfg.parallel_specialists {
        let futures = specialists.iter().map(|id| {
            let id = id.clone();
            async move {
                let (text, is_error) = dispatch_specialist(state, &id, input, cfg).await;
                SpecialistResult { agent_id: id, text, is_error }
            }
        });
        futures_util::future::join_all(futures).await
    } else {
        let mut out = Vec::with_capacity(specialists.len());
        for id in &specialists {
            if cancel.is_cancelled() {
                break;
            }
            let (text, is_error) = dispatch_specialist(state, id, input, cfg).await;
            out.push(SpecialistResult { agent_id: id.clone(), text, is_error });
        }
        out
    };

    if cancel.is_cancelled() {
        return Ok(());
    }

    let tools_used: Vec<String> = results.iter().map(|r| r.agent_id.clone()).collect();
    let mut synthesized = synthesize(&results);

    if cfg.qc_enabled {
        if let Some(notes) = run_qc_review(state, &input.user_message, &synthesized).await {
            synthesized.push_str("\n\n### Reviewer notes\n");
            synthesized.push_str(&notes);
        }
    }

    tracing::info!(run_id = %run_id, specialists = ?tools_used, "coordinator synthesized answer");

    let usage = zero_usage();
    finalize_run_success(
        state,
        tx,
        input,
        run_id,
        &synthesized,
        &usage,
        turn_started,
        &tools_used,
    )
    .await;

    let _ = manager; // only needed to confirm agents are configured
    Ok(())
}

fn zero_usage() -> ba_domain::stream::Usage {
    ba_domain::stream::Usage {
        prompt_tokens: 0,
        completion_tokens: 0,
        total_tokens: 0,
    }
}

/// Degrade to a single agent loop scoped to `general_specialist` when
/// orchestration errors out.
async fn run_single_agent_fallback(
    state: &AppState,
    input: &TurnInput,
    tx: &mpsc::Sender<TurnEvent>,
    run_id: uuid::Uuid,
) -> anyhow::Result<()> {
    let turn_started = chrono::Utc::now();
    let general = state.config.coordinator.general_specialist.clone();
    let (text, is_error) = agent::run_agent(
        state,
        &general,
        &input.user_message,
        input.model.clone(),
        &input.session_key,
    )
    .await;

    if is_error {
        return Err(anyhow::anyhow!(text));
    }

    let usage = zero_usage();
    finalize_run_success(
        state,
        tx,
        input,
        run_id,
        &text,
        &usage,
        turn_started,
        &[general],
    )
    .await;
    Ok(())
}

/// Keyword-first intent classification; falls back to the general
/// specialist when no keyword match is confident (spec §4.3 "Routing").
fn route(state: &AppState, query: &str, max_specialists: usize) -> Vec<String> {
    let query_lower = query.to_lowercase();
    let mut scored: Vec<(String, usize)> = Vec::new();

    for (id, cfg) in &state.config.agents {
        let hits = cfg
            .domain_keywords
            .iter()
            .filter(|kw| !kw.is_empty() && query_lower.contains(&kw.to_lowercase()))
            .count();
        if hits > 0 {
            scored.push((id.clone(), hits));
        }
    }

    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    if scored.is_empty() {
        let general = state.config.coordinator.general_specialist.clone();
        if state.agents.as_ref().map(|m| m.get(&general).is_some()).unwrap_or(false) {
            return vec![general];
        }
        // No configured agents match at all — let the caller's fallback handle it.
        return state
            .agents
            .as_ref()
            .map(|m| m.list().into_iter().take(1).collect())
            .unwrap_or_default();
    }

    scored
        .into_iter()
        .take(max_specialists.max(1))
        .map(|(id, _)| id)
        .collect()
}

async fn dispatch_specialist(
    state: &AppState,
    agent_id: &str,
    input: &TurnInput,
    cfg: &ba_domain::config::CoordinatorConfig,
) -> (String, bool) {
    let timeout = std::time::Duration::from_millis(cfg.specialist_timeout_ms);
    match tokio::time::timeout(
        timeout,
        agent::run_agent(
            state,
            agent_id,
            &input.user_message,
            input.model.clone(),
            &input.session_key,
        ),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => (
            format!("specialist '{agent_id}' timed out after {}ms", cfg.specialist_timeout_ms),
            true,
        ),
    }
}

/// Merge specialist outputs: strongest (first-listed) specialist's text
/// leads, others are appended as supplements with near-duplicate
/// paragraphs dropped (spec §4.3 "Synthesis").
fn synthesize(results: &[SpecialistResult]) -> String {
    let mut seen_paragraphs: Vec<String> = Vec::new();
    let mut out = String::new();

    for (i, r) in results.iter().enumerate() {
        if r.text.trim().is_empty() {
            continue;
        }

        let mut section = String::new();
        for para in r.text.split("\n\n") {
            let normalized: String = para
                .to_lowercase()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            if normalized.is_empty() {
                continue;
            }
            if seen_paragraphs.iter().any(|p| p == &normalized) {
                continue;
            }
            seen_paragraphs.push(normalized);
            if !section.is_empty() {
                section.push_str("\n\n");
            }
            section.push_str(para.trim());
        }

        if section.is_empty() {
            continue;
        }

        if i == 0 {
            out.push_str(&section);
        } else if r.is_error {
            out.push_str(&format!("\n\n**{}** (error): {}", r.agent_id, section));
        } else {
            out.push_str(&format!("\n\n**From {}:**\n{}", r.agent_id, section));
        }
    }

    out
}

/// Run a checklist-style QC pass over the synthesized answer using a
/// smaller/cheaper model (spec §4.3 "QC Review"). Returns `None` when no
/// provider is available for the configured QC role, or the reviewer
/// raises no concerns worth annotating.
async fn run_qc_review(state: &AppState, query: &str, answer: &str) -> Option<String> {
    let provider = state.llm.for_role(&state.config.coordinator.qc_role)?;

    let prompt = format!(
        "You are a quality-control reviewer for a bioinformatics research assistant. \
         Review the following answer for: statistical validity, missing QC steps, \
         overstated conclusions, and missing caveats. If the answer has no concerns, \
         respond with exactly \"NONE\". Otherwise list concerns as short bullet points.\n\n\
         Original query: {query}\n\nAnswer under review:\n{answer}"
    );

    let req = ChatRequest {
        messages: vec![Message::system(
            "You review bioinformatics answers; you never rewrite them, only annotate concerns.",
        ), Message::user(prompt)],
        tools: vec![],
        temperature: Some(0.0),
        max_tokens: Some(512),
        json_mode: false,
        model: None,
    };

    match provider.chat(req).await {
        Ok(resp) if resp.content.trim().eq_ignore_ascii_case("none") => None,
        Ok(resp) if resp.content.trim().is_empty() => None,
        Ok(resp) => Some(resp.content),
        Err(e) => {
            tracing::warn!(error = %e, "QC review pass failed, skipping annotation");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(agent_id: &str, text: &str, is_error: bool) -> SpecialistResult {
        SpecialistResult {
            agent_id: agent_id.into(),
            text: text.into(),
            is_error,
        }
    }

    #[test]
    fn synthesize_empty_is_empty() {
        assert_eq!(synthesize(&[]), "");
    }

    #[test]
    fn synthesize_single_result_passthrough() {
        let results = vec![result("genomics", "The variant is pathogenic.", false)];
        assert_eq!(synthesize(&results), "The variant is pathogenic.");
    }

    #[test]
    fn synthesize_dedups_identical_paragraphs() {
        let results = vec![
            result("genomics", "Shared conclusion.\n\nGenomics detail.", false),
            result("transcriptomics", "Shared conclusion.\n\nExpression detail.", false),
        ];
        let out = synthesize(&results);
        assert_eq!(out.matches("Shared conclusion.").count(), 1);
        assert!(out.contains("Genomics detail."));
        assert!(out.contains("Expression detail."));
    }

    #[test]
    fn synthesize_marks_secondary_errors() {
        let results = vec![
            result("genomics", "Primary answer.", false),
            result("literature", "timed out", true),
        ];
        let out = synthesize(&results);
        assert!(out.starts_with("Primary answer."));
        assert!(out.contains("**literature** (error): timed out"));
    }

    #[test]
    fn synthesize_skips_blank_specialist_text() {
        let results = vec![result("genomics", "", false), result("qc", "Has content.", false)];
        let out = synthesize(&results);
        assert_eq!(out, "Has content.");
    }
}

//! In-process [`MemoryProvider`] backing the memory subsystem (spec.md §4.7):
//! transcript summaries, a content-addressable artifact store, a knowledge
//! graph, and a retrieval index all live as plain files under
//! `MemoryConfig.state_dir`/`artifacts_dir` instead of behind a remote API.
//!
//! The retrieval index is a deterministic lexical scorer (token-overlap
//! ratio) rather than dense embeddings — `MemoryConfig.embedding_model`
//! defaults to `"local-lexical-v1"` to name this explicitly; a real embedding
//! model can be swapped in later behind the same `search`/`answer` surface.

use std::collections::{BTreeMap, HashSet};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use ba_domain::config::MemoryConfig;
use ba_domain::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::provider::MemoryProvider;
use crate::types::{
    IngestResponse, MemoryIngestRequest, RagAnswerRequest, RagAnswerResponse, RagSearchRequest,
    RagSearchResponse, RetrievedMemoryDto, SessionRequest, UserPersonaRequest,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredMemory {
    id: String,
    content: String,
    source: Option<String>,
    session_id: Option<String>,
    metadata: Option<std::collections::HashMap<String, serde_json::Value>>,
    created_at: chrono::DateTime<Utc>,
    content_hash: String,
    entities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entity {
    name: String,
    entity_type: String,
    identifiers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Edge {
    src: String,
    dst: String,
    relation: String,
    provenance: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersonaAttr {
    attribute_type: String,
    attribute_key: String,
    attribute_value: String,
    confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionRecord {
    session_name: String,
    client_type: Option<String>,
    started_at: chrono::DateTime<Utc>,
    ended_at: Option<chrono::DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MemoryState {
    memories: BTreeMap<String, StoredMemory>,
    entities: BTreeMap<String, Entity>,
    edges: Vec<Edge>,
    persona: BTreeMap<String, PersonaAttr>,
    sessions: BTreeMap<String, SessionRecord>,
}

/// File-backed, in-process memory store. One instance is constructed at
/// startup and shared (read-concurrent, write-serialized) across sessions.
pub struct LocalMemoryProvider {
    state_dir: PathBuf,
    #[allow(dead_code)] // reserved for the artifact store (save/read/list).
    artifacts_dir: PathBuf,
    retrieval_top_k: usize,
    state: RwLock<MemoryState>,
}

impl LocalMemoryProvider {
    /// Load (best-effort) or initialize the store rooted at `cfg.state_dir`.
    pub fn new(cfg: &MemoryConfig) -> Result<Self> {
        std::fs::create_dir_all(&cfg.state_dir)?;
        std::fs::create_dir_all(&cfg.artifacts_dir)?;

        let state = load_state(&cfg.state_dir);
        Ok(Self {
            state_dir: cfg.state_dir.clone(),
            artifacts_dir: cfg.artifacts_dir.clone(),
            retrieval_top_k: cfg.retrieval_top_k,
            state: RwLock::new(state),
        })
    }

    fn path(&self) -> PathBuf {
        self.state_dir.join("memory_state.json")
    }

    async fn persist(&self, state: &MemoryState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path().with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, self.path()).await?;
        Ok(())
    }
}

fn load_state(state_dir: &Path) -> MemoryState {
    let path = state_dir.join("memory_state.json");
    match std::fs::read(&path) {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
        Err(_) => MemoryState::default(),
    }
}

/// Jaccard-style token overlap between a query and a memory's content.
/// Deterministic and embedding-free — see module docs.
fn lexical_similarity(query: &str, content: &str) -> f64 {
    let q: HashSet<String> = tokenize(query);
    if q.is_empty() {
        return 0.0;
    }
    let c: HashSet<String> = tokenize(content);
    if c.is_empty() {
        return 0.0;
    }
    let overlap = q.intersection(&c).count() as f64;
    let union = q.union(&c).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        overlap / union
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.len() > 2)
        .map(str::to_string)
        .collect()
}

/// Pattern-rule entity extraction: tokens that look like gene/protein
/// symbols (2-10 chars, starts uppercase, contains a digit or is all-caps)
/// per spec.md §4.7's "gene symbol regexes" example.
fn extract_gene_symbols(content: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut seen = HashSet::new();
    for word in content.split_whitespace() {
        let trimmed = word.trim_matches(|c: char| !c.is_alphanumeric());
        if trimmed.len() < 2 || trimmed.len() > 10 {
            continue;
        }
        let is_candidate = trimmed.chars().next().is_some_and(|c| c.is_ascii_uppercase())
            && trimmed.chars().all(|c| c.is_ascii_alphanumeric())
            && (trimmed.chars().any(|c| c.is_ascii_digit())
                || trimmed.chars().filter(|c| c.is_ascii_uppercase()).count() >= trimmed.len() - 1);
        if is_candidate && seen.insert(trimmed.to_string()) {
            found.push(trimmed.to_string());
        }
    }
    found
}

fn content_hash(content: &str) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[async_trait]
impl MemoryProvider for LocalMemoryProvider {
    async fn search(&self, req: RagSearchRequest) -> Result<RagSearchResponse> {
        let state = self.state.read().await;
        let limit = req.limit.unwrap_or(self.retrieval_top_k as u32) as usize;

        let mut scored: Vec<(f64, &StoredMemory)> = state
            .memories
            .values()
            .map(|m| (lexical_similarity(&req.query, &m.content), m))
            .filter(|(score, _)| *score >= req.threshold)
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        let memories = scored
            .into_iter()
            .map(|(score, m)| RetrievedMemoryDto {
                id: Some(m.id.clone()),
                content: m.content.clone(),
                source: m.source.clone(),
                similarity: Some(score),
                rank: None,
                created_at: Some(m.created_at.to_rfc3339()),
                metadata: m.metadata.clone(),
                entities: Some(m.entities.iter().map(|e| serde_json::json!(e)).collect()),
                memory_type: None,
                layer: None,
            })
            .collect::<Vec<_>>();

        Ok(RagSearchResponse {
            query: req.query,
            count: memories.len() as u32,
            memories,
        })
    }

    async fn answer(&self, req: RagAnswerRequest) -> Result<RagAnswerResponse> {
        let started = Instant::now();
        let search = self
            .search(RagSearchRequest {
                query: req.query.clone(),
                limit: req.max_memories,
                threshold: req.similarity_threshold.unwrap_or(0.3),
            })
            .await?;

        let answer = if search.memories.is_empty() {
            "No relevant memories found.".to_string()
        } else {
            search
                .memories
                .iter()
                .map(|m| format!("- {}", m.content))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let reasoning_trace = if req.include_reasoning_trace.unwrap_or(false) {
            Some(format!(
                "extractive synthesis over {} memories above similarity {:.2}",
                search.memories.len(),
                req.similarity_threshold.unwrap_or(0.3)
            ))
        } else {
            None
        };

        Ok(RagAnswerResponse {
            answer,
            query_id: Some(Uuid::new_v4().to_string()),
            memories: search.memories,
            reasoning_trace,
            model_name: Some("local-extractive-v1".to_string()),
            latency_ms: Some(started.elapsed().as_millis() as u64),
        })
    }

    async fn ingest(&self, req: MemoryIngestRequest) -> Result<IngestResponse> {
        let id = Uuid::new_v4().to_string();
        let hash = content_hash(&req.content);
        let extract = req.extract_entities.unwrap_or(false);
        let entities = if extract { extract_gene_symbols(&req.content) } else { Vec::new() };

        let record = StoredMemory {
            id: id.clone(),
            content: req.content,
            source: req.source,
            session_id: req.session_id,
            metadata: req.metadata,
            created_at: Utc::now(),
            content_hash: hash.clone(),
            entities: entities.clone(),
        };

        let mut state = self.state.write().await;
        state.memories.insert(id.clone(), record);

        // Upsert entities and link co-mentions (spec.md §4.7's knowledge
        // graph: dedup by canonical identifier where present, else name+type).
        for name in &entities {
            state
                .entities
                .entry(name.clone())
                .or_insert_with(|| Entity {
                    name: name.clone(),
                    entity_type: "gene".to_string(),
                    identifiers: vec![name.clone()],
                });
        }
        for pair in entities.windows(2) {
            state.edges.push(Edge {
                src: pair[0].clone(),
                dst: pair[1].clone(),
                relation: "mentioned_with".to_string(),
                provenance: Some(id.clone()),
            });
        }

        self.persist(&state).await?;

        Ok(IngestResponse {
            memory_id: id,
            entities_extracted: Some(entities.len() as u32),
            message: None,
            content_hash: Some(hash),
        })
    }

    async fn get_persona(&self) -> Result<serde_json::Value> {
        let state = self.state.read().await;
        let mut grouped: std::collections::HashMap<String, serde_json::Map<String, serde_json::Value>> =
            std::collections::HashMap::new();
        for attr in state.persona.values() {
            grouped
                .entry(attr.attribute_type.clone())
                .or_default()
                .insert(attr.attribute_key.clone(), serde_json::json!(attr.attribute_value));
        }
        Ok(serde_json::to_value(grouped)?)
    }

    async fn set_persona(&self, req: UserPersonaRequest) -> Result<()> {
        let key = format!("{}:{}", req.attribute_type, req.attribute_key);
        let mut state = self.state.write().await;
        state.persona.insert(
            key,
            PersonaAttr {
                attribute_type: req.attribute_type,
                attribute_key: req.attribute_key,
                attribute_value: req.attribute_value,
                confidence: req.confidence,
            },
        );
        self.persist(&state).await
    }

    async fn init_session(&self, req: SessionRequest) -> Result<serde_json::Value> {
        let mut state = self.state.write().await;
        state.sessions.insert(
            req.session_name.clone(),
            SessionRecord {
                session_name: req.session_name.clone(),
                client_type: req.client_type,
                started_at: Utc::now(),
                ended_at: None,
            },
        );
        self.persist(&state).await?;
        Ok(serde_json::json!({ "session_name": req.session_name, "status": "active" }))
    }

    async fn end_session(&self, session_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(s) = state.sessions.get_mut(session_id) {
            s.ended_at = Some(Utc::now());
        }
        self.persist(&state).await
    }

    async fn graph(&self, hops: u32, limit: u32) -> Result<serde_json::Value> {
        let state = self.state.read().await;
        let entities: Vec<_> = state.entities.values().take(limit as usize).collect();
        let names: HashSet<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        let edges: Vec<_> = state
            .edges
            .iter()
            .filter(|e| names.contains(e.src.as_str()) || names.contains(e.dst.as_str()))
            .take((limit as usize) * (hops.max(1) as usize))
            .collect();
        Ok(serde_json::json!({ "entities": entities, "edges": edges, "hops": hops }))
    }

    async fn stats(&self) -> Result<serde_json::Value> {
        let state = self.state.read().await;
        Ok(serde_json::json!({
            "memories": state.memories.len(),
            "entities": state.entities.len(),
            "edges": state.edges.len(),
            "sessions": state.sessions.len(),
        }))
    }

    async fn health(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({ "status": "ok", "backend": "local" }))
    }

    async fn update_memory(&self, id: &str, content: &str) -> Result<serde_json::Value> {
        let mut state = self.state.write().await;
        let Some(record) = state.memories.get_mut(id) else {
            return Err(Error::Other(format!("memory not found: {id}")));
        };
        record.content = content.to_string();
        record.content_hash = content_hash(content);
        let updated = serde_json::to_value(&*record)?;
        self.persist(&state).await?;
        Ok(updated)
    }

    async fn delete_memory(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.memories.remove(id);
        self.persist(&state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(dir: &Path) -> MemoryConfig {
        MemoryConfig {
            state_dir: dir.join("memory"),
            artifacts_dir: dir.join("artifacts"),
            ..MemoryConfig::default()
        }
    }

    #[tokio::test]
    async fn ingest_then_search_finds_by_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalMemoryProvider::new(&cfg(dir.path())).unwrap();
        provider
            .ingest(MemoryIngestRequest {
                content: "TP53 mutations are common in lung cancer samples".into(),
                source: Some("test".into()),
                session_id: None,
                metadata: None,
                extract_entities: Some(true),
            })
            .await
            .unwrap();

        let result = provider
            .search(RagSearchRequest { query: "TP53 lung cancer".into(), limit: None, threshold: 0.1 })
            .await
            .unwrap();
        assert_eq!(result.memories.len(), 1);
        assert!(result.memories[0].content.contains("TP53"));
    }

    #[tokio::test]
    async fn ingest_extracts_gene_symbols_and_links_them() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalMemoryProvider::new(&cfg(dir.path())).unwrap();
        provider
            .ingest(MemoryIngestRequest {
                content: "BRCA1 and BRCA2 interact with RAD51 in DNA repair".into(),
                source: None,
                session_id: None,
                metadata: None,
                extract_entities: Some(true),
            })
            .await
            .unwrap();

        let graph = provider.graph(1, 10).await.unwrap();
        let entities = graph.get("entities").unwrap().as_array().unwrap();
        assert!(entities.len() >= 2);
    }

    #[tokio::test]
    async fn persona_round_trips_through_set_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalMemoryProvider::new(&cfg(dir.path())).unwrap();
        provider
            .set_persona(UserPersonaRequest {
                attribute_type: "preferences".into(),
                attribute_key: "organism".into(),
                attribute_value: "human".into(),
                confidence: None,
                user_id: None,
            })
            .await
            .unwrap();

        let persona = provider.get_persona().await.unwrap();
        assert_eq!(persona["preferences"]["organism"], "human");
    }

    #[tokio::test]
    async fn delete_memory_removes_it_from_search() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalMemoryProvider::new(&cfg(dir.path())).unwrap();
        let resp = provider
            .ingest(MemoryIngestRequest {
                content: "a transient note about KRAS signaling".into(),
                source: None,
                session_id: None,
                metadata: None,
                extract_entities: Some(false),
            })
            .await
            .unwrap();

        provider.delete_memory(&resp.memory_id).await.unwrap();
        let result = provider
            .search(RagSearchRequest { query: "KRAS signaling".into(), limit: None, threshold: 0.1 })
            .await
            .unwrap();
        assert!(result.memories.is_empty());
    }

    #[tokio::test]
    async fn state_reloads_from_disk_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let provider = LocalMemoryProvider::new(&cfg(dir.path())).unwrap();
            provider
                .ingest(MemoryIngestRequest {
                    content: "persisted content about EGFR".into(),
                    source: None,
                    session_id: None,
                    metadata: None,
                    extract_entities: Some(false),
                })
                .await
                .unwrap();
        }
        let reloaded = LocalMemoryProvider::new(&cfg(dir.path())).unwrap();
        let result = reloaded
            .search(RagSearchRequest { query: "EGFR".into(), limit: None, threshold: 0.1 })
            .await
            .unwrap();
        assert_eq!(result.memories.len(), 1);
    }
}

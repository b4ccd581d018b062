//! UniProt protein/sequence lookup, grounded in
//! `petrsovadina-biomcp/src/sources/uniprot.rs`. Spec.md §4.8 scopes
//! pathway/sequence DB clients to "the core specifies only their
//! invocation contract," with one representative client fully built —
//! this is that client. It sits outside the `LiteratureSource` trait
//! (it returns protein records, not papers) but reuses the same
//! `ClientConfig`/`RateLimiter`/`retrying_fetch_json` foundation.

use std::time::Duration;

use ba_domain::bio::UniProtRecord;
use ba_domain::error::{Error, Result};

use crate::client::{retrying_fetch_json, ClientConfig, RateLimiter};

const BASE_URL: &str = "https://rest.uniprot.org/uniprotkb";
const FIELDS: &str = "accession,id,protein_name,gene_names,organism_name,length,cc_function,xref_pdb,xref_alphafolddb";

pub struct UniProtClient {
    http: reqwest::Client,
    rate_limiter: RateLimiter,
    config: ClientConfig,
}

impl Default for UniProtClient {
    fn default() -> Self {
        Self::new()
    }
}

impl UniProtClient {
    pub fn new() -> Self {
        let config = ClientConfig::new(BASE_URL, Duration::from_millis(300));
        Self {
            http: reqwest::Client::new(),
            rate_limiter: RateLimiter::new(config.min_interval),
            config,
        }
    }

    /// Fetch a single entry by its UniProt accession (e.g. "P15056").
    pub async fn get_record(&self, accession: &str) -> Result<UniProtRecord> {
        let accession = accession.trim();
        if accession.is_empty() {
            return Err(Error::ToolArgument("UniProt accession is required".into()));
        }

        self.rate_limiter.wait().await;
        let url = format!("{}/{accession}.json", self.config.base_url);
        let data = retrying_fetch_json(&self.http, "uniprot", self.config.max_retries, self.config.timeout, || {
            self.http.get(&url).header("User-Agent", &self.config.user_agent)
        })
        .await?;
        parse_record(&data)
    }

    /// Search UniProtKB by free-text query, returning up to `limit` entries.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<UniProtRecord>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::ToolArgument("UniProt query is required".into()));
        }

        self.rate_limiter.wait().await;
        let size = limit.clamp(1, 25).to_string();
        let url = format!("{}/search", self.config.base_url);
        let data = retrying_fetch_json(&self.http, "uniprot", self.config.max_retries, self.config.timeout, || {
            self.http
                .get(&url)
                .header("User-Agent", &self.config.user_agent)
                .query(&[("query", query), ("format", "json"), ("size", size.as_str()), ("fields", FIELDS)])
        })
        .await?;

        let results = data.get("results").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        results.iter().map(parse_record).collect()
    }
}

fn parse_record(value: &serde_json::Value) -> Result<UniProtRecord> {
    let accession = value
        .get("primaryAccession")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    if accession.is_empty() {
        return Err(Error::Parse("uniprot: record missing primaryAccession".into()));
    }

    let entry_name = value
        .get("uniProtkbId")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let protein_name = value
        .get("proteinDescription")
        .and_then(|v| v.get("recommendedName"))
        .or_else(|| {
            value
                .get("proteinDescription")
                .and_then(|v| v.get("submissionNames"))
                .and_then(|v| v.as_array())
                .and_then(|arr| arr.first())
        })
        .and_then(|v| v.get("fullName"))
        .and_then(|v| v.get("value"))
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let gene_names: Vec<String> = value
        .get("genes")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|g| g.get("geneName").and_then(|n| n.get("value")).and_then(|v| v.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let organism = value
        .get("organism")
        .and_then(|v| v.get("scientificName"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let sequence_length = value
        .get("sequence")
        .and_then(|v| v.get("length"))
        .and_then(|v| v.as_u64())
        .map(|n| n as u32);

    let function_summary = value
        .get("comments")
        .and_then(|v| v.as_array())
        .and_then(|arr| {
            arr.iter().find(|c| {
                c.get("commentType")
                    .and_then(|v| v.as_str())
                    .is_some_and(|t| t.eq_ignore_ascii_case("function"))
            })
        })
        .and_then(|c| c.get("texts"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|v| v.get("value"))
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let mut structure_ids = Vec::new();
    if let Some(refs) = value.get("uniProtKBCrossReferences").and_then(|v| v.as_array()) {
        for xref in refs {
            let db = xref.get("database").and_then(|v| v.as_str());
            let id = xref.get("id").and_then(|v| v.as_str());
            if let (Some(db), Some(id)) = (db, id) {
                if matches!(db, "PDB" | "AlphaFoldDB") && !structure_ids.iter().any(|v: &String| v == id) {
                    structure_ids.push(id.to_string());
                }
            }
        }
    }

    Ok(UniProtRecord {
        accession,
        entry_name,
        protein_name,
        gene_names,
        organism,
        sequence_length,
        function_summary,
        structure_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_record_extracts_core_fields() {
        let value = serde_json::json!({
            "primaryAccession": "P15056",
            "uniProtkbId": "BRAF_HUMAN",
            "proteinDescription": {
                "recommendedName": { "fullName": { "value": "Serine/threonine-protein kinase B-raf" } }
            },
            "genes": [{ "geneName": { "value": "BRAF" } }],
            "organism": { "scientificName": "Homo sapiens" },
            "sequence": { "length": 766 },
            "comments": [
                { "commentType": "FUNCTION", "texts": [{ "value": "Involved in the RAS/RAF/MEK/ERK pathway." }] }
            ],
            "uniProtKBCrossReferences": [
                { "database": "PDB", "id": "1UWH" },
                { "database": "AlphaFoldDB", "id": "AF-P15056-F1" },
                { "database": "GO", "id": "GO:0004672" }
            ]
        });
        let record = parse_record(&value).unwrap();
        assert_eq!(record.accession, "P15056");
        assert_eq!(record.entry_name.as_deref(), Some("BRAF_HUMAN"));
        assert_eq!(record.protein_name.as_deref(), Some("Serine/threonine-protein kinase B-raf"));
        assert_eq!(record.gene_names, vec!["BRAF".to_string()]);
        assert_eq!(record.organism.as_deref(), Some("Homo sapiens"));
        assert_eq!(record.sequence_length, Some(766));
        assert!(record.function_summary.unwrap().contains("RAS/RAF/MEK/ERK"));
        assert_eq!(record.structure_ids, vec!["1UWH".to_string(), "AF-P15056-F1".to_string()]);
    }

    #[test]
    fn parse_record_rejects_missing_accession() {
        let value = serde_json::json!({ "uniProtkbId": "X" });
        assert!(parse_record(&value).is_err());
    }
}

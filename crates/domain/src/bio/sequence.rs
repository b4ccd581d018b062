use serde::{Deserialize, Serialize};

/// A simplified protein record from a sequence database (spec.md §4.8
/// pathway/sequence DB clients), grounded in
/// `petrsovadina-biomcp/src/sources/uniprot.rs`'s `UniProtRecord`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniProtRecord {
    pub accession: String,
    pub entry_name: Option<String>,
    pub protein_name: Option<String>,
    #[serde(default)]
    pub gene_names: Vec<String>,
    pub organism: Option<String>,
    pub sequence_length: Option<u32>,
    pub function_summary: Option<String>,
    #[serde(default)]
    pub structure_ids: Vec<String>,
}

//! Typed carriers for workflow-engine invocation and study-plan suggestions.
//!
//! Grounded in `original_source/workflows/{nextflow,snakemake,wdl}.py` and
//! `Research_Agent/workflows/study_planner.py`. No engine is executed here —
//! per spec.md §1's non-goal, the core specifies only the invocation
//! contract; a tool handler that actually shells out to an engine is a thin
//! adapter over `ba_tools::exec`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEngine {
    Nextflow,
    Snakemake,
    Wdl,
}

/// What a workflow tool handler needs to invoke an external engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDescriptor {
    pub engine: WorkflowEngine,
    pub workflow_id: String,
    pub definition_path: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// One step of a suggested study plan, attached to ingestion's
/// `suggested_analyses` or produced by the pipeline specialist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyPlanStep {
    pub name: String,
    pub description: String,
    pub workflow: Option<WorkflowDescriptor>,
    pub depends_on: Vec<String>,
}

//! Shared data model for the bioinformatics domain: literature entities,
//! ingested files, and the typed descriptors that carry workflow/report/plot
//! requests across the tool dispatch boundary.

pub mod citation;
pub mod ingest;
pub mod literature;
pub mod sequence;
pub mod workflow;

pub use citation::{format_reference_list, CitationStyleKind};
pub use ingest::{
    DatasetValidation, FetchedFile, FileFormat, FileFormatCategory, FileProfile, QualityFlag,
    QualityLevel, QualitySeverity, SourceDescriptor, SuggestedAnalysis,
};
pub use literature::{Author, Paper};
pub use sequence::UniProtRecord;
pub use workflow::{StudyPlanStep, WorkflowDescriptor, WorkflowEngine};

pub mod confidence;
pub mod source;

pub use confidence::{
    ConfidenceCategory, ConfidenceInput, ConfidenceReport, ConfidenceScorer,
};
pub use source::{SourceKind, SourceScore, SourceScorer};

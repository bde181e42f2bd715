pub mod extraction;
pub mod classification;
pub mod workflow;
pub mod processor;

pub use classification::{classify, classify_against, expected_substances, Classification};
pub use processor::{
    IngestOutcome, LookupError, MedicationSource, PipelineError, ScreeningProcessor,
};
pub use workflow::WorkflowError;

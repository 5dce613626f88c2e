pub mod report;
pub mod runner;

use thiserror::Error;

pub use report::RunReport;
pub use runner::Pipeline;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source text too short ({chars} chars, need {min})")]
    ContentTooShort { chars: usize, min: usize },
}

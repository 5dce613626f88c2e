pub mod ingest;
pub mod rewrite;
pub mod validation;
pub mod publish;
pub mod pipeline;
pub mod schedule;

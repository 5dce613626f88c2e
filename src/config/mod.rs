pub mod ingest_profile;

pub use ingest_profile::{FeedConfig, IngestProfile};

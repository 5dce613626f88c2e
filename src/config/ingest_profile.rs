use serde::Deserialize;
use config::{Config, Environment, File};
use anyhow::Result;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    pub dry_run: bool,
    pub max_content_chars: usize,
    pub min_content_chars: usize,
    pub item_gap_ms: u64,
    pub default_max_items: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            max_content_chars: 12_000,
            min_content_chars: 400,
            item_gap_ms: 1_500,
            default_max_items: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub temperature: f64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_attempts: 4,
            backoff_base_ms: 2_000,
            backoff_max_ms: 60_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_sec: u64,
    /// Interval used for the bootstrap schedule created on an empty database.
    pub default_interval_minutes: i32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tick_sec: 60, default_interval_minutes: 30 }
    }
}

/// A feed declared in the config file. Upserted into `feed_sources` on startup.
#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub auto_publish: bool,
    #[serde(default)]
    pub default_category: Option<String>,
    #[serde(default)]
    pub max_items: Option<usize>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct IngestProfile {
    pub pipeline: PipelineConfig,
    pub llm: LlmConfig,
    pub scheduler: SchedulerConfig,
    pub feeds: Vec<FeedConfig>,
}

impl IngestProfile {
    /// Reads `ingest_config.{toml,yaml,json}` from the working directory,
    /// then applies `INGEST__SECTION__KEY` environment overrides.
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name("ingest_config").required(false))
            .add_source(Environment::with_prefix("INGEST").separator("__").try_parsing(true))
            .build()?;

        let profile: IngestProfile = settings.try_deserialize()?;
        Ok(profile)
    }

    #[cfg(test)]
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        use config::FileFormat;

        let settings = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn enabled_feeds(&self) -> impl Iterator<Item = &FeedConfig> {
        self.feeds.iter().filter(|f| f.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let profile = IngestProfile::from_toml_str("").unwrap();
        assert!(!profile.pipeline.dry_run);
        assert_eq!(profile.pipeline.max_content_chars, 12_000);
        assert_eq!(profile.llm.max_attempts, 4);
        assert_eq!(profile.scheduler.tick_sec, 60);
        assert!(profile.feeds.is_empty());
    }

    #[test]
    fn feeds_and_overrides_are_read() {
        let raw = r#"
            [pipeline]
            dry_run = true
            item_gap_ms = 0

            [[feeds]]
            name = "G1 Economia"
            url = "https://g1.globo.com/rss/g1/economia/"
            auto_publish = true
            default_category = "economia"

            [[feeds]]
            name = "Desativado"
            url = "https://example.com/feed"
            enabled = false
        "#;
        let profile = IngestProfile::from_toml_str(raw).unwrap();
        assert!(profile.pipeline.dry_run);
        assert_eq!(profile.pipeline.item_gap_ms, 0);
        assert_eq!(profile.pipeline.min_content_chars, 400);
        assert_eq!(profile.feeds.len(), 2);
        assert!(profile.feeds[0].auto_publish);
        assert_eq!(profile.feeds[0].default_category.as_deref(), Some("economia"));

        let enabled: Vec<_> = profile.enabled_feeds().map(|f| f.name.as_str()).collect();
        assert_eq!(enabled, vec!["G1 Economia"]);
    }
}

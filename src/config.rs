//! Configuration parsing and validation.
//!
//! The harvester is configured by a TOML file (default `./config/oaih.toml`):
//!
//! ```toml
//! [db]
//! path = "./data/oaih.sqlite"
//!
//! [source]
//! url = "http://repo.example.org/oai"
//! query = "Science"
//! snapshot = "./repo.json"
//!
//! [harvest]
//! metadata_prefix = "oai_dc"
//! concurrency = 4
//! lenient_fetch = true
//!
//! [log]
//! level = "info"
//! format = "text"
//! ```
//!
//! Only `[db]` and `[source].url` are required.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use oai_harvest_core::fetch::FetchPolicy;
use oai_harvest_core::models::HarvestSource;
use oai_harvest_core::protocol::MetadataProfile;
use oai_harvest_core::HarvestOptions;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub url: String,
    #[serde(default)]
    pub query: Option<String>,
    /// Captured repository replayed instead of a live endpoint.
    #[serde(default)]
    pub snapshot: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HarvestConfig {
    #[serde(default = "default_metadata_prefix")]
    pub metadata_prefix: String,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_lenient_fetch")]
    pub lenient_fetch: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            metadata_prefix: default_metadata_prefix(),
            concurrency: default_concurrency(),
            lenient_fetch: default_lenient_fetch(),
        }
    }
}

fn default_metadata_prefix() -> String {
    "oai_dc".to_string()
}
fn default_concurrency() -> usize {
    4
}
fn default_lenient_fetch() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// The harvest source, with `query_override` taking precedence over
    /// `[source].query`.
    pub fn harvest_source(&self, query_override: Option<&str>) -> HarvestSource {
        let query = query_override
            .map(str::to_string)
            .or_else(|| self.source.query.clone())
            .filter(|q| !q.is_empty());
        HarvestSource {
            url: self.source.url.clone(),
            query,
        }
    }

    pub fn harvest_options(&self) -> Result<HarvestOptions> {
        let profile = MetadataProfile::from_prefix(&self.harvest.metadata_prefix)
            .with_context(|| {
                format!(
                    "Unsupported metadata prefix: '{}'. Only oai_dc is supported.",
                    self.harvest.metadata_prefix
                )
            })?;
        Ok(HarvestOptions {
            profile,
            concurrency: self.harvest.concurrency,
            fetch_policy: if self.harvest.lenient_fetch {
                FetchPolicy::Lenient
            } else {
                FetchPolicy::Strict
            },
        })
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.source.url.trim().is_empty() {
        anyhow::bail!("source.url must not be empty");
    }

    if config.harvest.concurrency == 0 {
        anyhow::bail!("harvest.concurrency must be >= 1");
    }

    // Validate metadata prefix
    config.harvest_options()?;

    if !LOG_LEVELS.contains(&config.log.level.to_lowercase().as_str()) {
        anyhow::bail!(
            "Unknown log level: '{}'. Must be one of trace, debug, info, warn, error.",
            config.log.level
        );
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[db]
path = "./data/oaih.sqlite"

[source]
url = "http://repo.example.org/oai"
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = parse_config(MINIMAL).unwrap();
        assert_eq!(cfg.harvest.metadata_prefix, "oai_dc");
        assert_eq!(cfg.harvest.concurrency, 4);
        assert!(cfg.harvest.lenient_fetch);
        assert_eq!(cfg.log.level, "info");
        assert_eq!(cfg.log.format, LogFormat::Text);
        assert!(cfg.source.snapshot.is_none());

        let options = cfg.harvest_options().unwrap();
        assert_eq!(options.fetch_policy, FetchPolicy::Lenient);
        assert_eq!(options.profile.prefix, "oai_dc");
    }

    #[test]
    fn test_query_override() {
        let cfg = parse_config(&format!("{}query = \"Science\"\n", MINIMAL)).unwrap();
        assert_eq!(cfg.harvest_source(None).query.as_deref(), Some("Science"));
        assert_eq!(cfg.harvest_source(Some("Art")).query.as_deref(), Some("Art"));
        assert_eq!(cfg.harvest_source(Some("")).query, None);
    }

    #[test]
    fn test_rejects_unsupported_prefix() {
        let content = format!("{}\n[harvest]\nmetadata_prefix = \"marc21\"\n", MINIMAL);
        let err = parse_config(&content).unwrap_err();
        assert!(err.to_string().contains("marc21"));
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let content = format!("{}\n[harvest]\nconcurrency = 0\n", MINIMAL);
        assert!(parse_config(&content).is_err());
    }

    #[test]
    fn test_strict_fetch_and_json_logs() {
        let content = format!(
            "{}\n[harvest]\nlenient_fetch = false\n\n[log]\nlevel = \"debug\"\nformat = \"json\"\n",
            MINIMAL
        );
        let cfg = parse_config(&content).unwrap();
        assert_eq!(cfg.harvest_options().unwrap().fetch_policy, FetchPolicy::Strict);
        assert_eq!(cfg.log.format, LogFormat::Json);
    }

    #[test]
    fn test_rejects_empty_url() {
        let content = "[db]\npath = \"x.sqlite\"\n\n[source]\nurl = \"  \"\n";
        assert!(parse_config(content).is_err());
    }
}

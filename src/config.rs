use std::fs;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::HarvestError;
use crate::retry::TransientErrorMatcher;

pub const DEFAULT_CONFIG_FILE: &str = "modeldb-harvest.json";

pub const DEFAULT_LISTING_URL: &str = "https://senselab.med.yale.edu/_site/webapi/object.json/?cl=19";
pub const DEFAULT_DETAIL_BASE_URL: &str = "https://senselab.med.yale.edu/_site/webapi/object.json";
pub const DEFAULT_ARCHIVE_DIR: &str = "zips";
pub const DEFAULT_CHECKPOINT_PATH: &str = "modeldb-metadata.json";
pub const DEFAULT_ARCHIVE_ATTRIBUTE_ID: i64 = 23;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 10;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub listing_url: Option<String>,
    #[serde(default)]
    pub detail_base_url: Option<String>,
    #[serde(default)]
    pub archive_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub checkpoint_path: Option<Utf8PathBuf>,
    #[serde(default)]
    pub archive_attribute_id: Option<i64>,
    #[serde(default)]
    pub ignored_attributes: Option<Vec<String>>,
    #[serde(default)]
    pub retry_delay_secs: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub transient_error: Option<TransientErrorEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TransientErrorEntry {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub listing_url: String,
    pub detail_base_url: String,
    pub archive_dir: Utf8PathBuf,
    pub checkpoint_path: Utf8PathBuf,
    pub archive_attribute_id: i64,
    pub ignored_attributes: Vec<String>,
    pub retry_delay: Duration,
    pub max_retries: Option<u32>,
    pub request_timeout: Option<Duration>,
    pub transient_error: TransientErrorMatcher,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        ConfigLoader::resolve_config(Config::default())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&Utf8Path>) -> Result<ResolvedConfig, HarvestError> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Utf8PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if !config_path.as_std_path().exists() {
            return match path {
                Some(_) => Err(HarvestError::MissingConfig(config_path)),
                None => Ok(ResolvedConfig::default()),
            };
        }

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| HarvestError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| HarvestError::ConfigParse(err.to_string()))?;

        Ok(Self::resolve_config(config))
    }

    pub fn resolve_config(config: Config) -> ResolvedConfig {
        let transient_error = config
            .transient_error
            .map(|entry| TransientErrorMatcher::new(entry.field, entry.message))
            .unwrap_or_default();

        ResolvedConfig {
            listing_url: config
                .listing_url
                .unwrap_or_else(|| DEFAULT_LISTING_URL.to_string()),
            detail_base_url: config
                .detail_base_url
                .unwrap_or_else(|| DEFAULT_DETAIL_BASE_URL.to_string()),
            archive_dir: config
                .archive_dir
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_ARCHIVE_DIR)),
            checkpoint_path: config
                .checkpoint_path
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_CHECKPOINT_PATH)),
            archive_attribute_id: config
                .archive_attribute_id
                .unwrap_or(DEFAULT_ARCHIVE_ATTRIBUTE_ID),
            ignored_attributes: config
                .ignored_attributes
                .unwrap_or_else(default_ignored_attributes),
            retry_delay: Duration::from_secs(
                config.retry_delay_secs.unwrap_or(DEFAULT_RETRY_DELAY_SECS),
            ),
            max_retries: config.max_retries,
            request_timeout: config.request_timeout_secs.map(Duration::from_secs),
            transient_error,
        }
    }
}

pub fn default_ignored_attributes() -> Vec<String> {
    vec![
        "runprotocols".to_string(),
        "hide_autolaunch_button".to_string(),
        "has_modelview".to_string(),
        "simPFid".to_string(),
        "hg".to_string(),
    ]
}

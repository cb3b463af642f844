use crate::model::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_URL: &str =
    "https://www.audigainesville.com/global-incentives-search/index.htm?ddcref=tier1_offers";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Json,
    Sqlite,
}

/// DOM locations of everything the pipeline reads or clicks.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub results_count: String,
    pub listing_container: String,
    pub listing_item: String,
    pub listing_name: String,
    /// 1-based position of the `<a>` inside a listing that opens its detail view.
    pub detail_link_position: usize,
    pub facets_container: String,
    /// 1-based positions of the `<div>` groups inside the facet sidebar.
    pub year_group: usize,
    pub style_group: usize,
    pub model_group: usize,
    pub facet_list: String,
    pub facet_item: String,
    pub consent_button: String,
    pub finance_section: String,
    pub promotion_section: String,
    pub offer_article: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            results_count: ".incentives-header #results-count".into(),
            listing_container: ".vehicles-container".into(),
            listing_item: ".vehicle-container".into(),
            listing_name: "h5".into(),
            detail_link_position: 2,
            facets_container: ".facets-container".into(),
            year_group: 2,
            style_group: 4,
            model_group: 5,
            facet_list: "ul".into(),
            facet_item: "li".into(),
            consent_button: "button.ca-button.ca-secondary-button.ca-secondary-button-first.ca-button-opt-in".into(),
            finance_section: r#"section[data-offer="APR"]"#.into(),
            promotion_section: r#"section[data-offer="PROMOTION"]"#.into(),
            offer_article: "article".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub api_key_env: String,
    /// USD per 1000 prompt tokens.
    pub prompt_cost_per_1k: f64,
    /// USD per 1000 completion tokens.
    pub completion_cost_per_1k: f64,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-3.5-turbo-0125".into(),
            temperature: 0.0,
            api_key_env: "OPENAI_API_KEY".into(),
            prompt_cost_per_1k: 0.0005,
            completion_cost_per_1k: 0.0015,
            max_attempts: 3,
            retry_delay_ms: 2000,
            timeout_seconds: 60,
        }
    }
}

impl LlmConfig {
    pub fn api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::MissingCredential(self.api_key_env.clone()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub url: String,
    pub storage: StorageKind,
    pub output_path: PathBuf,
    pub sqlite_path: PathBuf,
    /// Where page snapshots are written when the page no longer matches the selectors.
    pub debug_html_dir: Option<PathBuf>,
    pub user_agent: String,
    pub request_timeout_seconds: u64,
    pub llm: LlmConfig,
    pub selectors: SelectorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.into(),
            storage: StorageKind::Json,
            output_path: PathBuf::from("extracted_offers.json"),
            sqlite_path: PathBuf::from("offers.db"),
            debug_html_dir: Some(PathBuf::from("logs/html")),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) IncentiveHarvest/0.1".into(),
            request_timeout_seconds: 30,
            llm: LlmConfig::default(),
            selectors: SelectorConfig::default(),
        }
    }
}

/// Reads the JSON config at `path`. A missing file yields the defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        warn!("Config {} not found, using defaults", path.display());
        return Ok(AppConfig::default());
    }
    let content = fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

const SETTINGS_FILE: &str = "legis_qa";
const ENV_PREFIX: &str = "LEGIS";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub output_path: PathBuf,
    pub checkpoint_path: PathBuf,
    /// Documents structured at once; unset means every hit is in flight together.
    pub batch_size: Option<usize>,
    pub api: ApiSettings,
    pub cache: CacheSettings,
    pub structuring: StructuringSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("qa_pairs.jsonl"),
            checkpoint_path: PathBuf::from("progress.json"),
            batch_size: None,
            api: ApiSettings::default(),
            cache: CacheSettings::default(),
            structuring: StructuringSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub site_origin: String,
    pub page_size: usize,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.legislation.vic.gov.au/api/tide/elasticsearch/elasticsearch_index_production_node/_search".into(),
            site_origin: "https://www.legislation.vic.gov.au".into(),
            page_size: 40,
            max_retries: 3,
            backoff_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub dir: PathBuf,
    pub ttl_hours: i64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("storage"),
            ttl_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StructuringSettings {
    /// Root of an OpenAI-compatible API, e.g. `http://localhost:11434/v1`.
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_input_chars: usize,
    pub max_output_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
}

impl Default for StructuringSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".into(),
            model: "mistral".into(),
            api_key: None,
            timeout_secs: 120,
            max_input_chars: 8192,
            max_output_tokens: 4096,
            temperature: 0.7,
            top_p: 0.95,
        }
    }
}

impl Settings {
    /// Defaults, then `legis_qa.toml` if present, then `LEGIS_*` variables
    /// (`__` separates nested keys, e.g. `LEGIS_STRUCTURING__MODEL`).
    pub fn load() -> Result<Self> {
        Config::builder()
            .add_source(File::with_name(SETTINGS_FILE).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")
    }
}

// ── Tests ──

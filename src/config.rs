use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL override. Ollama defaults to `http://localhost:11434`,
    /// OpenAI to `https://api.openai.com/v1`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub temperature: f32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            url: None,
            timeout_secs: 30,
            max_retries: 3,
            temperature: 0.0,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}

impl CompletionConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_search_backend")]
    pub backend: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_index")]
    pub index: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: default_search_backend(),
            url: None,
            index: default_index(),
        }
    }
}

fn default_search_backend() -> String {
    "sqlite".to_string()
}
fn default_index() -> String {
    "grants_idx".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_limit: default_candidate_limit(),
        }
    }
}

fn default_candidate_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct MatchingConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_judge_concurrency")]
    pub judge_concurrency: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            judge_concurrency: default_judge_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_top_n() -> usize {
    3
}
fn default_judge_concurrency() -> usize {
    4
}
fn default_request_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Parse and validate a TOML config string.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate retrieval / matching
    if config.retrieval.candidate_limit == 0 {
        anyhow::bail!("retrieval.candidate_limit must be >= 1");
    }
    if config.matching.top_n == 0 {
        anyhow::bail!("matching.top_n must be >= 1");
    }
    if config.matching.judge_concurrency == 0 {
        anyhow::bail!("matching.judge_concurrency must be >= 1");
    }
    if config.matching.request_timeout_secs == 0 {
        anyhow::bail!("matching.request_timeout_secs must be > 0");
    }

    // Validate completion
    match config.completion.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown completion provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.completion.is_enabled() && config.completion.model.is_none() {
        anyhow::bail!(
            "completion.model must be specified when provider is '{}'",
            config.completion.provider
        );
    }

    // Validate search
    match config.search.backend.as_str() {
        "sqlite" => {}
        "opensearch" => {
            if config.search.url.is_none() {
                anyhow::bail!("search.url must be specified when backend is 'opensearch'");
            }
        }
        other => anyhow::bail!(
            "Unknown search backend: '{}'. Must be sqlite or opensearch.",
            other
        ),
    }

    Ok(config)
}

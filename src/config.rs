//! TOML configuration.
//!
//! Every section is optional; an empty file yields a working configuration
//! that talks to the public upstream APIs and a local Ollama instance.
//! Secrets never live in the file: connectors and providers read them from
//! the environment (or a `.env` file) through [`secret`].
//!
//! ```toml
//! [sources]
//! timeout_secs = 60
//!
//! [sources.gnews]
//! page_size = 100
//! max_pages = 10
//!
//! [chunking]
//! max_chars = 1000
//! overlap_chars = 100
//!
//! [retrieval]
//! k = 25
//! fetch_k = 60
//! lambda_mult = 0.7
//!
//! [embedding]
//! provider = "local"
//! model = "all-minilm-l6-v2"
//!
//! [generation]
//! provider = "ollama"
//! model = "llama3.2:3b"
//! max_tokens = 1500
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

// ============ Sources ============

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    /// Upper bound on one connector's whole fetch, pagination included.
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
    /// Retries per upstream request on 429/5xx/network errors.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub worldbank: WorldBankConfig,
    #[serde(default)]
    pub reliefweb: ReliefWebConfig,
    #[serde(default)]
    pub gnews: GNewsConfig,
    #[serde(default)]
    pub acled: AcledConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_source_timeout(),
            max_retries: 0,
            worldbank: WorldBankConfig::default(),
            reliefweb: ReliefWebConfig::default(),
            gnews: GNewsConfig::default(),
            acled: AcledConfig::default(),
        }
    }
}

fn default_source_timeout() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndicatorConfig {
    pub code: String,
    pub label: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorldBankConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_worldbank_url")]
    pub base_url: String,
    #[serde(default = "default_indicators")]
    pub indicators: Vec<IndicatorConfig>,
}

impl Default for WorldBankConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_worldbank_url(),
            indicators: default_indicators(),
        }
    }
}

fn default_worldbank_url() -> String {
    "https://api.worldbank.org".to_string()
}

fn default_indicators() -> Vec<IndicatorConfig> {
    [
        ("SP.POP.TOTL", "Total population"),
        ("SP.POP.GROW", "Population growth (annual %)"),
        ("NY.GDP.MKTP.CD", "GDP (current US$)"),
        ("NY.GDP.MKTP.KD.ZG", "GDP growth (annual %)"),
        ("NY.GDP.PCAP.CD", "GDP per capita (current US$)"),
        ("SL.UEM.TOTL.ZS", "Unemployment, total (% of labor force)"),
        ("FP.CPI.TOTL.ZG", "Inflation, consumer prices (annual %)"),
    ]
    .into_iter()
    .map(|(code, label)| IndicatorConfig {
        code: code.to_string(),
        label: label.to_string(),
    })
    .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReliefWebConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_reliefweb_url")]
    pub base_url: String,
    #[serde(default = "default_appname")]
    pub appname: String,
    #[serde(default = "default_page_size")]
    pub limit: usize,
    #[serde(default = "default_reliefweb_language")]
    pub language: String,
}

impl Default for ReliefWebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_reliefweb_url(),
            appname: default_appname(),
            limit: default_page_size(),
            language: default_reliefweb_language(),
        }
    }
}

fn default_reliefweb_url() -> String {
    "https://api.reliefweb.int".to_string()
}
fn default_appname() -> String {
    "relief-datastream".to_string()
}
fn default_page_size() -> usize {
    100
}
fn default_reliefweb_language() -> String {
    "English".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GNewsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_gnews_url")]
    pub base_url: String,
    #[serde(default = "default_gnews_language")]
    pub language: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_gnews_key_env")]
    pub api_key_env: String,
}

impl Default for GNewsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_gnews_url(),
            language: default_gnews_language(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            api_key_env: default_gnews_key_env(),
        }
    }
}

fn default_gnews_url() -> String {
    "https://gnews.io".to_string()
}
fn default_gnews_language() -> String {
    "en".to_string()
}
fn default_max_pages() -> usize {
    10
}
fn default_gnews_key_env() -> String {
    "G_NEWS_TOKEN".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AcledConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_acled_url")]
    pub base_url: String,
    #[serde(default = "default_acled_client_id")]
    pub client_id: String,
    #[serde(default = "default_acled_username_env")]
    pub username_env: String,
    #[serde(default = "default_acled_password_env")]
    pub password_env: String,
    /// Keep only events with at least one recorded fatality.
    #[serde(default = "default_true")]
    pub fatal_only: bool,
}

impl Default for AcledConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_acled_url(),
            client_id: default_acled_client_id(),
            username_env: default_acled_username_env(),
            password_env: default_acled_password_env(),
            fatal_only: true,
        }
    }
}

fn default_acled_url() -> String {
    "https://acleddata.com".to_string()
}
fn default_acled_client_id() -> String {
    "acled".to_string()
}
fn default_acled_username_env() -> String {
    "ACLED_USERNAME".to_string()
}
fn default_acled_password_env() -> String {
    "ACLED_PASSWORD".to_string()
}

// ============ Chunking / retrieval ============

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    1000
}
fn default_overlap_chars() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Passages handed to the model.
    #[serde(default = "default_k")]
    pub k: usize,
    /// Similarity candidates considered by the diversity pass.
    #[serde(default = "default_fetch_k")]
    pub fetch_k: usize,
    /// `1.0` = pure relevance, `0.0` = pure diversity.
    #[serde(default = "default_lambda_mult")]
    pub lambda_mult: f32,
    /// Retrieval query; `{country}` is replaced with the country name.
    #[serde(default = "default_query")]
    pub query: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            fetch_k: default_fetch_k(),
            lambda_mult: default_lambda_mult(),
            query: default_query(),
        }
    }
}

fn default_k() -> usize {
    25
}
fn default_fetch_k() -> usize {
    60
}
fn default_lambda_mult() -> f32 {
    0.7
}
fn default_query() -> String {
    "Gather comprehensive humanitarian, socioeconomic, and situational information for \
     {country} from datasets and reports published by the World Bank, ReliefWeb, ACLED, \
     and Google News."
        .to_string()
}

impl RetrievalConfig {
    pub fn query_for(&self, country: &str) -> String {
        self.query.replace("{country}", country)
    }
}

// ============ Embedding ============

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
    /// Base URL for the `ollama` provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_embedding_retries(),
            timeout_secs: default_embedding_timeout(),
            url: None,
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_retries() -> u32 {
    5
}
fn default_embedding_timeout() -> u64 {
    30
}

// ============ Generation ============

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// Base URL; defaults per provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f32,
    /// Language the report must be written in.
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_generation_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            url: None,
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            repetition_penalty: default_repetition_penalty(),
            language: default_language(),
            max_retries: default_generation_retries(),
            timeout_secs: default_generation_timeout(),
            api_key_env: default_llm_key_env(),
        }
    }
}

fn default_generation_provider() -> String {
    "ollama".to_string()
}
fn default_generation_model() -> String {
    "llama3.2:3b".to_string()
}
fn default_max_tokens() -> usize {
    1500
}
fn default_repetition_penalty() -> f32 {
    1.15
}
fn default_language() -> String {
    "English".to_string()
}
fn default_generation_retries() -> u32 {
    2
}
fn default_generation_timeout() -> u64 {
    300
}
fn default_llm_key_env() -> String {
    "LLM_API_KEY".to_string()
}

// ============ Server ============

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Caller-side bound on one `POST /api/reports` call.
    #[serde(default = "default_report_timeout")]
    pub report_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            report_timeout_secs: default_report_timeout(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_report_timeout() -> u64 {
    600
}

// ============ Loading ============

/// Read a secret from the environment (or `.env`), treating blank values as unset.
pub fn secret(var: &str) -> Option<String> {
    dotenv::var(var).ok().filter(|v| !v.trim().is_empty())
}

/// Smallest usable `chunking.max_chars`: the longest UTF-8 character.
pub const MIN_CHUNK_CHARS: usize = 4;

impl Config {
    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_chars < MIN_CHUNK_CHARS {
            bail!("chunking.max_chars must be >= {}", MIN_CHUNK_CHARS);
        }
        if self.chunking.overlap_chars >= self.chunking.max_chars {
            bail!("chunking.overlap_chars must be smaller than chunking.max_chars");
        }

        if self.retrieval.k < 1 {
            bail!("retrieval.k must be >= 1");
        }
        if self.retrieval.fetch_k < self.retrieval.k {
            bail!("retrieval.fetch_k must be >= retrieval.k");
        }
        if !(0.0..=1.0).contains(&self.retrieval.lambda_mult) {
            bail!("retrieval.lambda_mult must be in [0.0, 1.0]");
        }

        if self.embedding.dims == Some(0) {
            bail!("embedding.dims must be > 0");
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }
        match self.embedding.provider.as_str() {
            "hash" | "local" => {}
            "openai" | "ollama" => {
                if self.embedding.model.is_none() {
                    bail!(
                        "embedding.model must be specified when provider is '{}'",
                        self.embedding.provider
                    );
                }
                if self.embedding.dims.is_none() {
                    bail!(
                        "embedding.dims must be specified when provider is '{}'",
                        self.embedding.provider
                    );
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be hash, openai, ollama, or local.",
                other
            ),
        }

        match self.generation.provider.as_str() {
            "ollama" | "openai" | "disabled" => {}
            other => bail!(
                "Unknown generation provider: '{}'. Must be ollama, openai, or disabled.",
                other
            ),
        }
        if self.generation.max_tokens == 0 {
            bail!("generation.max_tokens must be > 0");
        }

        if self.sources.reliefweb.limit == 0 {
            bail!("sources.reliefweb.limit must be >= 1");
        }
        if self.sources.gnews.page_size == 0 {
            bail!("sources.gnews.page_size must be >= 1");
        }
        if self.sources.timeout_secs == 0 {
            bail!("sources.timeout_secs must be > 0");
        }

        Ok(())
    }
}

/// Parse and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

//! Configuration management for PolicyQA.
//!
//! Configuration is layered, later layers winning:
//! - Built-in defaults
//! - Config file (`.policyqa/config.yaml` or an explicit path)
//! - Environment variables (`POLICYQA_*`)
//! - Command-line flags (see [`CliOverrides`])
//!
//! All on-disk state (config, prompt overrides, the vector index) lives in the
//! workspace's `.policyqa/` directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

const KNOWN_PROVIDERS: [&str; 3] = ["ollama", "openai", "groq"];
const KNOWN_EMBEDDING_PROVIDERS: [&str; 2] = ["trigram", "ollama"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .policyqa/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Completion model settings
    pub llm: LlmSettings,

    /// Explicit API key, takes precedence over `llm.api_key_env`
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub answers: AnswerSettings,
    pub pipeline: PipelineSettings,
    pub server: ServerSettings,
    pub index: IndexSettings,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Completion provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LlmSettings {
    /// One of `ollama`, `openai`, `groq`
    pub provider: String,
    pub model: String,
    /// Base URL; provider default when absent
    pub endpoint: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    pub temperature: f32,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            endpoint: None,
            api_key_env: None,
            temperature: 0.1,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// One of `trigram`, `ollama`
    pub provider: String,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub dimensions: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: None,
            endpoint: None,
            dimensions: 384,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChunkingSettings {
    /// Maximum characters per chunk
    pub max_size: usize,
    /// Characters shared between consecutive chunks
    pub overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            max_size: 1100,
            overlap: 150,
        }
    }
}

/// How hits from several descriptors are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// Every descriptor shares one pooled, deduplicated, capped document list
    #[default]
    SharedPool,
    /// Each descriptor keeps its own deduplicated hits
    PerQuery,
}

impl RetrievalMode {
    pub fn parse(s: &str) -> AppResult<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "shared_pool" | "shared" => Ok(Self::SharedPool),
            "per_query" => Ok(Self::PerQuery),
            other => Err(AppError::Config(format!(
                "Unknown retrieval mode: {}. Supported: shared_pool, per_query",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SharedPool => "shared_pool",
            Self::PerQuery => "per_query",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrievalSettings {
    /// Hits requested from the index per descriptor
    pub top_k: usize,
    /// Cap on deduplicated documents per result
    pub pool_size: usize,
    pub mode: RetrievalMode,
    /// Documents included in a synthesis prompt
    pub max_context_docs: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 3,
            pool_size: 3,
            mode: RetrievalMode::SharedPool,
            max_context_docs: 5,
        }
    }
}

/// Shape of the synthesized answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStyle {
    /// JSON record with answer, supporting clauses and explanation
    #[default]
    Structured,
    /// One plain sentence
    Sentence,
}

impl AnswerStyle {
    pub fn parse(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "structured" | "json" => Ok(Self::Structured),
            "sentence" | "text" => Ok(Self::Sentence),
            other => Err(AppError::Config(format!(
                "Unknown answer style: {}. Supported: structured, sentence",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::Sentence => "sentence",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnswerSettings {
    pub style: AnswerStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineSettings {
    /// Concurrent synthesis calls per request
    pub max_concurrency: usize,
    /// Timeout for fetching remote documents, in seconds
    pub fetch_timeout_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            fetch_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerSettings {
    pub bind: String,
    /// Environment variable holding the bearer secret
    pub api_token_env: String,
    /// Bearer secret set directly (CLI flag); wins over `api_token_env`
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            api_token_env: "POLICYQA_API_TOKEN".to_string(),
            api_token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IndexSettings {
    /// File stem of the index under `.policyqa/index/`
    pub name: String,
    /// Explicit index file, overrides the workspace location
    pub path: Option<PathBuf>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            path: None,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmSettings>,
    embedding: Option<EmbeddingSettings>,
    chunking: Option<ChunkingSettings>,
    retrieval: Option<RetrievalSettings>,
    answers: Option<AnswerSettings>,
    pipeline: Option<PipelineSettings>,
    server: Option<ServerSettings>,
    index: Option<IndexSettings>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

/// Command-line flags that take precedence over every other layer.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub log_level: Option<String>,
    pub verbose: bool,
    pub no_color: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            llm: LlmSettings::default(),
            api_key: None,
            embedding: EmbeddingSettings::default(),
            chunking: ChunkingSettings::default(),
            retrieval: RetrievalSettings::default(),
            answers: AnswerSettings::default(),
            pipeline: PipelineSettings::default(),
            server: ServerSettings::default(),
            index: IndexSettings::default(),
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and the environment.
    ///
    /// `workspace` and `config_file` come from the command line (which already
    /// falls back to `POLICYQA_WORKSPACE` / `POLICYQA_CONFIG`).
    ///
    /// Environment variables:
    /// - `POLICYQA_PROVIDER`: completion provider
    /// - `POLICYQA_MODEL`: model identifier
    /// - `POLICYQA_ENDPOINT`: provider base URL
    /// - `POLICYQA_API_KEY`: API key
    /// - `RUST_LOG`: log level
    /// - `NO_COLOR`: disable colored output
    pub fn load(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }
        config.config_file = config_file;

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.policyqa_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("POLICYQA_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(model) = std::env::var("POLICYQA_MODEL") {
            config.llm.model = model;
        }
        if let Ok(endpoint) = std::env::var("POLICYQA_ENDPOINT") {
            config.llm.endpoint = Some(endpoint);
        }

        config.api_key = std::env::var("POLICYQA_API_KEY").ok();

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    ///
    /// A section present in the file replaces the whole section; keys missing
    /// from it take their defaults.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = if contents.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml::from_str(&contents).map_err(|e| {
                AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        };

        let mut result = self.clone();

        if let Some(llm) = config_file.llm {
            result.llm = llm;
        }
        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }
        if let Some(chunking) = config_file.chunking {
            result.chunking = chunking;
        }
        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(answers) = config_file.answers {
            result.answers = answers;
        }
        if let Some(pipeline) = config_file.pipeline {
            result.pipeline = pipeline;
        }
        if let Some(server) = config_file.server {
            result.server = server;
        }
        if let Some(index) = config_file.index {
            result.index = index;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    pub fn with_overrides(mut self, overrides: CliOverrides) -> Self {
        if let Some(provider) = overrides.provider {
            self.llm.provider = provider;
        }

        if let Some(model) = overrides.model {
            self.llm.model = model;
        }

        if let Some(endpoint) = overrides.endpoint {
            self.llm.endpoint = Some(endpoint);
        }

        if let Some(log_level) = overrides.log_level {
            self.log_level = Some(log_level);
        }

        if overrides.verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if overrides.no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .policyqa directory.
    pub fn policyqa_dir(&self) -> PathBuf {
        self.workspace.join(".policyqa")
    }

    /// Ensure the .policyqa directory exists.
    pub fn ensure_policyqa_dir(&self) -> AppResult<()> {
        let dir = self.policyqa_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .policyqa directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Location of the persisted vector index.
    pub fn index_path(&self) -> PathBuf {
        match self.index.path {
            Some(ref path) => path.clone(),
            None => self
                .policyqa_dir()
                .join("index")
                .join(format!("{}.sqlite", self.index.name)),
        }
    }

    /// Resolve the completion API key.
    ///
    /// Order: explicit key, the configured env var, then the provider's
    /// conventional variable (`OPENAI_API_KEY`, `GROQ_API_KEY`).
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        let env_var = self
            .llm
            .api_key_env
            .clone()
            .or_else(|| default_api_key_env(&self.llm.provider).map(str::to_string))?;

        std::env::var(env_var).ok().filter(|k| !k.is_empty())
    }

    /// Resolve the bearer secret the HTTP service accepts.
    pub fn resolve_api_token(&self) -> Option<String> {
        if let Some(ref token) = self.server.api_token {
            return Some(token.clone());
        }
        std::env::var(&self.server.api_token_env)
            .ok()
            .filter(|t| !t.is_empty())
    }

    /// Validate configuration before any work starts.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.llm.provider.as_str();
        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        let embedding = self.embedding.provider.as_str();
        if !KNOWN_EMBEDDING_PROVIDERS.contains(&embedding) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                embedding,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than 0".to_string(),
            ));
        }

        if self.chunking.max_size == 0 {
            return Err(AppError::Config(
                "Chunk max size must be greater than 0".to_string(),
            ));
        }

        if self.chunking.overlap >= self.chunking.max_size {
            return Err(AppError::Config(format!(
                "Chunk overlap ({}) must be smaller than chunk max size ({})",
                self.chunking.overlap, self.chunking.max_size
            )));
        }

        if self.retrieval.top_k == 0 || self.retrieval.pool_size == 0 {
            return Err(AppError::Config(
                "Retrieval topK and poolSize must be at least 1".to_string(),
            ));
        }

        if self.pipeline.max_concurrency == 0 {
            return Err(AppError::Config(
                "Pipeline maxConcurrency must be at least 1".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(AppError::Config(format!(
                "Temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        Ok(())
    }
}

fn default_api_key_env(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("OPENAI_API_KEY"),
        "groq" => Some("GROQ_API_KEY"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.chunking.max_size, 1100);
        assert_eq!(config.chunking.overlap, 150);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.pool_size, 3);
        assert_eq!(config.retrieval.mode, RetrievalMode::SharedPool);
        assert_eq!(config.answers.style, AnswerStyle::Structured);
        assert!(!config.verbose);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_index_path() {
        let config = AppConfig::default();
        let path = config.index_path();
        assert!(path.ends_with(".policyqa/index/default.sqlite"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default().with_overrides(CliOverrides {
            provider: Some("groq".to_string()),
            model: Some("llama3-70b-8192".to_string()),
            verbose: true,
            ..Default::default()
        });

        assert_eq!(config.llm.provider, "groq");
        assert_eq!(config.llm.model, "llama3-70b-8192");
        assert!(config.verbose);
        assert_eq!(config.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml_sections() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
llm:
  provider: groq
  model: llama3-70b-8192
  temperature: 0.2
chunking:
  maxSize: 800
  overlap: 100
retrieval:
  mode: per_query
answers:
  style: sentence
logging:
  level: warn
  color: false
"#,
        )
        .unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.llm.provider, "groq");
        assert_eq!(merged.llm.model, "llama3-70b-8192");
        assert_eq!(merged.chunking.max_size, 800);
        assert_eq!(merged.chunking.overlap, 100);
        assert_eq!(merged.retrieval.mode, RetrievalMode::PerQuery);
        // Missing keys in a present section fall back to defaults
        assert_eq!(merged.retrieval.top_k, 3);
        assert_eq!(merged.answers.style, AnswerStyle::Sentence);
        assert_eq!(merged.log_level.as_deref(), Some("warn"));
        assert!(merged.no_color);
        // Absent sections are untouched
        assert_eq!(merged.embedding, EmbeddingSettings::default());
    }

    #[test]
    fn test_merge_yaml_invalid() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "chunking: [not, a, map]").unwrap();
        assert!(AppConfig::default().merge_yaml(&path).is_err());
    }

    #[test]
    fn test_load_missing_explicit_config_file() {
        let temp = TempDir::new().unwrap();
        let result = AppConfig::load(
            Some(temp.path().to_path_buf()),
            Some(temp.path().join("nope.yaml")),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.llm.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_overlap_too_large() {
        let mut config = AppConfig::default();
        config.chunking.overlap = config.chunking.max_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_api_key_prefers_explicit() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-explicit".to_string());
        assert_eq!(config.resolve_api_key().as_deref(), Some("sk-explicit"));
    }

    #[test]
    fn test_resolve_api_token_prefers_explicit() {
        let mut config = AppConfig::default();
        config.server.api_token = Some("secret".to_string());
        assert_eq!(config.resolve_api_token().as_deref(), Some("secret"));
    }

    #[test]
    fn test_mode_and_style_parsing() {
        assert_eq!(
            RetrievalMode::parse("per-query").unwrap(),
            RetrievalMode::PerQuery
        );
        assert!(RetrievalMode::parse("best").is_err());
        assert_eq!(AnswerStyle::parse("sentence").unwrap(), AnswerStyle::Sentence);
        assert!(AnswerStyle::parse("poem").is_err());
    }
}

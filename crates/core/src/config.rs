//! Configuration management for the Teller support agent.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - A YAML config file (`teller.yaml` in the base directory)
//! - Environment variables, including those from a `.env` file
//! - Command-line flags
//!
//! Missing credentials are not fatal. [`AppConfig::validate`] reports which
//! feature groups are usable so the UI can show them as unavailable.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Default LangSmith project name.
pub const DEFAULT_TRACING_PROJECT: &str = "bank_service_agent";

/// Default LangSmith API endpoint.
pub const DEFAULT_TRACING_ENDPOINT: &str = "https://api.smith.langchain.com";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root directory holding `data/`, `logs/` and `prompts/`
    pub base_dir: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Chat model settings
    pub llm: LlmSettings,

    /// Knowledge base settings
    pub knowledge: KnowledgeSettings,

    /// Web search settings
    pub search: SearchSettings,

    /// Outbound HTTP proxy for web search
    pub proxy: ProxyConfig,

    /// Run tracing (LangSmith) settings
    pub tracing: TracingSettings,

    /// Web server settings
    pub server: ServerSettings,

    /// Secrets used by the web UI
    pub security: SecuritySettings,

    /// Logging settings
    pub logging: LoggingSettings,

    /// Lifetime of cached search results, in seconds
    pub cache_ttl_secs: u64,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Chat model provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LlmSettings {
    /// Provider identifier ("deepseek", "openai", "ollama")
    pub provider: String,

    /// Custom API base URL
    pub endpoint: Option<String>,

    /// Model identifier
    pub model: String,

    /// Environment variable holding the API key, derived from the provider
    /// when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Resolved API key (never written back to disk)
    #[serde(skip)]
    pub api_key: Option<String>,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens per completion
    pub max_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "deepseek".to_string(),
            endpoint: None,
            model: "deepseek-chat".to_string(),
            api_key_env: None,
            api_key: None,
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

impl LlmSettings {
    /// Environment variable the API key is read from.
    ///
    /// `None` for providers that take no key, such as a local Ollama.
    pub fn key_env(&self) -> Option<&str> {
        if let Some(env) = self.api_key_env.as_deref() {
            return Some(env);
        }
        match self.provider.trim().to_lowercase().as_str() {
            "deepseek" => Some("DEEPSEEK_API_KEY"),
            "openai" | "openai-compatible" => Some("OPENAI_API_KEY"),
            _ => None,
        }
    }

    /// Read the API key for the current provider through `lookup`.
    ///
    /// Empty values count as unset.
    pub fn resolve_api_key<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.api_key = self
            .key_env()
            .and_then(lookup)
            .filter(|v| !v.trim().is_empty());
    }
}

/// Knowledge base settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KnowledgeSettings {
    /// Chunk size in characters
    pub chunk_size: usize,

    /// Overlap between consecutive chunks, in characters
    pub chunk_overlap: usize,

    /// Number of chunks retrieved per question
    pub top_k: usize,

    /// Chunks scoring below this cosine similarity are ignored
    pub min_score: f32,

    /// Embedding provider settings
    pub embedding: EmbeddingSettings,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 4,
            min_score: 0.1,
            embedding: EmbeddingSettings::default(),
        }
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// Provider name: "hashed" (offline) or "openai" (any compatible endpoint)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Vector dimensions
    pub dimensions: usize,

    /// API base URL for remote providers
    pub endpoint: Option<String>,

    /// Environment variable holding the embedding API key
    pub api_key_env: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "hashed".to_string(),
            model: "hashed-v1".to_string(),
            dimensions: 384,
            endpoint: None,
            api_key_env: None,
        }
    }
}

/// Google Custom Search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchSettings {
    /// Google API key
    #[serde(skip)]
    pub google_api_key: Option<String>,

    /// Custom Search Engine id
    #[serde(skip)]
    pub google_cse_id: Option<String>,

    /// Search API endpoint
    pub endpoint: String,

    /// Results requested per search
    pub num_results: u32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            google_api_key: None,
            google_cse_id: None,
            endpoint: "https://www.googleapis.com/customsearch/v1".to_string(),
            num_results: 5,
            timeout_secs: 30,
        }
    }
}

impl SearchSettings {
    /// Both the API key and engine id are present.
    pub fn is_configured(&self) -> bool {
        self.google_api_key.is_some() && self.google_cse_id.is_some()
    }
}

/// HTTP proxy settings.
///
/// The port is kept as text so a malformed value can be reported instead of
/// aborting startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub host: Option<String>,
    pub port: Option<String>,
}

impl ProxyConfig {
    /// Parse and range-check the configured port.
    pub fn parsed_port(&self) -> Result<u16, String> {
        let raw = self
            .port
            .as_deref()
            .ok_or_else(|| "proxy port not set".to_string())?;

        let port: i64 = raw
            .trim()
            .parse()
            .map_err(|_| format!("invalid proxy port format: {}", raw))?;

        if port <= 0 || port > 65535 {
            return Err(format!(
                "invalid proxy port: {}, expected a value in 1-65535",
                raw
            ));
        }

        Ok(port as u16)
    }

    /// Proxy URL, when both host and a valid port are configured.
    pub fn url(&self) -> Option<String> {
        let host = self.host.as_deref()?;
        let port = self.parsed_port().ok()?;
        Some(format!("http://{}:{}", host, port))
    }
}

/// LangSmith run tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingSettings {
    #[serde(skip)]
    pub api_key: Option<String>,
    pub project: String,
    pub endpoint: String,
}

impl Default for TracingSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            project: DEFAULT_TRACING_PROJECT.to_string(),
            endpoint: DEFAULT_TRACING_ENDPOINT.to_string(),
        }
    }
}

/// Web server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
        }
    }
}

/// Secrets used by the web UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SecuritySettings {
    /// Key for signing session tokens
    #[serde(skip)]
    pub secret_key: Option<String>,

    /// Signature algorithm name (only HS256 is supported)
    pub jwt_algorithm: String,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            secret_key: None,
            jwt_algorithm: "HS256".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggingSettings {
    /// Log level or filter directive
    pub level: Option<String>,

    /// Log file, relative paths resolve against the base directory
    pub file: Option<PathBuf>,

    /// Number of rotated log files kept
    pub max_files: usize,

    /// Colored stderr output
    pub color: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: None,
            file: Some(PathBuf::from("logs/app.log")),
            max_files: 10,
            color: true,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    llm: Option<LlmSettings>,
    knowledge: Option<KnowledgeSettings>,
    search: Option<SearchSettings>,
    proxy: Option<ProxyConfig>,
    tracing: Option<TracingSettings>,
    server: Option<ServerSettings>,
    security: Option<SecuritySettings>,
    logging: Option<LoggingSettings>,
    #[serde(rename = "cacheTtl")]
    cache_ttl: Option<u64>,
}

/// Result of [`AppConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigStatus {
    /// Model key, tracing key and secret key are all present
    pub base_config: bool,

    /// Google API key and engine id are both present
    pub google_api: bool,

    /// Proxy host and port are both present
    pub proxy: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            llm: LlmSettings::default(),
            knowledge: KnowledgeSettings::default(),
            search: SearchSettings::default(),
            proxy: ProxyConfig::default(),
            tracing: TracingSettings::default(),
            server: ServerSettings::default(),
            security: SecuritySettings::default(),
            logging: LoggingSettings::default(),
            cache_ttl_secs: 3600,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and the environment.
    ///
    /// A `.env` file in the current directory is loaded first, without
    /// overriding variables that are already set.
    ///
    /// Environment variables:
    /// - `TELLER_HOME`: Override the base directory
    /// - `TELLER_CONFIG`: Path to config file
    /// - `TELLER_PROVIDER`, `TELLER_MODEL`: Chat model selection
    /// - `TELLER_HOST`, `TELLER_PORT`: Web server address
    /// - `DEEPSEEK_API_KEY`, `LANGCHAIN_*`, `GOOGLE_*`, `PROXY_*`,
    ///   `SECRET_KEY`, `JWT_ALGORITHM`, `LOG_LEVEL`, `LOG_FILE`, `CACHE_TTL`
    ///
    /// # Example
    /// ```no_run
    /// use teller_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Base directory: {:?}", config.base_dir);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Like [`AppConfig::load`], with the base directory and config file
    /// given explicitly (e.g. from CLI flags) taking precedence.
    pub fn load_with(home: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        if let Some(home) = home.or_else(|| std::env::var("TELLER_HOME").ok().map(PathBuf::from)) {
            config.base_dir = home;
        }

        if let Some(file) =
            config_file.or_else(|| std::env::var("TELLER_CONFIG").ok().map(PathBuf::from))
        {
            config.config_file = Some(file);
        }

        config.load_file()?;
        config.apply_env(|key| std::env::var(key).ok())?;

        Ok(config)
    }

    /// Merge the YAML config file, if one exists.
    fn load_file(&mut self) -> AppResult<()> {
        let config_path = self
            .config_file
            .clone()
            .unwrap_or_else(|| self.base_dir.join("teller.yaml"));

        if config_path.exists() {
            self.merge_yaml(&config_path)?;
        } else if self.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file does not exist: {:?}",
                config_path
            )));
        }

        Ok(())
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &Path) -> AppResult<()> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&mut self, contents: &str) -> Result<(), serde_yaml::Error> {
        let file: ConfigFile = serde_yaml::from_str(contents)?;

        if let Some(llm) = file.llm {
            self.llm = llm;
        }
        if let Some(knowledge) = file.knowledge {
            self.knowledge = knowledge;
        }
        if let Some(search) = file.search {
            self.search = search;
        }
        if let Some(proxy) = file.proxy {
            self.proxy = proxy;
        }
        if let Some(tracing) = file.tracing {
            self.tracing = tracing;
        }
        if let Some(server) = file.server {
            self.server = server;
        }
        if let Some(security) = file.security {
            self.security = security;
        }
        if let Some(logging) = file.logging {
            self.no_color = !logging.color;
            self.logging = logging;
        }
        if let Some(ttl) = file.cache_ttl {
            self.cache_ttl_secs = ttl;
        }

        Ok(())
    }

    /// Apply environment variables through `lookup`.
    ///
    /// Empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = get("TELLER_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Some(model) = get("TELLER_MODEL") {
            self.llm.model = model;
        }
        self.llm.resolve_api_key(&get);

        self.tracing.api_key = get("LANGCHAIN_API_KEY");
        if let Some(project) = get("LANGCHAIN_PROJECT") {
            self.tracing.project = project;
        }
        if let Some(endpoint) = get("LANGCHAIN_ENDPOINT") {
            self.tracing.endpoint = endpoint;
        }

        self.search.google_api_key = get("GOOGLE_API_KEY");
        self.search.google_cse_id = get("GOOGLE_CSE_ID");

        if let Some(host) = get("PROXY_HOST") {
            self.proxy.host = Some(host);
        }
        if let Some(port) = get("PROXY_PORT") {
            self.proxy.port = Some(port);
        }

        self.security.secret_key = get("SECRET_KEY");
        if let Some(algorithm) = get("JWT_ALGORITHM") {
            self.security.jwt_algorithm = algorithm;
        }

        if let Some(level) = get("LOG_LEVEL") {
            self.logging.level = Some(level.to_lowercase());
        }
        if let Some(file) = get("LOG_FILE") {
            self.logging.file = Some(PathBuf::from(file));
        }

        if let Some(ttl) = get("CACHE_TTL") {
            self.cache_ttl_secs = ttl.trim().parse().map_err(|_| {
                AppError::Config(format!("CACHE_TTL must be a number of seconds: {}", ttl))
            })?;
        }

        if let Some(host) = get("TELLER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("TELLER_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| AppError::Config(format!("TELLER_PORT is not a valid port: {}", port)))?;
        }

        if get("NO_COLOR").is_some() {
            self.no_color = true;
        }

        Ok(())
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over the environment and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        base_dir: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(base_dir) = base_dir {
            self.base_dir = base_dir;
        }

        if let Some(provider) = provider {
            if provider != self.llm.provider {
                // The key belongs to the previous provider
                self.llm.api_key = None;
            }
            self.llm.provider = provider;
        }

        if let Some(model) = model {
            self.llm.model = model;
        }

        if let Some(log_level) = log_level {
            self.logging.level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.logging.level.is_none() {
                self.logging.level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Directory holding knowledge base documents and the index.
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Directory holding log files.
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Directory holding prompt overrides.
    pub fn prompts_dir(&self) -> PathBuf {
        self.base_dir.join("prompts")
    }

    /// SQLite index location.
    pub fn index_path(&self) -> PathBuf {
        self.data_dir().join("index.sqlite")
    }

    /// Absolute log file location, if file logging is enabled.
    pub fn log_file_path(&self) -> Option<PathBuf> {
        self.logging.file.as_ref().map(|file| {
            if file.is_absolute() {
                file.clone()
            } else {
                self.base_dir.join(file)
            }
        })
    }

    /// Create the data and logs directories.
    pub fn ensure_dirs(&self) -> AppResult<()> {
        for dir in [self.data_dir(), self.logs_dir()] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir).map_err(|e| {
                    AppError::Config(format!("Failed to create directory {:?}: {}", dir, e))
                })?;
            }
        }
        Ok(())
    }

    /// Names of missing variables per group.
    ///
    /// The model key is only listed for providers that take one.
    pub fn missing_vars(&self) -> HashMap<&'static str, Vec<String>> {
        let mut missing = HashMap::new();

        let mut base: Vec<String> = Vec::new();
        if let Some(env) = self.llm.key_env() {
            if self.llm.api_key.is_none() {
                base.push(env.to_string());
            }
        }
        base.extend(
            [
                ("LANGCHAIN_API_KEY", self.tracing.api_key.is_some()),
                ("SECRET_KEY", self.security.secret_key.is_some()),
            ]
            .into_iter()
            .filter(|(_, present)| !present)
            .map(|(name, _)| name.to_string()),
        );
        missing.insert("base", base);

        let google: Vec<String> = [
            ("GOOGLE_API_KEY", self.search.google_api_key.is_some()),
            ("GOOGLE_CSE_ID", self.search.google_cse_id.is_some()),
        ]
        .into_iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| name.to_string())
        .collect();
        missing.insert("google", google);

        let proxy: Vec<String> = [
            ("PROXY_HOST", self.proxy.host.is_some()),
            ("PROXY_PORT", self.proxy.port.is_some()),
        ]
        .into_iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| name.to_string())
        .collect();
        missing.insert("proxy", proxy);

        missing
    }

    /// Check which feature groups are configured.
    ///
    /// Never fails: every problem is logged as a warning and reflected in the
    /// returned status.
    pub fn validate(&self) -> ConfigStatus {
        let missing = self.missing_vars();
        let none = Vec::new();
        let base = missing.get("base").unwrap_or(&none);
        let google = missing.get("google").unwrap_or(&none);
        let proxy = missing.get("proxy").unwrap_or(&none);

        if !base.is_empty() {
            tracing::warn!("Missing base configuration: {}", base.join(", "));
        }

        if !google.is_empty() {
            tracing::warn!("Google API configuration incomplete: {}", google.join(", "));
        }

        if !proxy.is_empty() {
            tracing::warn!("Proxy configuration incomplete: {}", proxy.join(", "));
        } else if let Err(e) = self.proxy.parsed_port() {
            tracing::warn!("{}", e);
        }

        if !self.security.jwt_algorithm.eq_ignore_ascii_case("HS256") {
            tracing::warn!(
                "Unsupported JWT_ALGORITHM '{}', session tokens use HS256",
                self.security.jwt_algorithm
            );
        }

        let status = ConfigStatus {
            base_config: base.is_empty(),
            google_api: google.is_empty(),
            proxy: proxy.is_empty(),
        };

        let mark = |ok: bool| if ok { "ok" } else { "missing" };
        tracing::info!("Configuration status:");
        tracing::info!("  base config: {}", mark(status.base_config));
        tracing::info!("  google api:  {}", mark(status.google_api));
        tracing::info!("  proxy:       {}", mark(status.proxy));

        status
    }
}

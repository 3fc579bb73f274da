use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "archfind.toml";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub openai: OpenAiConfig,
    pub embed: EmbedConfig,
    pub cache: CacheConfig,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the record store (the `select-all-system` / `register-system` endpoints)
    pub url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    /// Bound on every provider call; expiry surfaces as a provider error
    pub timeout_secs: u64,
    /// Only ever read from the environment or a local file, never written back
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    pub model: String,
    pub dimensions: usize,
    /// Max concurrent embedding lookups while ranking (0 = half available cores)
    pub max_concurrent: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 30,
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            timeout_secs: 30,
            api_key: None,
        }
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".into(),
            dimensions: 1536,
            max_concurrent: 4,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("embeddings_cache"),
            enabled: true,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4-turbo-preview".into(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            dir: PathBuf::from("logs"),
        }
    }
}

impl Config {
    /// Load config from `path` (or `archfind.toml` in the working directory),
    /// falling back to defaults, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut config = if config_path.exists() {
            Self::from_file(config_path)?
        } else if path.is_some() {
            bail!("config file {} does not exist", config_path.display());
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(config_path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("reading config from {}", config_path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("parsing config from {}", config_path.display()))
    }

    /// Overlay environment variables. `lookup` is injected so tests don't
    /// have to mutate the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("RECORD_STORE_URL") {
            self.store.url = Some(url);
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.openai.api_key = Some(key);
        }
        if let Some(dir) = lookup("EMBEDDING_CACHE_DIR") {
            self.cache.dir = PathBuf::from(dir);
        }
        if let Some(flag) = lookup("USE_EMBEDDING_CACHE") {
            self.cache.enabled = parse_bool(&flag)
                .with_context(|| format!("USE_EMBEDDING_CACHE has invalid value {flag:?}"))?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        if let Some(dir) = lookup("LOG_DIR") {
            self.logging.dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn api_key(&self) -> Result<&str> {
        match self.openai.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => bail!("no OpenAI API key configured (set OPENAI_API_KEY)"),
        }
    }

    pub fn store_url(&self) -> Result<&str> {
        match self.store.url.as_deref() {
            Some(url) if !url.trim().is_empty() => Ok(url),
            _ => bail!("no record store URL configured (set RECORD_STORE_URL or store.url)"),
        }
    }

    /// Effective worker count, resolving 0 to a sensible default.
    pub fn effective_workers(&self) -> usize {
        if self.embed.max_concurrent == 0 {
            let num_cpus = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4);
            (num_cpus / 2).max(1)
        } else {
            self.embed.max_concurrent
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("expected a boolean"),
    }
}

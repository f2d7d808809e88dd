use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::provider::ProviderId;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_CACHE_TTL_MS: u64 = 3000;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 1500;
pub const DEFAULT_CITY: &str = "melbourne";

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

/// Top-level service configuration, read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,

    /// How long a cached result is served without contacting providers.
    pub cache_ttl_ms: u64,

    /// Timeout applied to every single provider attempt.
    pub http_timeout_ms: u64,

    /// City used when a request does not name one.
    pub default_city: String,

    /// Failover priority, first-listed is tried first. Empty means
    /// [`ProviderId::all`] order.
    pub provider_order: Vec<String>,

    /// Example TOML:
    /// [providers.openweather]
    /// api_key = "..."
    pub providers: HashMap<String, ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            http_timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
            default_city: DEFAULT_CITY.to_string(),
            provider_order: Vec::new(),
            providers: HashMap::new(),
        }
    }
}

impl Config {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    /// Providers in failover order. Unknown names in `provider_order` are an
    /// error; repeated names keep their first position only.
    pub fn provider_priority(&self) -> Result<Vec<ProviderId>> {
        if self.provider_order.is_empty() {
            return Ok(ProviderId::all().to_vec());
        }

        let mut order = Vec::with_capacity(self.provider_order.len());
        for name in &self.provider_order {
            let id = ProviderId::try_from(name.as_str())?;
            if order.contains(&id) {
                tracing::warn!(
                    provider = %id,
                    entry = %name,
                    "ignoring repeated provider_order entry"
                );
            } else {
                order.push(id);
            }
        }

        Ok(order)
    }

    /// Move `id` to the front of the failover order.
    pub fn prefer_provider(&mut self, id: ProviderId) {
        let mut order = self
            .provider_priority()
            .unwrap_or_else(|_| ProviderId::all().to_vec());
        order.retain(|existing| *existing != id);
        order.insert(0, id);
        self.provider_order = order.iter().map(|id| id.as_str().to_string()).collect();
    }

    /// Load config from the platform config file, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    /// Load config from `path` (defaults if missing), then apply environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut cfg = Self::read_from(path)?;
        cfg.apply_env_with(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// Read only the file at `path`, or return defaults if it doesn't exist yet.
    pub fn read_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Overlay values from the environment. `lookup` returns the raw value of a variable.
    ///
    /// Empty values are ignored; numbers that fail to parse keep the previous value.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(port) = parse_env(&get, "PORT") {
            self.port = port;
        }
        if let Some(ttl) = parse_env(&get, "CACHE_TTL_MS") {
            self.cache_ttl_ms = ttl;
        }
        if let Some(timeout) = parse_env(&get, "HTTP_TIMEOUT_MS") {
            self.http_timeout_ms = timeout;
        }
        if let Some(city) = get("DEFAULT_CITY") {
            self.default_city = city;
        }

        for id in ProviderId::all() {
            if let Some(api_key) = get(id.env_var()) {
                self.providers
                    .insert(id.as_str().to_string(), ProviderConfig { api_key });
            }
        }
    }

    /// Save config to the platform config file.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-service", "weather-server")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set/replace a provider API key, adding the provider to the failover
    /// order if it is not there yet.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers
            .insert(provider_id.as_str().to_string(), ProviderConfig { api_key });

        if !self.provider_order.is_empty()
            && !self
                .provider_order
                .iter()
                .any(|name| name.eq_ignore_ascii_case(provider_id.as_str()))
        {
            self.provider_order.push(provider_id.to_string());
        }
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers
            .get(provider_id.as_str())
            .map(|cfg| cfg.api_key.as_str())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some()
    }
}

fn parse_env<T, F>(get: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let value = get(key)?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(key, value = %value, "ignoring unparseable environment value");
            None
        }
    }
}

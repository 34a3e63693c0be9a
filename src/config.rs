//! TOML configuration loading and validation.
//!
//! Every section has sensible defaults, so a missing config file is valid:
//! the CLI falls back to [`Config::default`] and talks to the public
//! upstream APIs directly. Provider base URLs are configurable mainly so
//! deployments can sit behind their own mirrors and tests can redirect
//! upstreams.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Hosted persistence backend for scan history. Optional: without it,
    /// lookups still work and history writes are skipped.
    #[serde(default)]
    pub backend: Option<BackendConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:4000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProvidersConfig {
    #[serde(default = "default_food_facts_base")]
    pub food_facts_base: String,
    #[serde(default = "default_beauty_facts_base")]
    pub beauty_facts_base: String,
    #[serde(default = "default_drug_registry_base")]
    pub drug_registry_base: String,
    /// Per-request transport timeout. There is no shared budget across the
    /// fallback chain; each adapter call gets its own.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            food_facts_base: default_food_facts_base(),
            beauty_facts_base: default_beauty_facts_base(),
            drug_registry_base: default_drug_registry_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_food_facts_base() -> String {
    "https://world.openfoodfacts.org".to_string()
}
fn default_beauty_facts_base() -> String {
    "https://world.openbeautyfacts.org".to_string()
}
fn default_drug_registry_base() -> String {
    "https://api.fda.gov".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Directory for the CLI client's persistent cache. The server uses an
    /// in-memory cache and ignores this.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".scanlens/cache")
}

/// PostgREST-style hosted backend holding the `scans` table.
#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// API key sent as both `apikey` and bearer token.
    pub key: String,
}

/// Loads a config file, or returns defaults when the file does not exist.
///
/// A file that exists but fails to read or parse is still an error; only
/// absence is forgiven, so a typo'd config never silently degrades.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.server.bind.is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }
    if config.providers.timeout_secs == 0 {
        anyhow::bail!("providers.timeout_secs must be > 0");
    }
    for (name, base) in [
        ("providers.food_facts_base", &config.providers.food_facts_base),
        (
            "providers.beauty_facts_base",
            &config.providers.beauty_facts_base,
        ),
        (
            "providers.drug_registry_base",
            &config.providers.drug_registry_base,
        ),
    ] {
        if base.is_empty() {
            anyhow::bail!("{} must not be empty", name);
        }
    }
    if let Some(backend) = &config.backend {
        if backend.url.is_empty() || backend.key.is_empty() {
            anyhow::bail!("backend.url and backend.key must both be set");
        }
    }

    Ok(config)
}

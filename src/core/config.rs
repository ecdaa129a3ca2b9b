use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct HttpProviderConfig {
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SimulatedProviderConfig {
    pub name: String,
    #[serde(default)]
    pub latency_ms: u64,
    /// Maximum relative deviation applied to the base rate, e.g. `0.02`.
    #[serde(default)]
    pub variation: Decimal,
    /// Base rates keyed by `"SRC/TGT"`.
    #[serde(default)]
    pub rates: BTreeMap<String, Decimal>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    Json(HttpProviderConfig),
    Xml(HttpProviderConfig),
    Exchange(HttpProviderConfig),
    Simulated(SimulatedProviderConfig),
}

impl ProviderConfig {
    pub fn name(&self) -> &str {
        match self {
            ProviderConfig::Json(c) | ProviderConfig::Xml(c) | ProviderConfig::Exchange(c) => {
                &c.name
            }
            ProviderConfig::Simulated(c) => &c.name,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
    /// Registration order; earlier providers win ties.
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

fn default_provider_timeout_ms() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_MS
}

fn rate_table(entries: &[(&str, i64, u32)]) -> BTreeMap<String, Decimal> {
    entries
        .iter()
        .map(|(pair, mantissa, scale)| (pair.to_string(), Decimal::new(*mantissa, *scale)))
        .collect()
}

fn simulated(name: &str, latency_ms: u64, entries: &[(&str, i64, u32)]) -> ProviderConfig {
    ProviderConfig::Simulated(SimulatedProviderConfig {
        name: name.to_string(),
        latency_ms,
        variation: Decimal::new(2, 2),
        rates: rate_table(entries),
    })
}

/// Offline providers used when no configuration file exists.
fn default_providers() -> Vec<ProviderConfig> {
    vec![
        simulated(
            "MockJsonAPI",
            100,
            &[
                ("USD/EUR", 85, 2),
                ("EUR/USD", 118, 2),
                ("USD/GBP", 73, 2),
                ("GBP/USD", 137, 2),
                ("USD/JPY", 110, 0),
                ("JPY/USD", 9, 3),
            ],
        ),
        simulated(
            "MockXmlAPI",
            150,
            &[
                ("USD/EUR", 86, 2),
                ("EUR/USD", 116, 2),
                ("USD/GBP", 74, 2),
                ("GBP/USD", 135, 2),
                ("USD/JPY", 111, 0),
                ("JPY/USD", 9, 3),
            ],
        ),
        simulated(
            "MockJsonAPI2",
            120,
            &[
                ("USD/EUR", 84, 2),
                ("EUR/USD", 119, 2),
                ("USD/GBP", 72, 2),
                ("GBP/USD", 139, 2),
                ("USD/JPY", 109, 0),
                ("JPY/USD", 92, 4),
            ],
        ),
    ]
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            provider_timeout_ms: DEFAULT_PROVIDER_TIMEOUT_MS,
            providers: default_providers(),
        }
    }
}

impl AppConfig {
    /// Loads the default config file, falling back to built-in defaults when
    /// it does not exist yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using built-in providers",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "fxbest", "fxbest")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.provider_timeout_ms == 0 {
            bail!("provider_timeout_ms must be greater than zero");
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            let name = provider.name();
            if name.trim().is_empty() {
                bail!("Provider names must not be empty");
            }
            if !seen.insert(name) {
                bail!("Duplicate provider name: {name}");
            }
        }
        Ok(())
    }
}

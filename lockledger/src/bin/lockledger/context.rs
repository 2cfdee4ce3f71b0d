use anyhow::{Context, Result};
use lockledger::{RedisStore, Target, TargetConfig, store::DEFAULT_KEY_PREFIX};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Optional config file passed with `--config`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub target: TargetSettings,
    #[serde(default)]
    pub redis: RedisSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetSettings {
    pub collection: Option<String>,
    pub lock_timeout_secs: Option<u64>,
    pub operation_timeout_secs: Option<u64>,
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedisSettings {
    /// Either a URL or `${VAR}` naming an environment variable
    pub url: Option<String>,
    pub prefix: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Connection flags given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConnectionFlags {
    pub redis_url: Option<String>,
    pub prefix: Option<String>,
    pub collection: Option<String>,
    pub config: Option<PathBuf>,
}

/// Everything a command needs to reach the ledger. Flags win over the config file,
/// which wins over built-in defaults.
#[derive(Debug, Clone)]
pub struct OperatorContext {
    pub redis_url: String,
    pub prefix: String,
    pub target: TargetConfig,
}

impl OperatorContext {
    pub fn resolve(flags: ConnectionFlags) -> Result<Self> {
        let file = match &flags.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let redis_url = match flags.redis_url.or(file.redis.url) {
            Some(url) => expand_env(&url)?,
            None => anyhow::bail!(
                "No Redis URL configured. Pass --redis-url, set REDIS_URL or add `url` under [redis]."
            ),
        };
        let prefix = flags
            .prefix
            .or(file.redis.prefix)
            .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string());

        let mut target = TargetConfig::default();
        if let Some(collection) = flags.collection.or(file.target.collection) {
            target = target.with_collection(collection);
        }
        if let Some(secs) = file.target.lock_timeout_secs {
            target = target.with_lock_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = file.target.operation_timeout_secs {
            target = target.with_operation_timeout(Duration::from_secs(secs));
        }
        if let Some(ms) = file.target.poll_interval_ms {
            target = target.with_poll_interval(Duration::from_millis(ms));
        }
        target.validate()?;

        Ok(Self {
            redis_url,
            prefix,
            target,
        })
    }

    pub async fn connect(&self) -> Result<Target<RedisStore>> {
        let store = RedisStore::connect(&self.redis_url, self.prefix.clone())
            .await
            .context("Failed to connect to Redis")?;
        Ok(Target::new(store, self.target.clone())?)
    }
}

fn expand_env(value: &str) -> Result<String> {
    match value.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        Some(var_name) => {
            std::env::var(var_name).with_context(|| format!("Environment variable {var_name} not set"))
        }
        None => Ok(value.to_string()),
    }
}

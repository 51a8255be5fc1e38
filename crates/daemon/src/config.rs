//! Daemon configuration, read once from `QUILLFORGE_*` environment variables

use anyhow::{bail, Result};
use quillforge_api_rpc::{RateLimitConfig, DEFAULT_RPC_PORT};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "~/.quillforge/engine.db";
const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
const DEFAULT_DISPATCH_LIMIT: usize = 10;
const DEFAULT_ITEM_DELAY_MS: u64 = 1_000;
const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;
const DEFAULT_GENERATION_API_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_LOG_FORMAT: &str = "pretty";

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// SQLite file path, or `:memory:`
    pub db_path: String,
    pub rpc_port: u16,
    pub poll_interval: Duration,
    pub dispatch_limit: usize,
    pub item_delay: Duration,
    pub shutdown_grace: Duration,
    pub generation_api_url: String,
    pub generation_api_key: String,
    pub default_model: String,
    pub rate_limit: RateLimitConfig,
    pub log_format: String,
    pub log_dir: Option<PathBuf>,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparsable numbers fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parse_u64 = |key: &str, default: u64| {
            get(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(default)
        };

        let Some(generation_api_key) = get("QUILLFORGE_GENERATION_API_KEY") else {
            bail!("QUILLFORGE_GENERATION_API_KEY must be set");
        };

        let rate_limit_defaults = RateLimitConfig::default();

        Ok(Self {
            db_path: shellexpand::tilde(
                &get("QUILLFORGE_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            )
            .into_owned(),
            rpc_port: get("QUILLFORGE_RPC_PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_RPC_PORT),
            poll_interval: Duration::from_millis(
                parse_u64("QUILLFORGE_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS).max(1),
            ),
            dispatch_limit: parse_u64("QUILLFORGE_DISPATCH_LIMIT", DEFAULT_DISPATCH_LIMIT as u64)
                .max(1) as usize,
            item_delay: Duration::from_millis(parse_u64(
                "QUILLFORGE_ITEM_DELAY_MS",
                DEFAULT_ITEM_DELAY_MS,
            )),
            shutdown_grace: Duration::from_secs(parse_u64(
                "QUILLFORGE_SHUTDOWN_GRACE_SECS",
                DEFAULT_SHUTDOWN_GRACE_SECS,
            )),
            generation_api_url: get("QUILLFORGE_GENERATION_API_URL")
                .unwrap_or_else(|| DEFAULT_GENERATION_API_URL.to_string()),
            generation_api_key,
            default_model: get("QUILLFORGE_DEFAULT_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            rate_limit: RateLimitConfig {
                burst: parse_u64("QUILLFORGE_RATE_LIMIT_BURST", rate_limit_defaults.burst as u64)
                    .max(1) as u32,
                per_second: parse_u64(
                    "QUILLFORGE_RATE_LIMIT_RATE",
                    rate_limit_defaults.per_second as u64,
                ) as u32,
            },
            log_format: get("QUILLFORGE_LOG_FORMAT")
                .unwrap_or_else(|| DEFAULT_LOG_FORMAT.to_string()),
            log_dir: get("QUILLFORGE_LOG_DIR")
                .map(|dir| PathBuf::from(shellexpand::tilde(&dir).into_owned())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<DaemonConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DaemonConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("QUILLFORGE_GENERATION_API_KEY", "sk-test")]).unwrap();

        assert!(config.db_path.ends_with(".quillforge/engine.db"));
        assert!(!config.db_path.starts_with('~'));
        assert_eq!(config.rpc_port, 9530);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.dispatch_limit, 10);
        assert_eq!(config.item_delay, Duration::from_secs(1));
        assert_eq!(config.shutdown_grace, Duration::from_secs(30));
        assert_eq!(config.generation_api_url, "https://api.openai.com/v1");
        assert_eq!(config.default_model, "gpt-4o-mini");
        assert_eq!(config.log_format, "pretty");
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("QUILLFORGE_GENERATION_API_KEY", "sk-test"),
            ("QUILLFORGE_DB_PATH", ":memory:"),
            ("QUILLFORGE_RPC_PORT", "9999"),
            ("QUILLFORGE_POLL_INTERVAL_MS", "250"),
            ("QUILLFORGE_DISPATCH_LIMIT", "3"),
            ("QUILLFORGE_ITEM_DELAY_MS", "0"),
            ("QUILLFORGE_RATE_LIMIT_BURST", "50"),
            ("QUILLFORGE_LOG_FORMAT", "json"),
        ])
        .unwrap();

        assert_eq!(config.db_path, ":memory:");
        assert_eq!(config.rpc_port, 9999);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.dispatch_limit, 3);
        assert_eq!(config.item_delay, Duration::ZERO);
        assert_eq!(config.rate_limit.burst, 50);
        assert_eq!(config.log_format, "json");
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = config(&[
            ("QUILLFORGE_GENERATION_API_KEY", "sk-test"),
            ("QUILLFORGE_RPC_PORT", "not-a-port"),
            ("QUILLFORGE_DISPATCH_LIMIT", "0"),
        ])
        .unwrap();

        assert_eq!(config.rpc_port, 9530);
        assert_eq!(config.dispatch_limit, 1);
    }

    #[test]
    fn test_api_key_required() {
        assert!(config(&[]).is_err());
        assert!(config(&[("QUILLFORGE_GENERATION_API_KEY", "  ")]).is_err());
    }
}

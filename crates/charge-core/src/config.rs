use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, upstream::DEFAULT_UPSTREAM_URL, Result};

/// Typed configuration, read from the environment (plus an optional `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub telegram_safe_limit: usize,

    // Data files
    pub topology_file: PathBuf,
    pub credential_file: PathBuf,

    // Vendor API
    pub upstream_url: String,
    pub upstream_token: String,
    pub upstream_client_id: String,
    pub upstream_app_id: String,
    pub upstream_timeout: Duration,
    pub fetch_concurrency: usize,

    // Cache
    pub cache_ttl: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let mut cfg = Self::defaults(telegram_bot_token);

        if let Some(p) = env_path("TOPOLOGY_FILE") {
            cfg.topology_file = p;
        }
        if let Some(p) = env_path("CREDENTIAL_FILE") {
            cfg.credential_file = p;
        }
        if let Some(v) = env_str("UPSTREAM_URL").and_then(non_empty) {
            cfg.upstream_url = v;
        }
        if let Some(v) = env_str("UPSTREAM_TOKEN").and_then(non_empty) {
            cfg.upstream_token = v;
        }
        if let Some(v) = env_str("UPSTREAM_CLIENT_ID").and_then(non_empty) {
            cfg.upstream_client_id = v;
        }
        if let Some(v) = env_str("UPSTREAM_APP_ID").and_then(non_empty) {
            cfg.upstream_app_id = v;
        }
        if let Some(secs) = env_u64("UPSTREAM_TIMEOUT_SECS") {
            cfg.upstream_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(n) = env_usize("FETCH_CONCURRENCY") {
            cfg.fetch_concurrency = n.max(1);
        }
        if let Some(secs) = env_u64("CACHE_TTL_SECS") {
            cfg.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(n) = env_usize("TELEGRAM_SAFE_LIMIT") {
            cfg.telegram_safe_limit = n.clamp(200, 4096);
        }

        Ok(cfg)
    }

    /// Built-in defaults, used by `load()` before applying environment overrides.
    pub fn defaults(telegram_bot_token: impl Into<String>) -> Self {
        Self {
            telegram_bot_token: telegram_bot_token.into(),
            telegram_safe_limit: 4000,
            topology_file: PathBuf::from("devices.json"),
            credential_file: PathBuf::from("hash.json"),
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            upstream_token: "token".to_string(),
            upstream_client_id: "1".to_string(),
            upstream_app_id: "dd".to_string(),
            upstream_timeout: Duration::from_secs(10),
            fetch_concurrency: 4,
            cache_ttl: Duration::from_secs(60),
        }
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, unquote(v.trim()));
    }
}

fn unquote(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_matching_quotes_only() {
        assert_eq!(unquote("\"abc\""), "abc");
        assert_eq!(unquote("'abc'"), "abc");
        assert_eq!(unquote("\"abc'"), "\"abc'");
        assert_eq!(unquote("x"), "x");
    }

    #[test]
    fn defaults_match_vendor_expectations() {
        let cfg = Config::defaults("t");
        assert_eq!(cfg.upstream_url, DEFAULT_UPSTREAM_URL);
        assert_eq!(cfg.upstream_app_id, "dd");
        assert_eq!(cfg.upstream_client_id, "1");
        assert_eq!(cfg.cache_ttl, Duration::from_secs(60));
        assert_eq!(cfg.credential_file, PathBuf::from("hash.json"));
    }
}

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cache::CACHE_TTL_MS;
use crate::fetcher::PAGE_SIZE;

pub const DEFAULT_AUTH_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rapidapi_key: Option<String>,
    pub auth_base_url: String,
    pub page_size: u32,
    pub cache_ttl_ms: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rapidapi_key: None,
            auth_base_url: DEFAULT_AUTH_URL.to_string(),
            page_size: PAGE_SIZE,
            cache_ttl_ms: CACHE_TTL_MS,
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "jobseek").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Defaults, then the config file if present, then the environment
    /// (including a `.env` in the working directory).
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(key) = lookup("RAPIDAPI_KEY").filter(|k| !k.trim().is_empty()) {
            self.rapidapi_key = Some(key.trim().to_string());
        }
        if let Some(url) = lookup("JOBSEEK_AUTH_URL") {
            self.auth_base_url = url;
        }
        if let Some(size) = lookup("JOBSEEK_PAGE_SIZE") {
            self.page_size = size
                .parse()
                .context("JOBSEEK_PAGE_SIZE must be a positive integer")?;
        }
        if let Some(ttl) = lookup("JOBSEEK_CACHE_TTL_MS") {
            self.cache_ttl_ms = ttl
                .parse()
                .context("JOBSEEK_CACHE_TTL_MS must be an integer number of milliseconds")?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(anyhow!("page_size must be greater than zero"));
        }
        if self.cache_ttl_ms < 0 {
            return Err(anyhow!("cache_ttl_ms must not be negative"));
        }
        Ok(())
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.rapidapi_key.as_deref().ok_or_else(|| {
            anyhow!(
                "RapidAPI key not configured. Set it with: export RAPIDAPI_KEY=your-key-here \
                 (or rapidapi_key in {})",
                Self::default_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "config.toml".to_string())
            )
        })
    }

    pub fn masked_api_key(&self) -> String {
        match self.rapidapi_key.as_deref() {
            None => "(not set)".to_string(),
            Some(key) if key.chars().count() <= 8 => "****".to_string(),
            Some(key) => {
                let tail: String = key.chars().skip(key.chars().count() - 4).collect();
                format!("****{}", tail)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.cache_ttl_ms, 3_600_000);
        assert_eq!(config.auth_base_url, "http://localhost:5000");
        assert!(config.require_api_key().is_err());
    }

    #[test]
    fn test_file_then_env_override() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "rapidapi_key = \"from-file\"\npage_size = 50\n").unwrap();

        let mut config = Config::from_file(&path).unwrap();
        assert_eq!(config.rapidapi_key.as_deref(), Some("from-file"));
        assert_eq!(config.page_size, 50);
        assert_eq!(config.cache_ttl_ms, CACHE_TTL_MS);

        config
            .apply_env(env(&[("RAPIDAPI_KEY", " from-env "), ("JOBSEEK_AUTH_URL", "http://auth:8000")]))
            .unwrap();
        assert_eq!(config.require_api_key().unwrap(), "from-env");
        assert_eq!(config.auth_base_url, "http://auth:8000");
        assert_eq!(config.page_size, 50);
    }

    #[test]
    fn test_bad_env_values() {
        let mut config = Config::default();
        assert!(config.apply_env(env(&[("JOBSEEK_PAGE_SIZE", "lots")])).is_err());

        let mut config = Config::default();
        config.apply_env(env(&[("JOBSEEK_PAGE_SIZE", "0")])).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_masked_api_key() {
        let mut config = Config::default();
        assert_eq!(config.masked_api_key(), "(not set)");
        config.rapidapi_key = Some("ff14d5689dmshe6eed".to_string());
        assert_eq!(config.masked_api_key(), "****6eed");
        config.rapidapi_key = Some("short".to_string());
        assert_eq!(config.masked_api_key(), "****");
    }
}

//! Configuration for the PDF renderer
//!
//! Loaded from a YAML file whose path comes from `CONFIG_PATH`
//! (default: `config/html2pdf.yaml`). `CHROME_BIN` overrides the configured
//! browser binary, which keeps container images configurable without editing
//! the config file.

use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub logger: LoggerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub pdf: PdfConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum size of HTML input in bytes
    #[serde(default = "default_max_html_bytes")]
    pub max_html_bytes: usize,
    /// Maximum size of a generated PDF in bytes
    #[serde(default = "default_max_pdf_bytes")]
    pub max_pdf_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggerConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CacheConfig {
    /// Whether generated PDFs are cached in Redis
    #[serde(default)]
    pub pdf_cache_enabled: bool,
    /// TTL for cached PDFs; zero falls back to a safe default at write time
    #[serde(default, with = "humantime_serde")]
    pub pdf_cache_ttl: Duration,
    #[serde(default)]
    pub redis_host: String,
    #[serde(default)]
    pub redis_pdf_db: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PdfConfig {
    /// Paper format used when the request does not name one
    #[serde(default = "default_paper")]
    pub default_paper: String,
    /// Available paper formats, dimensions in inches
    #[serde(default = "default_paper_sizes")]
    pub paper_sizes: HashMap<String, PaperSize>,
    /// Per-request render timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Path to the Chrome binary; empty lets the launcher discover one
    #[serde(default)]
    pub chrome_path: String,
    /// Launch Chrome with --no-sandbox (required in most containers)
    #[serde(default)]
    pub chrome_no_sandbox: bool,
    /// Concurrent render slots on the pooled browser (<= 0 disables pooling)
    #[serde(default = "default_pool_size")]
    pub chrome_pool_size: i32,
    /// Base directory for browser profiles; empty uses the system temp dir
    #[serde(default)]
    pub user_data_dir: String,
}

/// Width and height in inches for a paper format.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PaperSize {
    pub width: f64,
    pub height: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_html_bytes: default_max_html_bytes(),
            max_pdf_bytes: default_max_pdf_bytes(),
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            default_paper: default_paper(),
            paper_sizes: default_paper_sizes(),
            timeout_secs: default_timeout_secs(),
            chrome_path: String::new(),
            chrome_no_sandbox: false,
            chrome_pool_size: default_pool_size(),
            user_data_dir: String::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_html_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_max_pdf_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_paper() -> String {
    "A4".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_pool_size() -> i32 {
    4
}

fn default_paper_sizes() -> HashMap<String, PaperSize> {
    HashMap::from([
        (
            "A3".to_string(),
            PaperSize {
                width: 11.69,
                height: 16.54,
            },
        ),
        (
            "A4".to_string(),
            PaperSize {
                width: 8.27,
                height: 11.69,
            },
        ),
        (
            "A5".to_string(),
            PaperSize {
                width: 5.83,
                height: 8.27,
            },
        ),
        (
            "LETTER".to_string(),
            PaperSize {
                width: 8.5,
                height: 11.0,
            },
        ),
        (
            "LEGAL".to_string(),
            PaperSize {
                width: 8.5,
                height: 14.0,
            },
        ),
        (
            "TABLOID".to_string(),
            PaperSize {
                width: 11.0,
                height: 17.0,
            },
        ),
    ])
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Load the configuration. The path can be overridden via `CONFIG_PATH`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config/html2pdf.yaml".to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut cfg: Config = serde_yaml::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if self.pdf.chrome_path.is_empty() {
            if let Ok(path) = env::var("CHROME_BIN") {
                if !path.is_empty() {
                    self.pdf.chrome_path = path;
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pdf.timeout_secs == 0 {
            return Err(ConfigError::Invalid("pdf.timeout_secs must be > 0".into()));
        }
        if self.pdf.paper_sizes.is_empty() {
            return Err(ConfigError::Invalid("pdf.paper_sizes must not be empty".into()));
        }
        if !self.pdf.paper_sizes.contains_key(&self.pdf.default_paper) {
            return Err(ConfigError::Invalid(format!(
                "pdf.default_paper {:?} is not in pdf.paper_sizes",
                self.pdf.default_paper
            )));
        }
        if self.limits.max_html_bytes == 0 || self.limits.max_pdf_bytes == 0 {
            return Err(ConfigError::Invalid("limits must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
server:
  host: "127.0.0.1"
  port: 9090
limits:
  max_html_bytes: 1048576
  max_pdf_bytes: 5242880
cache:
  pdf_cache_enabled: true
  pdf_cache_ttl: 24h
  redis_host: "localhost:6379"
  redis_pdf_db: 2
pdf:
  default_paper: "A4"
  timeout_secs: 20
  chrome_no_sandbox: true
  chrome_pool_size: 3
"#;

    #[test]
    fn parses_sample_config() {
        let cfg: Config = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.limits.max_pdf_bytes, 5 * 1024 * 1024);
        assert_eq!(cfg.cache.pdf_cache_ttl, Duration::from_secs(86400));
        assert_eq!(cfg.pdf.chrome_pool_size, 3);
        assert!(cfg.pdf.chrome_no_sandbox);
        cfg.validate().unwrap();
    }

    #[test]
    fn default_paper_sizes_cover_default_paper() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        assert!(cfg.pdf.paper_sizes.contains_key("A4"));
    }

    #[test]
    fn rejects_unknown_default_paper() {
        let mut cfg = Config::default();
        cfg.pdf.default_paper = "QUARTO".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut cfg = Config::default();
        cfg.pdf.timeout_secs = 0;
        assert!(cfg.validate().is_err());
    }
}

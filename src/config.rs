//! Configuration file parser for ~/.config/feed-sniff/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
//!
//! The sniff budget and media type sets are fixed and cannot be configured.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Page that feed navigations are redirected to, as `<preview_path>?preview=<url>`.
    pub preview_path: String,

    /// Timeout for `feed-sniff url` requests, in seconds.
    pub request_timeout_secs: u64,

    /// User-Agent header for `feed-sniff url` requests.
    pub user_agent: Option<String>,

    /// Chunk size used when streaming a local file through the sniffer.
    pub chunk_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preview_path: "about:feed-preview".to_string(),
            request_timeout_secs: 30,
            user_agent: None,
            chunk_size: 64,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "preview_path",
                "request_timeout_secs",
                "user_agent",
                "chunk_size",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let mut config: Config = toml::from_str(&content)?;
        if config.chunk_size == 0 {
            tracing::warn!("chunk_size must be positive, using default");
            config.chunk_size = Self::default().chunk_size;
        }
        tracing::info!(
            path = %path.display(),
            preview_path = %config.preview_path,
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("feed_sniff_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.preview_path, "about:feed-preview");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.user_agent.is_none());
        assert_eq!(config.chunk_size, 64);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feed_sniff_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.preview_path, "about:feed-preview");
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let path = write_config("whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.chunk_size, 64);
        cleanup(&path);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let path = write_config("partial", "preview_path = \"https://reader.example/preview\"\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.preview_path, "https://reader.example/preview");
        assert_eq!(config.request_timeout_secs, 30);
        cleanup(&path);
    }

    #[test]
    fn test_full_config() {
        let content = r#"
preview_path = "moz-extension://abc/preview.html"
request_timeout_secs = 5
user_agent = "feed-sniff/test"
chunk_size = 7
"#;
        let path = write_config("full", content);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.preview_path, "moz-extension://abc/preview.html");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.user_agent.as_deref(), Some("feed-sniff/test"));
        assert_eq!(config.chunk_size, 7);
        cleanup(&path);
    }

    #[test]
    fn test_zero_chunk_size_replaced() {
        let path = write_config("zero_chunk", "chunk_size = 0\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.chunk_size, 64);
        cleanup(&path);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let path = write_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        cleanup(&path);
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let path = write_config("unknown", "sniff_budget = 4096\npreview_path = \"p\"\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.preview_path, "p");
        cleanup(&path);
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let path = write_config("wrongtype", "request_timeout_secs = \"soon\"\n");
        assert!(Config::load(&path).is_err());
        cleanup(&path);
    }

    #[test]
    fn test_too_large_file_rejected() {
        let path = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        cleanup(&path);
    }
}

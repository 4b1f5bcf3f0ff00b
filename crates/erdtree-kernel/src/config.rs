//! Engine configuration.
//!
//! Loaded from a TOML file; every key is optional and falls back to
//! [`ErdConfig::default`].
//!
//! ```toml
//! db_path = "~/.local/share/erdtree/erdtree.db"
//! max_append_attempts = 8
//! max_content_bytes = 65536
//! context_window = 5
//! event_capacity = 1024
//! log_filter = "info"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use erdtree_types::MAX_CONTENT_BYTES;

use crate::error::{ErdError, Result};

/// Default number of attempts an append makes before reporting a conflict.
pub const DEFAULT_APPEND_ATTEMPTS: u32 = 8;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErdConfig {
    /// SQLite database file. `None` keeps everything in memory.
    /// A leading `~` is expanded.
    pub db_path: Option<String>,
    /// Attempts per append (first try plus retries) before `Conflict`.
    pub max_append_attempts: u32,
    /// Content bound in bytes; at most [`MAX_CONTENT_BYTES`].
    pub max_content_bytes: usize,
    /// Recent non-system messages kept by the context assembler.
    pub context_window: usize,
    /// Event broadcast buffer size.
    pub event_capacity: usize,
    /// Default tracing filter for binaries (`RUST_LOG` wins).
    pub log_filter: String,
}

impl Default for ErdConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            max_append_attempts: DEFAULT_APPEND_ATTEMPTS,
            max_content_bytes: MAX_CONTENT_BYTES,
            context_window: 5,
            event_capacity: 1024,
            log_filter: "info".to_string(),
        }
    }
}

impl ErdConfig {
    /// In-memory configuration with defaults.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Parse TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ErdError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ErdError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml(&text)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Load `path` if given, else the default path if it exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(default) if default.exists() => Self::load(default),
            _ => Ok(Self::default()),
        }
    }

    /// `$XDG_CONFIG_HOME/erdtree/config.toml` (or the platform equivalent).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("erdtree").join("config.toml"))
    }

    /// `$XDG_DATA_HOME/erdtree/erdtree.db` (or the platform equivalent).
    pub fn default_db_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("erdtree").join("erdtree.db"))
    }

    /// The database path with `~` expanded.
    pub fn resolved_db_path(&self) -> Option<PathBuf> {
        self.db_path
            .as_deref()
            .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
    }

    /// Set the database path.
    pub fn with_db_path(mut self, path: impl Into<String>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    /// Set the append attempt budget.
    pub fn with_max_append_attempts(mut self, attempts: u32) -> Self {
        self.max_append_attempts = attempts;
        self
    }

    /// Set the content bound.
    pub fn with_max_content_bytes(mut self, bytes: usize) -> Self {
        self.max_content_bytes = bytes;
        self
    }

    /// Reject settings the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_append_attempts == 0 {
            return Err(ErdError::Config("max_append_attempts must be at least 1".into()));
        }
        if self.max_content_bytes > MAX_CONTENT_BYTES {
            return Err(ErdError::Config(format!(
                "max_content_bytes {} exceeds hard limit {}",
                self.max_content_bytes, MAX_CONTENT_BYTES
            )));
        }
        if self.event_capacity == 0 {
            return Err(ErdError::Config("event_capacity must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ErdConfig::default();
        assert_eq!(config.max_append_attempts, 8);
        assert_eq!(config.max_content_bytes, MAX_CONTENT_BYTES);
        assert!(config.db_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ErdConfig::from_toml("max_append_attempts = 3\n").unwrap();
        assert_eq!(config.max_append_attempts, 3);
        assert_eq!(config.context_window, 5);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_full_toml() {
        let text = r#"
            db_path = "/tmp/erd.db"
            max_append_attempts = 4
            max_content_bytes = 1024
            context_window = 10
            event_capacity = 16
            log_filter = "erdtree_kernel=debug"
        "#;
        let config = ErdConfig::from_toml(text).unwrap();
        assert_eq!(config.resolved_db_path(), Some(PathBuf::from("/tmp/erd.db")));
        assert_eq!(config.max_content_bytes, 1024);
        assert_eq!(config.log_filter, "erdtree_kernel=debug");
    }

    #[test]
    fn test_rejects_zero_attempts() {
        assert!(matches!(
            ErdConfig::from_toml("max_append_attempts = 0"),
            Err(ErdError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_oversized_content_bound() {
        let text = format!("max_content_bytes = {}", MAX_CONTENT_BYTES + 1);
        assert!(ErdConfig::from_toml(&text).is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(ErdConfig::from_toml("max_append_attempts = \"lots\""), Err(ErdError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "context_window = 2\n").unwrap();

        let config = ErdConfig::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.context_window, 2);

        assert!(ErdConfig::load(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_tilde_expansion() {
        let config = ErdConfig::default().with_db_path("~/erd.db");
        let resolved = config.resolved_db_path().unwrap();
        assert!(!resolved.to_string_lossy().starts_with('~'));
    }
}

//! Runtime configuration.
//!
//! Controls how the registry enforces alias uniqueness and how the worker
//! pool behind [`Dispatcher`](crate::Dispatcher) is sized. Every field has a
//! default, so an empty file is a valid configuration.
//!
//! # Example YAML
//!
//! ```yaml
//! alias_scope: per_prefix
//! workers: 4
//! thread_name: chat-dispatch
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use command_dispatch_core::AliasScope;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default worker thread name stem.
pub const DEFAULT_THREAD_NAME: &str = "dispatch";

/// Dispatcher settings.
///
/// # Examples
///
/// ```
/// use command_dispatch_core::AliasScope;
/// use command_dispatch_runtime::RuntimeConfig;
///
/// let config: RuntimeConfig = serde_yaml::from_str("workers: 2").unwrap();
/// assert_eq!(config.worker_count(), 2);
/// assert_eq!(config.alias_scope, AliasScope::PerParent);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Where alias uniqueness is enforced.
    pub alias_scope: AliasScope,
    /// Worker threads for async dispatch (`None` or 0 = available CPUs).
    pub workers: Option<usize>,
    /// Worker threads are named `{thread_name}-{index}`.
    pub thread_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            alias_scope: AliasScope::default(),
            workers: None,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::RuntimeError::IoError) if the file cannot
    /// be read, or [`YamlError`](crate::RuntimeError::YamlError) if parsing
    /// fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::RuntimeError::IoError) if the file cannot
    /// be written, or [`YamlError`](crate::RuntimeError::YamlError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Number of worker threads to start.
    pub fn worker_count(&self) -> usize {
        self.workers.filter(|workers| *workers > 0).unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|parallelism| parallelism.get())
                .unwrap_or(4)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: RuntimeConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.thread_name, "dispatch");
    }

    #[test]
    fn test_deserialize_complete() {
        let yaml = r#"
alias_scope: per_prefix
workers: 8
thread_name: chat
"#;
        let config: RuntimeConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.alias_scope, AliasScope::PerPrefix);
        assert_eq!(config.workers, Some(8));
        assert_eq!(config.worker_count(), 8);
        assert_eq!(config.thread_name, "chat");
    }

    #[test]
    fn test_zero_workers_falls_back_to_parallelism() {
        let config = RuntimeConfig {
            workers: Some(0),
            ..RuntimeConfig::default()
        };
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_rejects_unknown_scope() {
        assert!(serde_yaml::from_str::<RuntimeConfig>("alias_scope: everywhere").is_err());
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime.yml");

        let original = RuntimeConfig {
            alias_scope: AliasScope::PerPrefix,
            workers: Some(3),
            thread_name: "bot".into(),
        };
        original.save(&path).unwrap();

        assert_eq!(RuntimeConfig::load(&path).unwrap(), original);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RuntimeConfig::load(dir.path().join("absent.yml")).unwrap_err();
        assert!(matches!(err, crate::RuntimeError::IoError(_)));
    }
}

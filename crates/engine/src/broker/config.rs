//! Broker configuration via `accord.toml`
//!
//! A default `accord.toml` is created in the data directory on first open.
//! To change settings, edit the file and reopen the broker.

use accord_core::{AccordError, EmptyPolicy, Result, TagName};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name placed in the broker data directory.
pub const CONFIG_FILE_NAME: &str = "accord.toml";

/// Broker configuration loaded from `accord.toml`.
///
/// # Example
///
/// ```toml
/// # Tags whose counterparts every deployment must be compatible with
/// required_tags = ["prod"]
///
/// # Verdict when a participant has no applicable contracts: "allow" or "deny"
/// empty_policy = "allow"
///
/// # fsync the journal after every write
/// journal_sync = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BrokerConfig {
    /// Tags added to every deployment query's relevant set.
    #[serde(default)]
    pub required_tags: Vec<TagName>,
    /// Verdict for a query whose applicable set is empty.
    #[serde(default)]
    pub empty_policy: EmptyPolicy,
    /// fsync the journal after every appended record.
    #[serde(default)]
    pub journal_sync: bool,
}

impl BrokerConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Accord broker configuration
#
# Tags whose counterparts every deployment must also be compatible with,
# in addition to the tag being deployed to (default: none).
# required_tags = ["prod"]

# Verdict for a participant with no applicable contracts: "allow" (default)
# or "deny". Can be overridden per query.
empty_policy = "allow"

# fsync the journal after every write (default: false)
#   false = records reach the OS on every write, may lose the tail on power loss
#   true  = every acknowledged write is on disk
journal_sync = false
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AccordError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content).map_err(|e| {
            AccordError::Config(format!(
                "failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                AccordError::Config(format!(
                    "failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AccordError::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            AccordError::Config(format!(
                "failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_allows_empty() {
        let config = BrokerConfig::default();
        assert_eq!(config.empty_policy, EmptyPolicy::Allow);
        assert!(config.required_tags.is_empty());
        assert!(!config.journal_sync);
    }

    #[test]
    fn test_default_toml_parses_to_default() {
        let config: BrokerConfig = toml::from_str(BrokerConfig::default_toml()).unwrap();
        assert_eq!(config, BrokerConfig::default());
    }

    #[test]
    fn test_parse_deny_and_required_tags() {
        let config: BrokerConfig =
            toml::from_str("empty_policy = \"deny\"\nrequired_tags = [\"prod\", \"main\"]\n").unwrap();
        assert_eq!(config.empty_policy, EmptyPolicy::Deny);
        assert_eq!(
            config.required_tags,
            vec![TagName::new("prod").unwrap(), TagName::new("main").unwrap()]
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(toml::from_str::<BrokerConfig>("empty_policy = \"maybe\"").is_err());
        assert!(toml::from_str::<BrokerConfig>("required_tags = [\"has space\"]").is_err());
    }

    #[test]
    fn test_write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        BrokerConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());
        assert_eq!(BrokerConfig::from_file(&path).unwrap(), BrokerConfig::default());
    }

    #[test]
    fn test_write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "journal_sync = true\n").unwrap();

        BrokerConfig::write_default_if_missing(&path).unwrap();
        assert!(BrokerConfig::from_file(&path).unwrap().journal_sync);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "").unwrap();
        assert_eq!(BrokerConfig::from_file(&path).unwrap(), BrokerConfig::default());
    }

    #[test]
    fn test_parse_error_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "journal_sync = \"sometimes\"").unwrap();
        assert!(matches!(BrokerConfig::from_file(&path), Err(AccordError::Config(_))));
    }

    #[test]
    fn test_write_to_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = BrokerConfig {
            required_tags: vec![TagName::new("prod").unwrap()],
            empty_policy: EmptyPolicy::Deny,
            journal_sync: true,
        };
        config.write_to_file(&path).unwrap();
        assert_eq!(BrokerConfig::from_file(&path).unwrap(), config);
    }
}

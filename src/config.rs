use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Options controlling a single document update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateOptions {
    /// Remove disallowed constructs and rename duplicate ids instead of failing
    pub force: bool,
    /// Version to update to; the newest known version when absent
    pub target_version: Option<String>,
    /// Verify the updated document before writing it
    pub verify: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML options: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid JSON options: {0}")]
    Json(#[from] serde_json::Error),
}

impl UpdateOptions {
    /// Load options from a `.json` file, or YAML for any other extension
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json(&text)
        } else {
            Self::from_yaml(&text)
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force |= force;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify |= verify;
        self
    }

    pub fn with_target_version(mut self, target: Option<String>) -> Self {
        if target.is_some() {
            self.target_version = target;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_fields_missing() {
        let options = UpdateOptions::from_yaml("force: true\n").unwrap();
        assert!(options.force);
        assert!(!options.verify);
        assert_eq!(options.target_version, None);
    }

    #[test]
    fn test_from_json() {
        let options = UpdateOptions::from_json(r#"{"target_version": "2.0.1", "verify": true}"#).unwrap();
        assert_eq!(options.target_version.as_deref(), Some("2.0.1"));
        assert!(options.verify);
        assert!(!options.force);
    }

    #[test]
    fn test_flags_merge_over_file() {
        let options = UpdateOptions {
            force: false,
            target_version: Some("2.0.1".to_string()),
            verify: true,
        }
        .with_force(true)
        .with_verify(false)
        .with_target_version(None);

        assert!(options.force);
        assert!(options.verify);
        assert_eq!(options.target_version.as_deref(), Some("2.0.1"));

        let options = options.with_target_version(Some("2.1".to_string()));
        assert_eq!(options.target_version.as_deref(), Some("2.1"));
    }

    #[test]
    fn test_load_by_extension() {
        let dir = std::env::temp_dir().join(format!("cti-migrate-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let json = dir.join("options.json");
        fs::write(&json, r#"{"force": true}"#).unwrap();
        assert!(UpdateOptions::load(&json).unwrap().force);

        let yaml = dir.join("options.yaml");
        fs::write(&yaml, "verify: true\ntarget_version: \"2.1\"\n").unwrap();
        let options = UpdateOptions::load(&yaml).unwrap();
        assert!(options.verify);
        assert_eq!(options.target_version.as_deref(), Some("2.1"));

        assert!(matches!(
            UpdateOptions::load(&dir.join("missing.yaml")),
            Err(ConfigError::Io { .. })
        ));
        assert!(matches!(UpdateOptions::from_yaml("force: [1"), Err(ConfigError::Yaml(_))));

        fs::remove_dir_all(&dir).unwrap();
    }
}

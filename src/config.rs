//! Environment configuration.
//!
//! ```yaml
//! disabled_functions: [env, uuid_v4]
//! disabled_methods: []
//! only_pure: false
//! allow_deprecated: true
//! max_depth: 256
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{MappingError, Result};

pub const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentConfig {
    pub disabled_functions: Vec<String>,
    pub disabled_methods: Vec<String>,
    /// Drop every function or method that is not pure.
    pub only_pure: bool,
    pub allow_deprecated: bool,
    /// Deepest expression nesting the parser accepts.
    pub max_depth: usize,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            disabled_functions: Vec::new(),
            disabled_methods: Vec::new(),
            only_pure: false,
            allow_deprecated: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EnvironmentConfig {
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(source)
            .map_err(|err| MappingError::general(format!("invalid environment config: {err}")))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config = EnvironmentConfig::from_yaml_str("only_pure: true\n").unwrap();
        assert!(config.only_pure);
        assert!(config.allow_deprecated);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(EnvironmentConfig::from_yaml_str("").unwrap(), EnvironmentConfig::default());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = EnvironmentConfig::from_yaml_str("bogus: 1\n").unwrap_err();
        assert!(err.to_string().starts_with("invalid environment config"));
    }
}

// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Context configuration options

use crate::error::{ContextError, ContextResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Names reserved by web-backed contexts for request parameters, session and application
pub const WEB_RESERVED_NAMES: [&str; 3] = ["param", "session", "application"];

/// Configuration for the scope maps created by a context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Number of level frames allocated up front
    pub initial_frames: usize,

    /// Initial capacity of a frame's binding storage
    pub initial_bindings: usize,

    /// Number of element-stack slots allocated up front
    pub element_hierarchy: usize,

    /// Names that can never be bound, unbound or overwritten
    pub reserved_names: Vec<String>,
}

impl ContextConfig {
    /// Create a configuration with custom capacities and no reserved names
    pub fn new(initial_frames: usize, initial_bindings: usize, element_hierarchy: usize) -> Self {
        Self {
            initial_frames,
            initial_bindings,
            element_hierarchy,
            reserved_names: Vec::new(),
        }
    }

    /// Configuration for contexts backed by a web request's attribute table
    pub fn web() -> Self {
        Self {
            reserved_names: WEB_RESERVED_NAMES.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Create a configuration for testing (tiny capacities, so growth paths are exercised)
    pub fn testing() -> Self {
        Self {
            initial_frames: 1,
            initial_bindings: 1,
            element_hierarchy: 1,
            reserved_names: Vec::new(),
        }
    }

    /// Add a reserved name
    pub fn with_reserved_name(mut self, name: impl Into<String>) -> Self {
        self.reserved_names.push(name.into());
        self
    }

    /// Load a configuration from JSON, filling missing fields with defaults
    pub fn from_json_str(json: &str) -> ContextResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(ContextError::configuration)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> ContextResult<()> {
        if self.initial_frames == 0 {
            return Err(ContextError::configuration(
                "initial_frames must be greater than 0",
            ));
        }
        if self.initial_bindings == 0 {
            return Err(ContextError::configuration(
                "initial_bindings must be greater than 0",
            ));
        }
        if let Some(name) = self.reserved_names.iter().find(|n| n.is_empty()) {
            return Err(ContextError::configuration(format!(
                "reserved name '{name}' is empty"
            )));
        }
        Ok(())
    }

    pub(crate) fn reserved(&self) -> Arc<[String]> {
        self.reserved_names.clone().into()
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            initial_frames: 10,
            initial_bindings: 5,
            element_hierarchy: 20,
            reserved_names: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ContextConfig::default();
        assert_eq!(config.initial_frames, 10);
        assert_eq!(config.initial_bindings, 5);
        assert_eq!(config.element_hierarchy, 20);
        assert!(config.reserved_names.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_web_preset_reserves_namespaces() {
        let config = ContextConfig::web();
        assert_eq!(config.reserved_names, vec!["param", "session", "application"]);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = ContextConfig::from_json_str(r#"{"initial_frames": 32}"#).unwrap();
        assert_eq!(config.initial_frames, 32);
        assert_eq!(config.initial_bindings, 5);
    }

    #[test]
    fn test_from_json_rejects_zero_capacity() {
        let err = ContextConfig::from_json_str(r#"{"initial_bindings": 0}"#).unwrap_err();
        assert!(matches!(err, ContextError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_from_json_rejects_malformed_input() {
        assert!(ContextConfig::from_json_str("{not json").is_err());
    }

    #[test]
    fn test_with_reserved_name() {
        let config = ContextConfig::default().with_reserved_name("request");
        assert_eq!(config.reserved_names, vec!["request"]);
        assert_eq!(&*config.reserved(), &["request".to_string()]);

        let invalid = ContextConfig::default().with_reserved_name("");
        assert!(matches!(
            invalid.validate(),
            Err(ContextError::InvalidConfiguration { .. })
        ));
    }
}

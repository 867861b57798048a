//! Configuration file
//!
//! ```json
//! {
//!   "server": { "host": "127.0.0.1", "port": 3000 },
//!   "log_filter": "info",
//!   "resources": [ { "name": "people", "schema": { ... } } ]
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::ResourceDescriptor;
use crate::http_server::HttpServerConfig;
use crate::observability::DEFAULT_LOG_FILTER;
use crate::rest_api::route_patterns;

use super::errors::{CliError, CliResult};

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: HttpServerConfig,

    /// `tracing` filter used when `RUST_LOG` is unset (default "info")
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Resources to serve
    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl AppConfig {
    /// Load and validate configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        Self::from_json(&content)
    }

    /// Parse and validate configuration text
    pub fn from_json(content: &str) -> CliResult<Self> {
        let config: AppConfig = serde_json::from_str(content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> CliResult<()> {
        if self.server.port == 0 {
            return Err(CliError::config_error("server.port must be > 0"));
        }

        let mut names = HashSet::new();
        let mut routes = HashSet::new();

        for descriptor in &self.resources {
            descriptor.validate().map_err(CliError::config_error)?;

            if !names.insert(descriptor.name.as_str()) {
                return Err(CliError::config_error(format!(
                    "Duplicate resource name: '{}'",
                    descriptor.name
                )));
            }

            for route in route_patterns(descriptor) {
                if !routes.insert(route.clone()) {
                    return Err(CliError::config_error(format!(
                        "resource '{}': URL '{}' clashes with another resource",
                        descriptor.name, route
                    )));
                }
            }
        }

        Ok(())
    }
}

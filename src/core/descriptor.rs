//! Resource descriptors
//!
//! A descriptor defines a resource once: its URL pattern, schema, enabled
//! verbs, query limits and echo/error policies. Descriptors deserialize from
//! the `resources` array of the configuration file.

use serde::{Deserialize, Serialize};

use crate::driver::SortKey;
use crate::schema::{derive_search_schema, Schema, SearchSchema};

/// Per-verb enable flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerbFlags {
    #[serde(default = "enabled")]
    pub get: bool,
    #[serde(default = "enabled")]
    pub put: bool,
    #[serde(default = "enabled")]
    pub post: bool,
    #[serde(default = "enabled")]
    pub get_query: bool,
    #[serde(default = "enabled")]
    pub delete: bool,
    #[serde(default)]
    pub post_append: bool,
}

impl Default for VerbFlags {
    fn default() -> Self {
        Self {
            get: true,
            put: true,
            post: true,
            get_query: true,
            delete: true,
            post_append: false,
        }
    }
}

/// Whether mutating verbs return the written record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoFlags {
    #[serde(default = "enabled")]
    pub after_post: bool,
    #[serde(default = "enabled")]
    pub after_put: bool,
    #[serde(default = "enabled")]
    pub after_post_append: bool,
}

impl Default for EchoFlags {
    fn default() -> Self {
        Self {
            after_post: true,
            after_put: true,
            after_post_append: true,
        }
    }
}

fn enabled() -> bool {
    true
}

/// Which errors are forwarded to the transport instead of being shaped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainErrors {
    /// Forward every error
    All,
    /// Shape every error; non-HTTP ones become 503
    None,
    /// Shape HTTP errors, forward the rest
    #[default]
    NonHttp,
}

/// Resource definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Logical name, unique within a registry
    pub name: String,

    /// URL pattern such as `/workspaces/:workspaceId/users/:id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,

    #[serde(default)]
    pub schema: Schema,

    /// Explicit search schema; derived from `searchable` fields when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_schema: Option<SearchSchema>,

    #[serde(default)]
    pub handles: VerbFlags,

    #[serde(default)]
    pub default_sort: Vec<SortKey>,

    #[serde(default = "default_limit_on_queries")]
    pub default_limit_on_queries: usize,

    #[serde(default = "default_hard_limit_on_queries")]
    pub hard_limit_on_queries: usize,

    #[serde(default)]
    pub echo: EchoFlags,

    #[serde(default)]
    pub chain_errors: ChainErrors,

    /// Sleep before dispatching each call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artificial_delay_ms: Option<u64>,
}

fn default_limit_on_queries() -> usize {
    50
}

fn default_hard_limit_on_queries() -> usize {
    500
}

impl ResourceDescriptor {
    /// Create a descriptor with default settings and URL `/{name}/:id`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            public_url: None,
            schema: Schema::new(),
            search_schema: None,
            handles: VerbFlags::default(),
            default_sort: Vec::new(),
            default_limit_on_queries: default_limit_on_queries(),
            hard_limit_on_queries: default_hard_limit_on_queries(),
            echo: EchoFlags::default(),
            chain_errors: ChainErrors::default(),
            artificial_delay_ms: None,
        }
    }

    pub fn with_url(mut self, pattern: impl Into<String>) -> Self {
        self.public_url = Some(pattern.into());
        self
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_search_schema(mut self, search: SearchSchema) -> Self {
        self.search_schema = Some(search);
        self
    }

    pub fn with_handles(mut self, handles: VerbFlags) -> Self {
        self.handles = handles;
        self
    }

    pub fn with_default_sort(mut self, sort: Vec<SortKey>) -> Self {
        self.default_sort = sort;
        self
    }

    pub fn with_limits(mut self, default_limit: usize, hard_limit: usize) -> Self {
        self.default_limit_on_queries = default_limit;
        self.hard_limit_on_queries = hard_limit;
        self
    }

    pub fn with_echo(mut self, echo: EchoFlags) -> Self {
        self.echo = echo;
        self
    }

    pub fn with_chain_errors(mut self, policy: ChainErrors) -> Self {
        self.chain_errors = policy;
        self
    }

    pub fn with_artificial_delay(mut self, ms: u64) -> Self {
        self.artificial_delay_ms = Some(ms);
        self
    }

    /// Effective URL pattern
    pub fn url_pattern(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("/{}/:id", self.name))
    }

    /// `:`-prefixed segments of the URL pattern, in order
    pub fn param_ids(&self) -> Vec<String> {
        self.url_pattern()
            .split('/')
            .filter_map(|segment| segment.strip_prefix(':'))
            .map(str::to_string)
            .collect()
    }

    /// Last param id; `None` for param-less resources
    pub fn id_property(&self) -> Option<String> {
        self.param_ids().pop()
    }

    /// Pattern of the collection URL: the item pattern without its last
    /// param segment
    pub fn collection_pattern(&self) -> String {
        let pattern = self.url_pattern();
        match pattern.rsplit_once('/') {
            Some((head, last)) if last.starts_with(':') => {
                if head.is_empty() {
                    "/".to_string()
                } else {
                    head.to_string()
                }
            }
            _ => pattern,
        }
    }

    /// Pattern of the item URL, if the resource has an id property
    pub fn item_pattern(&self) -> Option<String> {
        self.id_property().map(|_| self.url_pattern())
    }

    /// Search schema in force for queries
    pub fn effective_search_schema(&self) -> SearchSchema {
        match &self.search_schema {
            Some(search) => search.clone(),
            None => derive_search_schema(&self.schema),
        }
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("resource name must not be empty".to_string());
        }

        let pattern = self.url_pattern();
        if !pattern.starts_with('/') {
            return Err(format!(
                "resource '{}': URL pattern '{}' must start with '/'",
                self.name, pattern
            ));
        }

        let params = self.param_ids();
        for (i, param) in params.iter().enumerate() {
            if param.is_empty() {
                return Err(format!("resource '{}': empty URL parameter name", self.name));
            }
            if params[..i].contains(param) {
                return Err(format!(
                    "resource '{}': URL parameter '{}' appears twice",
                    self.name, param
                ));
            }
        }

        if self.default_limit_on_queries == 0 {
            return Err(format!(
                "resource '{}': default_limit_on_queries must be > 0",
                self.name
            ));
        }

        if self.hard_limit_on_queries < self.default_limit_on_queries {
            return Err(format!(
                "resource '{}': hard_limit_on_queries must be >= default_limit_on_queries",
                self.name
            ));
        }

        for key in &self.default_sort {
            if !self.schema.is_sortable(&key.field) {
                return Err(format!(
                    "resource '{}': default sort field '{}' is not a sortable schema field",
                    self.name, key.field
                ));
            }
        }

        Ok(())
    }
}

//! Schema type definitions
//!
//! Supported field types:
//! - string: UTF-8 string, `min`/`max` bound its length
//! - number: JSON number, `min`/`max` bound its value
//! - id: identifier, normalised to a string
//! - boolean: true/false
//! - date: RFC 3339 timestamp or ISO date
//! - array: JSON array
//! - object: JSON object

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::driver::FilterOperator;

/// Supported field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Id,
    Boolean,
    Date,
    Array,
    Object,
}

impl FieldType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Id => "id",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }
}

/// Field definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default)]
    pub required: bool,

    /// Usable as a query filter when no explicit search schema is declared
    #[serde(default)]
    pub searchable: bool,

    /// Usable in `sortBy`
    #[serde(default)]
    pub sortable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Validated but never handed to the driver
    #[serde(default, alias = "silent")]
    pub do_not_save: bool,

    /// Comparison used when the field is searched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_type: Option<FilterOperator>,

    /// Value applied when the field is absent on a full validation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FieldDef {
    /// Create an optional field of the given type
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            searchable: false,
            sortable: false,
            max: None,
            min: None,
            do_not_save: false,
            filter_type: None,
            default: None,
        }
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn number() -> Self {
        Self::new(FieldType::Number)
    }

    pub fn id() -> Self {
        Self::new(FieldType::Id)
    }

    pub fn boolean() -> Self {
        Self::new(FieldType::Boolean)
    }

    pub fn date() -> Self {
        Self::new(FieldType::Date)
    }

    pub fn array() -> Self {
        Self::new(FieldType::Array)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn do_not_save(mut self) -> Self {
        self.do_not_save = true;
        self
    }

    pub fn filter_type(mut self, operator: FilterOperator) -> Self {
        self.filter_type = Some(operator);
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// Field structure of a resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: BTreeMap<String, FieldDef>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field (builder style)
    pub fn field(mut self, name: impl Into<String>, def: FieldDef) -> Self {
        self.fields.insert(name.into(), def);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldDef)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn is_sortable(&self, name: &str) -> bool {
        self.fields.get(name).is_some_and(|def| def.sortable)
    }

    /// Names of fields that must never reach the driver
    pub fn unsaved_fields(&self) -> impl Iterator<Item = &String> {
        self.fields
            .iter()
            .filter(|(_, def)| def.do_not_save)
            .map(|(name, _)| name)
    }

    /// Sub-schema restricted to the identifying parameters.
    ///
    /// Parameters not declared in the schema are checked as `id` fields.
    pub fn id_subset<'a>(&self, param_ids: impl IntoIterator<Item = &'a String>) -> Schema {
        let fields = param_ids
            .into_iter()
            .map(|name| {
                let def = self
                    .fields
                    .get(name)
                    .cloned()
                    .unwrap_or_else(FieldDef::id);
                (name.clone(), def)
            })
            .collect();
        Schema { fields }
    }
}

impl FromIterator<(String, FieldDef)> for Schema {
    fn from_iter<I: IntoIterator<Item = (String, FieldDef)>>(iter: I) -> Self {
        Schema {
            fields: iter.into_iter().collect(),
        }
    }
}

/// A field usable as a query filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchField {
    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Underlying record field; defaults to the search field's own name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(default)]
    pub operator: FilterOperator,
}

impl SearchField {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            target: None,
            operator: FilterOperator::Eq,
        }
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn operator(mut self, operator: FilterOperator) -> Self {
        self.operator = operator;
        self
    }
}

/// Search fields by name
pub type SearchSchema = BTreeMap<String, SearchField>;

/// Derive a search schema from the `searchable` fields of a schema
pub fn derive_search_schema(schema: &Schema) -> SearchSchema {
    schema
        .fields()
        .filter(|(_, def)| def.searchable)
        .map(|(name, def)| {
            let field = SearchField {
                field_type: def.field_type,
                target: None,
                operator: def.filter_type.unwrap_or_default(),
            };
            (name.clone(), field)
        })
        .collect()
}

/// Validation schema for a search schema (every filter is optional)
pub fn search_validation_schema(search: &SearchSchema) -> Schema {
    search
        .iter()
        .map(|(name, field)| (name.clone(), FieldDef::new(field.field_type)))
        .collect()
}

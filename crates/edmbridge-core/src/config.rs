//! Source configuration: where entries come from and how they are mapped.

use arrow::datatypes::Schema;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::schema_json;

const SELECT_OPTION: &str = "$select=";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    pub reference_name: String,
    /// Root URL of the OData service.
    pub url: String,
    /// Entity set path below `url`.
    pub resource_path: String,
    /// Query options, e.g. `$select=Name,Price&$top=10`.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Override schema in the record schema JSON format.
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub include_metadata_annotations: bool,
}

impl SourceConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Property names listed by the `$select` query option, in order. Empty
    /// when the query selects nothing explicitly.
    pub fn select_properties(&self) -> Vec<String> {
        let Some(query) = self.query.as_deref() else {
            return Vec::new();
        };
        let Some(start) = query.find(SELECT_OPTION) else {
            return Vec::new();
        };
        let rest = &query[start + SELECT_OPTION.len()..];
        let list = rest.split('&').next().unwrap_or_default();
        list.split(',')
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn parsed_schema(&self) -> Result<Option<Schema>, ConfigError> {
        match self.schema.as_deref() {
            Some(text) if !text.trim().is_empty() => Ok(Some(schema_json::parse_schema(text)?)),
            _ => Ok(None),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reference_name.is_empty() {
            return Err(ConfigError::MissingReferenceName);
        }
        let valid_id = self
            .reference_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid_id {
            return Err(ConfigError::InvalidReferenceName(self.reference_name.clone()));
        }
        if self.url.trim().is_empty() {
            return Err(ConfigError::MissingProperty("OData service URL"));
        }
        if self.resource_path.trim().is_empty() {
            return Err(ConfigError::MissingProperty("resource path"));
        }
        self.parsed_schema()?;
        Ok(())
    }
}

//! Entity-type property metadata as handed over by the metadata collaborator.

use serde::{Deserialize, Serialize};

use crate::annotation::PropertyAnnotations;
use crate::protocol::ODataVersion;

/// One EDM property of an entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdmProperty {
    pub name: String,
    pub edm_type_name: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub scale: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<PropertyAnnotations>,
}

// EDM properties are nullable unless declared otherwise.
fn default_nullable() -> bool {
    true
}

impl EdmProperty {
    pub fn new(name: impl Into<String>, edm_type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            edm_type_name: edm_type_name.into(),
            nullable: true,
            precision: None,
            scale: None,
            annotations: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_facets(mut self, precision: u32, scale: u32) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    pub fn with_annotations(mut self, annotations: PropertyAnnotations) -> Self {
        self.annotations = Some(annotations);
        self
    }

    /// Annotations, if any are actually present.
    pub fn annotations(&self) -> Option<&PropertyAnnotations> {
        self.annotations.as_ref().filter(|a| !a.is_empty())
    }
}

/// Metadata for one entity set, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub version: ODataVersion,
    pub properties: Vec<EdmProperty>,
}

impl MetadataDocument {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn property(&self, name: &str) -> Option<&EdmProperty> {
        self.properties.iter().find(|p| p.name == name)
    }
}

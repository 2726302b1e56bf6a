//! Annotation identifier to field name normalization.
//!
//! `Common.Label` with qualifier `UI` becomes `ui_common_label`: the joined
//! identifier is lower-cased and every character outside `[A-Za-z0-9]`
//! becomes `_`.

use std::collections::HashMap;

use crate::error::SchemaError;

/// Field name for an arbitrary identifier.
pub fn normalize_name(identifier: &str) -> String {
    identifier
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Field name for an annotation: `qualifier_term`, or just `term`.
pub fn annotation_name(term: &str, qualifier: Option<&str>) -> String {
    match qualifier.filter(|q| !q.is_empty()) {
        Some(qualifier) => normalize_name(&format!("{qualifier}_{term}")),
        None => normalize_name(term),
    }
}

/// Tracks normalized names within one record and rejects collisions.
#[derive(Debug, Default)]
pub struct NameSet {
    seen: HashMap<String, String>,
}

impl NameSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `source` under its normalized `field` name.
    pub fn insert(&mut self, field: &str, source: &str) -> Result<(), SchemaError> {
        if let Some(first) = self.seen.get(field) {
            return Err(SchemaError::AnnotationNameCollision {
                field: field.to_string(),
                first: first.clone(),
                second: source.to_string(),
            });
        }
        self.seen.insert(field.to_string(), source.to_string());
        Ok(())
    }
}

//! Schema inference from EDM property metadata, and checking a user-supplied
//! override schema against the inferred one.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use tracing::{debug, info, warn};

use crate::annotation;
use crate::catalog;
use crate::error::SchemaError;
use crate::metadata::EdmProperty;
use crate::schema;

/// Derive the output schema.
///
/// Fields follow declaration order. An empty `selected` list keeps every
/// property; otherwise only the named ones are kept. With
/// `include_annotations`, annotated properties are wrapped as
/// `{value, metadata-annotations}`.
pub fn infer_schema(
    properties: &[EdmProperty],
    selected: &[String],
    include_annotations: bool,
) -> Result<Schema, SchemaError> {
    for name in selected {
        if !properties.iter().any(|p| &p.name == name) {
            warn!(property = %name, "selected property is not declared by the entity type");
        }
    }

    let fields = properties
        .iter()
        .filter(|p| selected.is_empty() || selected.contains(&p.name))
        .map(|p| {
            property_field(p, include_annotations).map_err(|e| SchemaError::Inference {
                property: p.name.clone(),
                source: Box::new(e),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if fields.is_empty() {
        return Err(SchemaError::EmptySchema);
    }
    info!(fields = fields.len(), include_annotations, "inferred output schema");
    Ok(Schema::new(fields))
}

fn property_field(property: &EdmProperty, include_annotations: bool) -> Result<Field, SchemaError> {
    let data_type = catalog::canonical_type(
        &property.edm_type_name,
        property.precision,
        property.scale,
    )?;
    let value = Field::new(&property.name, data_type, property.nullable);

    let field = match property.annotations().filter(|_| include_annotations) {
        Some(annotations) => {
            let metadata = annotation::metadata_fields(annotations)?;
            Field::new(
                &property.name,
                schema::value_with_metadata_type(value, metadata),
                false,
            )
        }
        None => value,
    };
    debug!(
        property = %property.name,
        edm_type = %property.edm_type_name,
        data_type = %field.data_type(),
        "inferred field"
    );
    Ok(field)
}

/// Check that every field of `user` can be filled from data shaped like `inferred`.
pub fn validate_compatible(inferred: &Schema, user: &Schema) -> Result<(), SchemaError> {
    for field in user.fields() {
        let incompatible = |reason: String| SchemaError::Compatibility {
            field: field.name().clone(),
            reason,
        };
        let Some((_, actual)) = inferred.column_with_name(field.name()) else {
            return Err(incompatible("field does not exist in the inferred schema".into()));
        };
        if !schema::same_base_type(field.data_type(), actual.data_type()) {
            return Err(incompatible(format!(
                "expected type '{}' but found '{}'",
                actual.data_type(),
                field.data_type()
            )));
        }
        if !field.is_nullable() && actual.is_nullable() {
            return Err(incompatible(
                "declared non-nullable but the inferred field is nullable".into(),
            ));
        }
    }
    Ok(())
}

/// The schema extraction runs against: the override when one is given and
/// compatible, otherwise the inferred schema.
pub fn output_schema(inferred: Schema, user: Option<Schema>) -> Result<SchemaRef, SchemaError> {
    let Some(user) = user else {
        return Ok(Arc::new(inferred));
    };
    validate_compatible(&inferred, &user)?;
    if user.fields().len() < inferred.fields().len() {
        warn!(
            inferred = inferred.fields().len(),
            kept = user.fields().len(),
            "override schema drops inferred fields"
        );
    }
    Ok(Arc::new(user))
}

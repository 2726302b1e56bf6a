use thiserror::Error;

/// Failures raised while deriving or checking an output schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unsupported EDM type '{0}'")]
    UnsupportedType(String),

    #[error("unable to infer schema for property '{property}': {source}")]
    Inference {
        property: String,
        #[source]
        source: Box<SchemaError>,
    },

    #[error("no properties left to map after applying the $select list")]
    EmptySchema,

    #[error("field '{field}' is incompatible with the inferred schema: {reason}")]
    Compatibility { field: String, reason: String },

    #[error("annotation names '{first}' and '{second}' both normalize to field '{field}'")]
    AnnotationNameCollision {
        field: String,
        first: String,
        second: String,
    },

    #[error("invalid decimal facets: precision {precision}, scale {scale}")]
    InvalidDecimal { precision: u32, scale: u32 },

    #[error("invalid schema JSON: {0}")]
    InvalidSchemaJson(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures raised while converting one entry into a record.
///
/// Every variant names the offending field. Any of them aborts the whole
/// entry; no partial record is produced.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("field '{field}' is expected to be one of [{expected}], but found '{actual}'")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: &'static str,
    },

    #[error("field '{field}' has precision {actual} which is higher than schema precision {expected}")]
    PrecisionExceeded {
        field: String,
        actual: u64,
        expected: u8,
    },

    #[error("field '{field}' has scale {actual} which is higher than schema scale {expected}")]
    ScaleExceeded {
        field: String,
        actual: i64,
        expected: i8,
    },

    #[error("field '{field}' value {value} does not fit into {target}")]
    Overflow {
        field: String,
        value: String,
        target: &'static str,
    },

    #[error("field '{field}' is not nullable but no value was provided")]
    NullValue { field: String },

    #[error("field '{field}' has an invalid value: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("field '{field}' is of unsupported type '{data_type}'")]
    UnsupportedField { field: String, data_type: String },
}

/// Invalid source configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reference name must be specified")]
    MissingReferenceName,

    #[error("invalid reference name '{0}': only letters, digits, '_', '-' and '.' are allowed")]
    InvalidReferenceName(String),

    #[error("{0} must be specified")]
    MissingProperty(&'static str),

    #[error("invalid schema: {0}")]
    Schema(#[from] SchemaError),
}

/// Failures raised while decoding an OData JSON payload into entries.
#[derive(Debug, Error)]
pub enum JsonError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected payload shape: {0}")]
    Payload(String),

    #[error("property '{property}' has an invalid {edm_type} literal: {reason}")]
    InvalidLiteral {
        property: String,
        edm_type: String,
        reason: String,
    },

    #[error(transparent)]
    Metadata(#[from] SchemaError),
}

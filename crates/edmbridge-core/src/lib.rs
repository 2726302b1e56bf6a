pub mod annotation;
pub mod batch;
pub mod catalog;
pub mod config;
pub mod decimal;
pub mod error;
pub mod extract;
pub mod infer;
pub mod json;
pub mod metadata;
pub mod naming;
pub mod protocol;
pub mod raw;
pub mod schema;
pub mod schema_json;
pub mod temporal;
pub mod value;

pub use annotation::{Annotation, Expression, PropertyAnnotations};
pub use batch::records_to_batch;
pub use bigdecimal::BigDecimal;
pub use catalog::{EdmType, canonical_type};
pub use config::SourceConfig;
pub use error::{ConfigError, ExtractError, JsonError, SchemaError};
pub use extract::EntryTransformer;
pub use infer::{infer_schema, output_schema, validate_compatible};
pub use json::EntryReader;
pub use metadata::{EdmProperty, MetadataDocument};
pub use protocol::ODataVersion;
pub use raw::{Entry, MediaLink, RawEntryValue};
pub use schema_json::{parse_schema, schema_to_json};
pub use value::{Record, Value};

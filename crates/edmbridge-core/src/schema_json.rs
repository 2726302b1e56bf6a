//! Override-schema JSON: the Avro-flavoured record format pipelines hand in,
//! parsed into and rendered from Arrow schemas.
//!
//! Supported shapes: primitive names (`boolean`, `int`, `long`, `float`,
//! `double`, `bytes`, `string`), `["T", "null"]` unions for nullability,
//! `decimal` / `timestamp-*` / `time-*` logical types, arrays and records.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Fields, Schema, TimeUnit};
use serde_json::{Map, Value as Json, json};

use crate::catalog::{decimal_type, time_type, timestamp_type};
use crate::error::SchemaError;
use crate::schema::LIST_ITEM;

const TOP_LEVEL_NAME: &str = "schema";

fn invalid(reason: impl Into<String>) -> SchemaError {
    SchemaError::InvalidSchemaJson(reason.into())
}

/// Parse a record schema from its JSON text.
pub fn parse_schema(text: &str) -> Result<Schema, SchemaError> {
    let json: Json = serde_json::from_str(text)?;
    schema_from_json(&json)
}

pub fn schema_from_json(json: &Json) -> Result<Schema, SchemaError> {
    let (data_type, nullable) = parse_type(json)?;
    match data_type {
        DataType::Struct(fields) if !nullable => Ok(Schema::new(fields)),
        DataType::Struct(_) => Err(invalid("top-level record must not be nullable")),
        other => Err(invalid(format!("top-level type must be a record, found {other}"))),
    }
}

/// Returns the type plus whether it was declared nullable.
fn parse_type(json: &Json) -> Result<(DataType, bool), SchemaError> {
    match json {
        Json::String(name) => Ok((primitive(name)?, false)),
        Json::Array(branches) => {
            let mut rest = branches.iter().filter(|b| b.as_str() != Some("null"));
            let (Some(inner), None) = (rest.next(), rest.next()) else {
                return Err(invalid("unions must pair exactly one type with \"null\""));
            };
            if branches.len() != 2 {
                return Err(invalid("unions must pair exactly one type with \"null\""));
            }
            let (data_type, _) = parse_type(inner)?;
            Ok((data_type, true))
        }
        Json::Object(object) => Ok((complex(object)?, false)),
        other => Err(invalid(format!("unexpected schema node {other}"))),
    }
}

fn primitive(name: &str) -> Result<DataType, SchemaError> {
    Ok(match name {
        "boolean" => DataType::Boolean,
        "int" => DataType::Int32,
        "long" => DataType::Int64,
        "float" => DataType::Float32,
        "double" => DataType::Float64,
        "bytes" => DataType::Binary,
        "string" => DataType::Utf8,
        other => return Err(invalid(format!("unsupported type '{other}'"))),
    })
}

fn facet(object: &Map<String, Json>, key: &str) -> Result<Option<u32>, SchemaError> {
    match object.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| invalid(format!("'{key}' must be a non-negative integer"))),
    }
}

fn complex(object: &Map<String, Json>) -> Result<DataType, SchemaError> {
    if let Some(logical) = object.get("logicalType").and_then(Json::as_str) {
        return match logical {
            "decimal" => {
                let precision = facet(object, "precision")?
                    .ok_or_else(|| invalid("decimal requires a precision"))?;
                let scale = facet(object, "scale")?.unwrap_or(0);
                decimal_type(precision, scale)
            }
            "timestamp-millis" => Ok(timestamp_type(TimeUnit::Millisecond)),
            "timestamp-micros" => Ok(timestamp_type(TimeUnit::Microsecond)),
            "time-millis" => Ok(time_type(TimeUnit::Millisecond)),
            "time-micros" => Ok(time_type(TimeUnit::Microsecond)),
            other => Err(invalid(format!("unsupported logical type '{other}'"))),
        };
    }
    let kind = object
        .get("type")
        .ok_or_else(|| invalid("schema object without 'type'"))?;
    match kind.as_str() {
        Some("array") => {
            let items = object
                .get("items")
                .ok_or_else(|| invalid("array without 'items'"))?;
            let (item, nullable) = parse_type(items)?;
            Ok(DataType::List(Arc::new(Field::new(LIST_ITEM, item, nullable))))
        }
        Some("record") => {
            let fields = object
                .get("fields")
                .and_then(Json::as_array)
                .ok_or_else(|| invalid("record without 'fields'"))?;
            if fields.is_empty() {
                return Err(invalid("record must declare at least one field"));
            }
            let fields = fields.iter().map(record_field).collect::<Result<Vec<_>, _>>()?;
            Ok(DataType::Struct(Fields::from(fields)))
        }
        // `{"type": "long"}` and friends
        Some(_) => parse_type(kind).and_then(|(data_type, nullable)| {
            if nullable {
                Err(invalid("nested unions are not supported"))
            } else {
                Ok(data_type)
            }
        }),
        None => Err(invalid("'type' must be a string")),
    }
}

fn record_field(json: &Json) -> Result<Field, SchemaError> {
    let name = json
        .get("name")
        .and_then(Json::as_str)
        .ok_or_else(|| invalid("record field without 'name'"))?;
    let kind = json
        .get("type")
        .ok_or_else(|| invalid(format!("field '{name}' has no 'type'")))?;
    let (data_type, nullable) = parse_type(kind)?;
    Ok(Field::new(name, data_type, nullable))
}

/// Render `schema` as a record schema document.
pub fn schema_to_json(schema: &Schema) -> Json {
    record_json(TOP_LEVEL_NAME, schema.fields())
}

fn record_json(name: &str, fields: &Fields) -> Json {
    let fields: Vec<Json> = fields
        .iter()
        .map(|f| json!({ "name": f.name(), "type": field_type_json(f.name(), f) }))
        .collect();
    json!({ "type": "record", "name": name, "fields": fields })
}

fn field_type_json(name: &str, field: &Field) -> Json {
    let inner = type_json(name, field.data_type());
    if field.is_nullable() {
        json!([inner, "null"])
    } else {
        inner
    }
}

fn type_json(name: &str, data_type: &DataType) -> Json {
    match data_type {
        DataType::Boolean => json!("boolean"),
        DataType::Int32 => json!("int"),
        DataType::Int64 => json!("long"),
        DataType::Float32 => json!("float"),
        DataType::Float64 => json!("double"),
        DataType::Binary => json!("bytes"),
        DataType::Utf8 => json!("string"),
        DataType::Decimal128(p, s) | DataType::Decimal256(p, s) => json!({
            "type": "bytes",
            "logicalType": "decimal",
            "precision": p,
            "scale": s,
        }),
        DataType::Timestamp(TimeUnit::Millisecond, _) => {
            json!({ "type": "long", "logicalType": "timestamp-millis" })
        }
        DataType::Timestamp(_, _) => json!({ "type": "long", "logicalType": "timestamp-micros" }),
        DataType::Time32(_) => json!({ "type": "int", "logicalType": "time-millis" }),
        DataType::Time64(_) => json!({ "type": "long", "logicalType": "time-micros" }),
        DataType::List(item) => json!({
            "type": "array",
            "items": field_type_json(&format!("{name}_{LIST_ITEM}"), item),
        }),
        DataType::Struct(fields) => record_json(name, fields),
        // Never produced by inference or parsing.
        other => json!(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::point_type;

    #[test]
    fn parses_primitives_unions_and_logical_types() {
        let schema = parse_schema(
            r#"{
                "type": "record",
                "name": "etlSchemaBody",
                "fields": [
                    {"name": "id", "type": "int"},
                    {"name": "name", "type": ["string", "null"]},
                    {"name": "price", "type": ["null", {"type": "bytes", "logicalType": "decimal", "precision": 10, "scale": 2}]},
                    {"name": "at", "type": {"type": "long", "logicalType": "timestamp-micros"}},
                    {"name": "t", "type": {"type": "int", "logicalType": "time-millis"}},
                    {"name": "tags", "type": {"type": "array", "items": "string"}}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(schema.fields().len(), 6);
        assert!(!schema.field(0).is_nullable());
        assert!(schema.field(1).is_nullable());
        assert_eq!(schema.field(2).data_type(), &DataType::Decimal128(10, 2));
        assert_eq!(
            schema.field(3).data_type(),
            &timestamp_type(TimeUnit::Microsecond)
        );
        assert_eq!(schema.field(4).data_type(), &DataType::Time32(TimeUnit::Millisecond));
        assert!(matches!(schema.field(5).data_type(), DataType::List(_)));
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(matches!(parse_schema("not json"), Err(SchemaError::Json(_))));
        for text in [
            r#""string""#,
            r#"{"type": "record", "name": "r", "fields": []}"#,
            r#"{"type": "record", "name": "r", "fields": [{"name": "a", "type": "map"}]}"#,
            r#"{"type": "record", "name": "r", "fields": [{"name": "a", "type": ["int", "long", "null"]}]}"#,
            r#"{"type": "record", "name": "r", "fields": [{"name": "a", "type": {"type": "long", "logicalType": "date"}}]}"#,
        ] {
            assert!(
                matches!(parse_schema(text), Err(SchemaError::InvalidSchemaJson(_))),
                "{text}"
            );
        }
    }

    #[test]
    fn rendering_parses_back() {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("amount", DataType::Decimal256(50, 4), true),
            Field::new("at", timestamp_type(TimeUnit::Millisecond), true),
            Field::new("location", point_type(), true),
        ]);
        let json = schema_to_json(&schema);
        assert_eq!(json["fields"][1]["type"][1], "null");
        assert_eq!(json["fields"][3]["type"][0]["name"], "location");
        assert_eq!(schema_from_json(&json).unwrap(), schema);
    }
}

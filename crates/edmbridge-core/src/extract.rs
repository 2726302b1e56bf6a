//! Entry to record extraction.
//!
//! One engine serves both protocol versions; [`ODataVersion`] only decides
//! which raw representations are acceptable for each output type. Any field
//! failure aborts the whole entry.

use std::collections::HashMap;

use arrow::datatypes::{DataType, Field, Fields, SchemaRef, TimeUnit};
use bigdecimal::{BigDecimal, RoundingMode};
use chrono::Utc;
use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive, Zero};

use crate::annotation::{self, PropertyAnnotations};
use crate::catalog::{Dimension, GeoKind};
use crate::decimal;
use crate::error::ExtractError;
use crate::metadata::EdmProperty;
use crate::protocol::{ODataVersion, Target};
use crate::raw::{Entry, Geospatial, LinkKind, Point, Polygon, RawEntryValue, Shape};
use crate::schema::{self, RecordShape};
use crate::temporal;
use crate::value::{Record, Value};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Converts entries into records shaped like a fixed output schema.
#[derive(Debug, Clone)]
pub struct EntryTransformer {
    schema: SchemaRef,
    version: ODataVersion,
    annotations: HashMap<String, PropertyAnnotations>,
}

impl EntryTransformer {
    pub fn new(schema: SchemaRef, version: ODataVersion) -> Self {
        Self {
            schema,
            version,
            annotations: HashMap::new(),
        }
    }

    /// Source of the `metadata-annotations` values for wrapped fields.
    pub fn with_annotations(mut self, properties: &[EdmProperty]) -> Self {
        self.annotations = properties
            .iter()
            .filter_map(|p| Some((p.name.clone(), p.annotations()?.clone())))
            .collect();
        self
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn version(&self) -> ODataVersion {
        self.version
    }

    pub fn transform(&self, entry: &Entry) -> Result<Record, ExtractError> {
        let mut record = Record::new();
        for field in self.schema.fields() {
            let value = self.property_value(field.name(), field, entry)?;
            record.push(field.name().as_str(), value);
        }
        Ok(record)
    }

    fn property_value(
        &self,
        property: &str,
        field: &Field,
        entry: &Entry,
    ) -> Result<Value, ExtractError> {
        let data_type = field.data_type();
        match RecordShape::of(data_type) {
            RecordShape::ValueWithMetadata => return self.wrapped(property, data_type, entry),
            RecordShape::Stream => return self.stream(property, field, entry),
            _ => {}
        }
        match entry.get(property) {
            None | Some(RawEntryValue::Null) if field.is_nullable() => Ok(Value::Null),
            None | Some(RawEntryValue::Null) => Err(ExtractError::NullValue {
                field: property.to_string(),
            }),
            Some(raw) => self.convert(property, raw, data_type),
        }
    }

    fn wrapped(
        &self,
        property: &str,
        data_type: &DataType,
        entry: &Entry,
    ) -> Result<Value, ExtractError> {
        let DataType::Struct(fields) = data_type else {
            return Err(unsupported(property, data_type));
        };
        let value = self.property_value(property, &fields[0], entry)?;
        let metadata = self
            .annotations
            .get(property)
            .map(annotation::metadata_value)
            .unwrap_or_default();
        let path = format!("{property}.{}", schema::METADATA_ANNOTATIONS);
        let metadata = conform(&path, Value::Record(metadata), &fields[1])?;
        Ok(Value::Record(
            Record::new()
                .with(schema::VALUE, value)
                .with(schema::METADATA_ANNOTATIONS, metadata),
        ))
    }

    /// Merge the read and edit links of a stream property into one record.
    fn stream(&self, property: &str, field: &Field, entry: &Entry) -> Result<Value, ExtractError> {
        if !self.version.supports_streams() {
            return Err(unsupported(property, field.data_type()));
        }
        let mut links = entry.links_for(property).peekable();
        if links.peek().is_none() {
            return if field.is_nullable() {
                Ok(Value::Null)
            } else {
                Err(ExtractError::NullValue {
                    field: property.to_string(),
                })
            };
        }
        let (mut etag, mut content_type, mut read, mut edit) = (None, None, None, None);
        for link in links {
            etag = etag.or_else(|| link.etag.clone());
            content_type = content_type.or_else(|| link.content_type.clone());
            match link.kind {
                Some(LinkKind::Read) => read = read.or_else(|| link.href.clone()),
                Some(LinkKind::Edit) => edit = edit.or_else(|| link.href.clone()),
                None => {}
            }
        }
        Ok(Value::Record(
            Record::new()
                .with(schema::STREAM_ETAG, Value::from_option(etag))
                .with(schema::STREAM_CONTENT_TYPE, Value::from_option(content_type))
                .with(schema::STREAM_READ_LINK, Value::from_option(read))
                .with(schema::STREAM_EDIT_LINK, Value::from_option(edit)),
        ))
    }

    fn convert(
        &self,
        field: &str,
        raw: &RawEntryValue,
        data_type: &DataType,
    ) -> Result<Value, ExtractError> {
        let target = Target::of(data_type).ok_or_else(|| unsupported(field, data_type))?;
        let permitted = self.version.permitted(target);
        if !permitted.contains(&raw.repr()) {
            return Err(ExtractError::TypeMismatch {
                field: field.to_string(),
                expected: permitted
                    .iter()
                    .map(|r| r.name())
                    .collect::<Vec<_>>()
                    .join(", "),
                actual: raw.repr().name(),
            });
        }

        match (target, raw) {
            (Target::Boolean, RawEntryValue::Boolean(v)) => Ok(Value::Boolean(*v)),
            (Target::Int32, _) => {
                let n = integer(raw).ok_or_else(|| mismatch(field, raw))?;
                n.to_i32()
                    .map(Value::Int32)
                    .ok_or_else(|| overflow(field, &n, "int32"))
            }
            (Target::Int64, _) => {
                let n = integer(raw).ok_or_else(|| mismatch(field, raw))?;
                n.to_i64()
                    .map(Value::Int64)
                    .ok_or_else(|| overflow(field, &n, "int64"))
            }
            (Target::Float32, _) => {
                let v = float(raw).ok_or_else(|| mismatch(field, raw))?;
                Ok(Value::Float32(v as f32))
            }
            (Target::Float64, _) => float(raw)
                .map(Value::Float64)
                .ok_or_else(|| mismatch(field, raw)),
            (Target::Decimal, _) => decimal_value(field, raw, data_type),
            (Target::Bytes, RawEntryValue::Bytes(v)) => Ok(Value::Bytes(v.clone())),
            (Target::String, _) => string(field, raw).map(Value::String),
            (Target::Timestamp, _) => timestamp(field, raw, data_type),
            (Target::Time, _) => time(field, raw, data_type),
            (Target::Geospatial, RawEntryValue::Geospatial(geo)) => geospatial(field, geo, data_type),
            _ => Err(mismatch(field, raw)),
        }
    }
}

fn unsupported(field: &str, data_type: &DataType) -> ExtractError {
    ExtractError::UnsupportedField {
        field: field.to_string(),
        data_type: data_type.to_string(),
    }
}

fn mismatch(field: &str, raw: &RawEntryValue) -> ExtractError {
    ExtractError::InvalidValue {
        field: field.to_string(),
        reason: format!("cannot convert a {} value", raw.repr()),
    }
}

fn overflow(field: &str, value: &impl ToString, target: &'static str) -> ExtractError {
    ExtractError::Overflow {
        field: field.to_string(),
        value: value.to_string(),
        target,
    }
}

fn integer(raw: &RawEntryValue) -> Option<BigInt> {
    Some(match raw {
        RawEntryValue::Int8(v) => BigInt::from(*v),
        RawEntryValue::Int16(v) => BigInt::from(*v),
        RawEntryValue::Int32(v) => BigInt::from(*v),
        RawEntryValue::Int64(v) => BigInt::from(*v),
        RawEntryValue::BigInt(v) => v.clone(),
        _ => return None,
    })
}

fn float(raw: &RawEntryValue) -> Option<f64> {
    Some(match raw {
        RawEntryValue::Float64(v) => *v,
        RawEntryValue::Float32(v) => f64::from(*v),
        RawEntryValue::Decimal(v) => v.to_f64()?,
        RawEntryValue::Int8(v) => f64::from(*v),
        RawEntryValue::Int16(v) => f64::from(*v),
        RawEntryValue::Int32(v) => f64::from(*v),
        RawEntryValue::Int64(v) => *v as f64,
        _ => return None,
    })
}

/// Floating-point sources are rounded half-to-even to the field precision
/// and then to the field scale; exact sources must already fit. Precision is
/// checked before the value is rescaled.
fn decimal_value(field: &str, raw: &RawEntryValue, data_type: &DataType) -> Result<Value, ExtractError> {
    let (precision, scale) = match data_type {
        DataType::Decimal128(p, s) | DataType::Decimal256(p, s) => (*p, *s),
        other => return Err(unsupported(field, other)),
    };
    let from_float = |v: f64| {
        BigDecimal::from_f64(v)
            .map(|d| {
                decimal::round_to_precision(&d, u64::from(precision))
                    .with_scale_round(i64::from(scale), RoundingMode::HalfEven)
            })
            .ok_or_else(|| ExtractError::InvalidValue {
                field: field.to_string(),
                reason: format!("{v} has no decimal representation"),
            })
    };
    let value = match raw {
        RawEntryValue::Decimal(d) => d.clone(),
        RawEntryValue::Float64(v) => from_float(*v)?,
        RawEntryValue::Float32(v) => from_float(f64::from(*v))?,
        other => BigDecimal::new(integer(other).ok_or_else(|| mismatch(field, other))?, 0),
    };

    let actual_scale = decimal::scale(&value);
    if actual_scale > i64::from(scale) {
        return Err(ExtractError::ScaleExceeded {
            field: field.to_string(),
            actual: actual_scale,
            expected: scale,
        });
    }
    if value.is_zero() {
        return Ok(Value::Decimal(BigInt::zero().to_signed_bytes_be()));
    }
    let digits = decimal::integer_digits(&value).saturating_add(i64::from(scale));
    if digits > i64::from(precision) {
        return Err(ExtractError::PrecisionExceeded {
            field: field.to_string(),
            actual: u64::try_from(digits).unwrap_or(u64::MAX),
            expected: precision,
        });
    }
    // Only pads with zeros: the target scale is never below the value's.
    let value = value.with_scale(i64::from(scale));
    Ok(Value::Decimal(decimal::to_be_bytes(&value)))
}

fn string(field: &str, raw: &RawEntryValue) -> Result<String, ExtractError> {
    Ok(match raw {
        RawEntryValue::String(s) => s.clone(),
        RawEntryValue::Guid(g) => g.hyphenated().to_string(),
        RawEntryValue::DateTime(dt) => temporal::format_date_time_offset(dt),
        RawEntryValue::Timestamp(ts) => {
            temporal::format_date_time_offset(&ts.and_utc().fixed_offset())
        }
        RawEntryValue::Decimal(seconds) => temporal::format_duration(seconds),
        other => return Err(mismatch(field, other)),
    })
}

fn time_unit(field: &str, data_type: &DataType) -> Result<TimeUnit, ExtractError> {
    match data_type {
        DataType::Timestamp(unit, _) | DataType::Time32(unit) | DataType::Time64(unit) => {
            Ok(*unit)
        }
        other => Err(unsupported(field, other)),
    }
}

fn timestamp(field: &str, raw: &RawEntryValue, data_type: &DataType) -> Result<Value, ExtractError> {
    let unit = time_unit(field, data_type)?;
    let converted = match raw {
        RawEntryValue::DateTime(dt) => temporal::instant_to_unit(dt.with_timezone(&Utc), unit),
        RawEntryValue::Instant(instant) => temporal::instant_to_unit(*instant, unit),
        RawEntryValue::Timestamp(ts) => temporal::instant_to_unit(ts.and_utc(), unit),
        RawEntryValue::Int64(millis) => temporal::millis_to_unit(*millis, unit),
        other => return Err(mismatch(field, other)),
    };
    converted
        .map(Value::Timestamp)
        .ok_or_else(|| overflow(field, &format!("{raw:?}"), "timestamp"))
}

fn time(field: &str, raw: &RawEntryValue, data_type: &DataType) -> Result<Value, ExtractError> {
    let unit = time_unit(field, data_type)?;
    let of_day = match raw {
        RawEntryValue::DateTime(dt) => dt.with_timezone(&Utc).time(),
        RawEntryValue::Instant(instant) => instant.time(),
        RawEntryValue::Timestamp(ts) => ts.time(),
        RawEntryValue::Time(t) => *t,
        RawEntryValue::Int64(millis) => {
            if !(0..MILLIS_PER_DAY).contains(millis) {
                return Err(ExtractError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("{millis} ms is not a time of day"),
                });
            }
            let value = temporal::millis_to_unit(*millis, unit)
                .ok_or_else(|| overflow(field, millis, "time"))?;
            return fit_time(field, value, data_type);
        }
        other => return Err(mismatch(field, other)),
    };
    fit_time(field, temporal::time_to_unit(of_day, unit), data_type)
}

fn fit_time(field: &str, value: i64, data_type: &DataType) -> Result<Value, ExtractError> {
    if matches!(data_type, DataType::Time32(_)) && i32::try_from(value).is_err() {
        return Err(overflow(field, &value, "time32"));
    }
    Ok(Value::Time(value))
}

fn geospatial(field: &str, geo: &Geospatial, data_type: &DataType) -> Result<Value, ExtractError> {
    let RecordShape::Geo(expected) = RecordShape::of(data_type) else {
        return Err(unsupported(field, data_type));
    };
    let actual = geo.shape.kind();
    // LineString and MultiPoint share one shape.
    let compatible = actual == expected
        || (expected == GeoKind::LineString && actual == GeoKind::MultiPoint);
    if !compatible {
        return Err(ExtractError::InvalidValue {
            field: field.to_string(),
            reason: format!(
                "expected a {} geometry but found a {}",
                expected.type_name(),
                actual.type_name()
            ),
        });
    }
    shape_record(field, geo.dimension, &geo.shape).map(Value::Record)
}

fn point_record(dimension: Dimension, point: &Point) -> Record {
    Record::new()
        .with(schema::GEO_DIMENSION, dimension.as_str())
        .with(schema::POINT_X, point.x)
        .with(schema::POINT_Y, point.y)
        .with(schema::POINT_Z, point.z.unwrap_or(0.0))
}

fn points(dimension: Dimension, points: &[Point]) -> Value {
    Value::List(
        points
            .iter()
            .map(|p| Value::Record(point_record(dimension, p)))
            .collect(),
    )
}

fn header(kind: GeoKind, dimension: Dimension) -> Record {
    Record::new()
        .with(schema::GEO_TYPE, kind.type_name())
        .with(schema::GEO_DIMENSION, dimension.as_str())
}

fn polygon_record(field: &str, dimension: Dimension, polygon: &Polygon) -> Result<Record, ExtractError> {
    let rings = i32::try_from(polygon.interiors.len())
        .map_err(|_| overflow(field, &polygon.interiors.len(), "int32"))?;
    let interior: Vec<Point> = polygon.interiors.iter().flatten().copied().collect();
    Ok(header(GeoKind::Polygon, dimension)
        .with(schema::POLYGON_EXTERIOR, points(dimension, &polygon.exterior))
        .with(schema::POLYGON_INTERIOR, points(dimension, &interior))
        .with(schema::POLYGON_INTERIOR_RINGS, rings))
}

fn records(items: Vec<Record>) -> Value {
    Value::List(items.into_iter().map(Value::Record).collect())
}

fn shape_record(field: &str, dimension: Dimension, shape: &Shape) -> Result<Record, ExtractError> {
    let kind = shape.kind();
    Ok(match shape {
        Shape::Point(p) => point_record(dimension, p),
        Shape::LineString(line) | Shape::MultiPoint(line) => {
            header(kind, dimension).with(schema::GEO_COORDINATES, points(dimension, line))
        }
        Shape::Polygon(polygon) => polygon_record(field, dimension, polygon)?,
        Shape::MultiLineString(lines) => {
            let lines = lines
                .iter()
                .map(|line| {
                    header(GeoKind::LineString, dimension)
                        .with(schema::GEO_COORDINATES, points(dimension, line))
                })
                .collect();
            header(kind, dimension).with(schema::GEO_COORDINATES, records(lines))
        }
        Shape::MultiPolygon(polygons) => {
            let polygons = polygons
                .iter()
                .map(|p| polygon_record(field, dimension, p))
                .collect::<Result<Vec<_>, _>>()?;
            header(kind, dimension).with(schema::GEO_COORDINATES, records(polygons))
        }
        Shape::Collection(members) => collection_record(field, dimension, members)?,
    })
}

fn collection_record(
    field: &str,
    dimension: Dimension,
    members: &[Shape],
) -> Result<Record, ExtractError> {
    let mut groups: [Vec<Record>; 6] = Default::default();
    for member in members {
        let slot = match member.kind() {
            GeoKind::Point => 0,
            GeoKind::LineString => 1,
            GeoKind::Polygon => 2,
            GeoKind::MultiPoint => 3,
            GeoKind::MultiLineString => 4,
            GeoKind::MultiPolygon => 5,
            GeoKind::Collection => {
                return Err(ExtractError::InvalidValue {
                    field: field.to_string(),
                    reason: "nested geometry collections are not supported".into(),
                });
            }
        };
        groups[slot].push(shape_record(field, dimension, member)?);
    }
    let [pts, lines, polygons, multi_points, multi_lines, multi_polygons] = groups;
    Ok(header(GeoKind::Collection, dimension)
        .with(schema::COLLECTION_POINTS, records(pts))
        .with(schema::COLLECTION_LINE_STRINGS, records(lines))
        .with(schema::COLLECTION_POLYGONS, records(polygons))
        .with(schema::COLLECTION_MULTI_POINTS, records(multi_points))
        .with(schema::COLLECTION_MULTI_LINE_STRINGS, records(multi_lines))
        .with(schema::COLLECTION_MULTI_POLYGONS, records(multi_polygons)))
}

/// Reshape a value tree to `field`: struct fields are picked by name in
/// schema order, missing ones become null.
fn conform(path: &str, value: Value, field: &Field) -> Result<Value, ExtractError> {
    match (value, field.data_type()) {
        (Value::Null, _) if field.is_nullable() => Ok(Value::Null),
        (Value::Null, _) => Err(ExtractError::NullValue {
            field: path.to_string(),
        }),
        (Value::Record(mut record), DataType::Struct(fields)) => {
            conform_record(path, &mut record, fields).map(Value::Record)
        }
        (Value::List(items), DataType::List(item)) => items
            .into_iter()
            .map(|v| conform(path, v, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        (value, _) => Ok(value),
    }
}

fn conform_record(path: &str, record: &mut Record, fields: &Fields) -> Result<Record, ExtractError> {
    let mut out = Record::new();
    for field in fields {
        let value = record.take(field.name()).unwrap_or(Value::Null);
        let child = format!("{path}.{}", field.name());
        out.push(field.name().as_str(), conform(&child, value, field)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::datatypes::Schema;
    use chrono::{FixedOffset, NaiveDate, NaiveTime, TimeZone};
    use uuid::Uuid;

    use super::*;
    use crate::annotation::{Annotation, Expression};
    use crate::catalog::{time_type, timestamp_type};
    use crate::infer::infer_schema;
    use crate::raw::MediaLink;

    fn transformer(fields: Vec<Field>, version: ODataVersion) -> EntryTransformer {
        EntryTransformer::new(Arc::new(Schema::new(fields)), version)
    }

    fn extract_one(
        data_type: DataType,
        value: RawEntryValue,
        version: ODataVersion,
    ) -> Result<Value, ExtractError> {
        let t = transformer(vec![Field::new("f", data_type, true)], version);
        let record = t.transform(&Entry::new().with("f", value))?;
        Ok(record.get("f").cloned().unwrap_or(Value::Null))
    }

    fn dec(s: &str) -> RawEntryValue {
        RawEntryValue::Decimal(s.parse().unwrap())
    }

    #[test]
    fn decimal_is_rescaled_to_schema_scale() {
        let value = extract_one(DataType::Decimal128(4, 2), dec("12.34"), ODataVersion::V4).unwrap();
        assert_eq!(value, Value::Decimal(BigInt::from(1234).to_signed_bytes_be()));
        let padded = extract_one(DataType::Decimal128(4, 2), dec("1.5"), ODataVersion::V2).unwrap();
        assert_eq!(padded, Value::Decimal(BigInt::from(150).to_signed_bytes_be()));
    }

    #[test]
    fn decimal_scale_and_precision_are_enforced() {
        let err = extract_one(DataType::Decimal128(4, 2), dec("123.456"), ODataVersion::V4).unwrap_err();
        assert!(matches!(err, ExtractError::ScaleExceeded { actual: 3, expected: 2, .. }));
        let err = extract_one(DataType::Decimal128(4, 2), dec("123.45"), ODataVersion::V4).unwrap_err();
        assert!(matches!(err, ExtractError::PrecisionExceeded { actual: 5, expected: 4, .. }));
    }

    #[test]
    fn wide_decimals_keep_every_digit() {
        let value = extract_one(
            DataType::Decimal128(22, 2),
            dec("12345678901234567890.12"),
            ODataVersion::V4,
        )
        .unwrap();
        let expected: BigInt = "1234567890123456789012".parse().unwrap();
        assert_eq!(value, Value::Decimal(expected.to_signed_bytes_be()));
    }

    #[test]
    fn huge_exponent_fails_before_rescaling() {
        let huge = RawEntryValue::Decimal(BigDecimal::new(BigInt::from(1), -50_000_000));
        let err = extract_one(DataType::Decimal128(38, 2), huge, ODataVersion::V4).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::PrecisionExceeded { actual: 50_000_003, expected: 38, .. }
        ));
        let zero = RawEntryValue::Decimal(BigDecimal::new(BigInt::from(0), -50_000_000));
        let value = extract_one(DataType::Decimal128(38, 2), zero, ODataVersion::V4).unwrap();
        assert_eq!(value, Value::Decimal(BigInt::from(0).to_signed_bytes_be()));
    }

    #[test]
    fn float_decimals_round_half_even() {
        let value = extract_one(
            DataType::Decimal128(4, 2),
            RawEntryValue::Float64(12.34),
            ODataVersion::V4,
        )
        .unwrap();
        assert_eq!(value, Value::Decimal(BigInt::from(1234).to_signed_bytes_be()));
        let value = extract_one(
            DataType::Decimal128(4, 2),
            RawEntryValue::Float64(0.125),
            ODataVersion::V4,
        )
        .unwrap();
        assert_eq!(value, Value::Decimal(BigInt::from(12).to_signed_bytes_be()));
        assert!(matches!(
            extract_one(DataType::Decimal128(4, 2), RawEntryValue::Float64(f64::NAN), ODataVersion::V4),
            Err(ExtractError::InvalidValue { .. })
        ));
    }

    #[test]
    fn integers_widen_and_narrow_checked() {
        assert_eq!(
            extract_one(DataType::Int64, RawEntryValue::Int16(7), ODataVersion::V2).unwrap(),
            Value::Int64(7)
        );
        assert_eq!(
            extract_one(DataType::Int32, RawEntryValue::Int64(-5), ODataVersion::V2).unwrap(),
            Value::Int32(-5)
        );
        let err = extract_one(DataType::Int32, RawEntryValue::Int64(1 << 40), ODataVersion::V2)
            .unwrap_err();
        assert!(matches!(err, ExtractError::Overflow { target: "int32", .. }));
        let big = RawEntryValue::BigInt(BigInt::from(i64::MAX) * 4);
        assert!(matches!(
            extract_one(DataType::Int64, big, ODataVersion::V4),
            Err(ExtractError::Overflow { target: "int64", .. })
        ));
    }

    #[test]
    fn type_mismatch_names_field_and_representations() {
        let err = extract_one(DataType::Boolean, "yes".into(), ODataVersion::V4).unwrap_err();
        match err {
            ExtractError::TypeMismatch {
                field,
                expected,
                actual,
            } => {
                assert_eq!(field, "f");
                assert_eq!(expected, "boolean");
                assert_eq!(actual, "string");
            }
            other => panic!("unexpected error: {other}"),
        }
        // big integers only reach int32 through the v4 client
        let big = RawEntryValue::BigInt(BigInt::from(3));
        assert!(matches!(
            extract_one(DataType::Int32, big.clone(), ODataVersion::V2),
            Err(ExtractError::TypeMismatch { .. })
        ));
        assert_eq!(
            extract_one(DataType::Int32, big, ODataVersion::V4).unwrap(),
            Value::Int32(3)
        );
    }

    #[test]
    fn timestamps_truncate_to_unit() {
        let ts = NaiveDate::from_ymd_opt(1970, 1, 1)
            .unwrap()
            .and_hms_nano_opt(0, 0, 1, 123_456_789)
            .unwrap();
        let micros = extract_one(
            timestamp_type(TimeUnit::Microsecond),
            RawEntryValue::Timestamp(ts),
            ODataVersion::V4,
        )
        .unwrap();
        assert_eq!(micros, Value::Timestamp(1_123_456));
        let millis = extract_one(
            timestamp_type(TimeUnit::Millisecond),
            RawEntryValue::Instant(ts.and_utc()),
            ODataVersion::V2,
        )
        .unwrap();
        assert_eq!(millis, Value::Timestamp(1_123));
    }

    #[test]
    fn v2_epoch_millis_convert_to_micros() {
        let value = extract_one(
            timestamp_type(TimeUnit::Microsecond),
            RawEntryValue::Int64(1_500),
            ODataVersion::V2,
        )
        .unwrap();
        assert_eq!(value, Value::Timestamp(1_500_000));
        assert!(matches!(
            extract_one(
                timestamp_type(TimeUnit::Microsecond),
                RawEntryValue::Int64(i64::MAX),
                ODataVersion::V2
            ),
            Err(ExtractError::Overflow { .. })
        ));
        assert!(matches!(
            extract_one(
                timestamp_type(TimeUnit::Microsecond),
                RawEntryValue::Int64(0),
                ODataVersion::V4
            ),
            Err(ExtractError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn time_of_day_is_utc_normalized() {
        let offset = FixedOffset::east_opt(3600).unwrap();
        let calendar = offset.with_ymd_and_hms(2020, 5, 6, 10, 30, 0).unwrap();
        let value = extract_one(
            time_type(TimeUnit::Microsecond),
            RawEntryValue::DateTime(calendar),
            ODataVersion::V4,
        )
        .unwrap();
        assert_eq!(value, Value::Time((9 * 3600 + 30 * 60) * 1_000_000));

        let time = NaiveTime::from_hms_milli_opt(0, 0, 2, 5).unwrap();
        let value = extract_one(
            time_type(TimeUnit::Millisecond),
            RawEntryValue::Time(time),
            ODataVersion::V2,
        )
        .unwrap();
        assert_eq!(value, Value::Time(2_005));

        let value = extract_one(
            time_type(TimeUnit::Microsecond),
            RawEntryValue::Int64(2_005),
            ODataVersion::V2,
        )
        .unwrap();
        assert_eq!(value, Value::Time(2_005_000));
        assert!(matches!(
            extract_one(
                time_type(TimeUnit::Millisecond),
                RawEntryValue::Int64(MILLIS_PER_DAY),
                ODataVersion::V2
            ),
            Err(ExtractError::InvalidValue { .. })
        ));
    }

    #[test]
    fn strings_use_canonical_forms() {
        let guid = Uuid::parse_str("A1B2C3D4-0000-1111-2222-333344445555").unwrap();
        assert_eq!(
            extract_one(DataType::Utf8, RawEntryValue::Guid(guid), ODataVersion::V2).unwrap(),
            Value::from("a1b2c3d4-0000-1111-2222-333344445555")
        );
        let offset = FixedOffset::west_opt(7 * 3600).unwrap();
        let calendar = offset.with_ymd_and_hms(2020, 1, 1, 8, 0, 0).unwrap();
        assert_eq!(
            extract_one(DataType::Utf8, RawEntryValue::DateTime(calendar), ODataVersion::V4)
                .unwrap(),
            Value::from("2020-01-01T08:00:00-07:00")
        );
        assert_eq!(
            extract_one(DataType::Utf8, dec("3661"), ODataVersion::V4).unwrap(),
            Value::from("PT1H1M1S")
        );
        assert!(matches!(
            extract_one(DataType::Utf8, dec("1"), ODataVersion::V2),
            Err(ExtractError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn null_handling_follows_nullability() {
        let t = transformer(
            vec![
                Field::new("opt", DataType::Utf8, true),
                Field::new("req", DataType::Utf8, false),
            ],
            ODataVersion::V4,
        );
        let record = t
            .transform(&Entry::new().with("req", "x").with("opt", RawEntryValue::Null))
            .unwrap();
        assert_eq!(record.get("opt"), Some(&Value::Null));
        let err = t.transform(&Entry::new().with("opt", "y")).unwrap_err();
        assert!(matches!(err, ExtractError::NullValue { field } if field == "req"));
    }

    #[test]
    fn line_string_and_multi_point_differ_by_type() {
        let pts = vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)];
        let line = RawEntryValue::Geospatial(Geospatial::new(
            Dimension::Geography,
            Shape::LineString(pts.clone()),
        ));
        let multi = RawEntryValue::Geospatial(Geospatial::new(
            Dimension::Geography,
            Shape::MultiPoint(pts),
        ));
        let shape = schema::line_string_type();
        let a = extract_one(shape.clone(), line, ODataVersion::V4).unwrap();
        let b = extract_one(shape, multi, ODataVersion::V4).unwrap();
        let type_of = |v: &Value| v.as_record().and_then(|r| r.get("type")).cloned();
        assert_eq!(type_of(&a), Some(Value::from("LineString")));
        assert_eq!(type_of(&b), Some(Value::from("MultiPoint")));
        let coords = |v: &Value| v.as_record().and_then(|r| r.get("coordinates")).cloned();
        assert_eq!(coords(&a), coords(&b));
    }

    #[test]
    fn polygon_concatenates_interior_rings() {
        let ring = |x: f64| vec![Point::new(x, x), Point::new(x + 1.0, x)];
        let polygon = Polygon {
            exterior: ring(0.0),
            interiors: vec![ring(10.0), ring(20.0)],
        };
        let raw = RawEntryValue::Geospatial(Geospatial::new(
            Dimension::Geometry,
            Shape::Polygon(polygon),
        ));
        let value = extract_one(schema::polygon_type(), raw, ODataVersion::V4).unwrap();
        let record = value.as_record().unwrap();
        assert_eq!(record.get("numberOfInteriorRings"), Some(&Value::Int32(2)));
        assert_eq!(record.get("dimension"), Some(&Value::from("GEOMETRY")));
        assert!(matches!(record.get("interior"), Some(Value::List(points)) if points.len() == 4));
    }

    #[test]
    fn point_z_defaults_to_zero() {
        let raw = RawEntryValue::Geospatial(Geospatial::new(
            Dimension::Geography,
            Shape::Point(Point::new(1.5, -2.0)),
        ));
        let value = extract_one(schema::point_type(), raw, ODataVersion::V4).unwrap();
        let record = value.as_record().unwrap();
        assert_eq!(record.get("z"), Some(&Value::Float64(0.0)));
        assert_eq!(record.get("dimension"), Some(&Value::from("GEOGRAPHY")));
    }

    #[test]
    fn point_with_nullable_members_is_still_a_point() {
        let relaxed = DataType::Struct(Fields::from(vec![
            Field::new("dimension", DataType::Utf8, false),
            Field::new("x", DataType::Float64, false),
            Field::new("y", DataType::Float64, false),
            Field::new("z", DataType::Float64, true),
        ]));
        let raw = RawEntryValue::Geospatial(Geospatial::new(
            Dimension::Geometry,
            Shape::Point(Point::new(3.0, 4.0)),
        ));
        let value = extract_one(relaxed, raw, ODataVersion::V4).unwrap();
        let record = value.as_record().unwrap();
        assert_eq!(record.get("x"), Some(&Value::Float64(3.0)));
        assert_eq!(record.get("dimension"), Some(&Value::from("GEOMETRY")));
    }

    #[test]
    fn collections_group_members_and_reject_nesting() {
        let collection = Shape::Collection(vec![
            Shape::Point(Point::new(0.0, 0.0)),
            Shape::MultiPoint(vec![Point::new(1.0, 1.0)]),
            Shape::Point(Point::new(2.0, 2.0)),
        ]);
        let raw = RawEntryValue::Geospatial(Geospatial::new(Dimension::Geometry, collection.clone()));
        let value = extract_one(schema::collection_type(), raw, ODataVersion::V4).unwrap();
        let record = value.as_record().unwrap();
        assert_eq!(record.get("type"), Some(&Value::from("GeometryCollection")));
        assert!(matches!(record.get("points"), Some(Value::List(p)) if p.len() == 2));
        assert!(matches!(record.get("multiPoints"), Some(Value::List(p)) if p.len() == 1));
        assert!(matches!(record.get("polygons"), Some(Value::List(p)) if p.is_empty()));

        let nested = Shape::Collection(vec![collection]);
        let raw = RawEntryValue::Geospatial(Geospatial::new(Dimension::Geometry, nested));
        assert!(matches!(
            extract_one(schema::collection_type(), raw, ODataVersion::V4),
            Err(ExtractError::InvalidValue { .. })
        ));
    }

    #[test]
    fn stream_links_are_merged() {
        let t = transformer(
            vec![Field::new("Photo", schema::stream_type(), true)],
            ODataVersion::V4,
        );
        let mut edit = MediaLink::new("Photo", LinkKind::Edit, "Photos(1)/$value");
        edit.etag = Some("W/\"1\"".into());
        let read = MediaLink {
            content_type: Some("image/png".into()),
            ..MediaLink::new("Photo", LinkKind::Read, "https://cdn/photo.png")
        };
        let record = t
            .transform(&Entry::new().with_link(read).with_link(edit))
            .unwrap();
        let photo = record.get("Photo").and_then(Value::as_record).unwrap();
        assert_eq!(photo.get("mediaReadLink"), Some(&Value::from("https://cdn/photo.png")));
        assert_eq!(photo.get("mediaEditLink"), Some(&Value::from("Photos(1)/$value")));
        assert_eq!(photo.get("mediaContentType"), Some(&Value::from("image/png")));
        assert_eq!(photo.get("mediaEtag"), Some(&Value::from("W/\"1\"")));

        let empty = t.transform(&Entry::new()).unwrap();
        assert_eq!(empty.get("Photo"), Some(&Value::Null));
    }

    #[test]
    fn wrapped_fields_carry_annotations() {
        let props = vec![
            EdmProperty::new("Price", "Edm.Double").with_annotations(PropertyAnnotations::V4(
                vec![Annotation::new("Common.Label", Expression::string("Unit price"))],
            )),
            EdmProperty::new("Name", "Edm.String").with_annotations(PropertyAnnotations::V2(
                vec![("sap:label".into(), "Name".into())],
            )),
        ];
        let schema = Arc::new(infer_schema(&props, &[], true).unwrap());
        let t = EntryTransformer::new(schema, ODataVersion::V4).with_annotations(&props);
        let record = t
            .transform(&Entry::new().with("Price", 9.5).with("Name", "Widget"))
            .unwrap();

        let price = record.get("Price").and_then(Value::as_record).unwrap();
        assert_eq!(price.get("value"), Some(&Value::Float64(9.5)));
        let label = price
            .get("metadata-annotations")
            .and_then(Value::as_record)
            .and_then(|m| m.get("common_label"))
            .and_then(Value::as_record)
            .unwrap();
        assert_eq!(label.get("term"), Some(&Value::from("Common.Label")));
        let expression = label.get("expression").and_then(Value::as_record).unwrap();
        assert_eq!(expression.get("value"), Some(&Value::from("Unit price")));

        let name = record.get("Name").and_then(Value::as_record).unwrap();
        let metadata = name.get("metadata-annotations").and_then(Value::as_record).unwrap();
        assert_eq!(metadata.get("sap_label"), Some(&Value::from("Name")));
    }

    #[test]
    fn missing_required_annotation_value_fails() {
        let props = vec![EdmProperty::new("Price", "Edm.Double").with_annotations(
            PropertyAnnotations::V4(vec![Annotation::new("Common.Label", Expression::Null)]),
        )];
        let schema = Arc::new(infer_schema(&props, &[], true).unwrap());
        // no annotation source registered
        let t = EntryTransformer::new(schema, ODataVersion::V4);
        let err = t.transform(&Entry::new().with("Price", 1.0)).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::NullValue { field } if field == "Price.metadata-annotations.common_label"
        ));
    }

    #[test]
    fn unsupported_output_type_is_reported() {
        let err = extract_one(DataType::Utf8View, "x".into(), ODataVersion::V4).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedField { .. }));
    }
}

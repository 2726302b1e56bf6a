//! OData JSON payloads decoded into [`Entry`] values.
//!
//! Each JSON value is decoded into the raw representation its EDM type calls
//! for, so the extraction engine sees the same values a typed protocol client
//! would hand over. Accepts v4 `{"value": [...]}` collections, v2 verbose
//! `{"d": {"results": [...]}}` / `{"d": [...]}` collections, single entities
//! and bare arrays.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc};
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use serde_json::{Map, Value as Json};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::catalog::{Dimension, EdmType};
use crate::decimal;
use crate::error::JsonError;
use crate::metadata::MetadataDocument;
use crate::protocol::ODataVersion;
use crate::raw::{Entry, Geospatial, LinkKind, MediaLink, Point, Polygon, RawEntryValue, Shape};

const SECONDS_PER_DAY: i64 = 86_400;

type Object = Map<String, Json>;

/// Decodes entity payloads against one entity type's metadata.
#[derive(Debug, Clone)]
pub struct EntryReader {
    version: ODataVersion,
    properties: Vec<(String, EdmType)>,
}

impl EntryReader {
    /// Properties of unrecognized EDM types are skipped.
    pub fn new(metadata: &MetadataDocument) -> Self {
        let properties = metadata
            .properties
            .iter()
            .filter_map(|p| match p.edm_type_name.parse::<EdmType>() {
                Ok(edm_type) => Some((p.name.clone(), edm_type)),
                Err(e) => {
                    warn!(property = %p.name, error = %e, "skipping property");
                    None
                }
            })
            .collect();
        Self {
            version: metadata.version,
            properties,
        }
    }

    pub fn read(&self, payload: &str) -> Result<Vec<Entry>, JsonError> {
        let json: Json = serde_json::from_str(payload)?;
        let entries = entity_objects(&json)?
            .into_iter()
            .map(|object| self.entry(object))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(entries = entries.len(), version = %self.version, "decoded JSON payload");
        Ok(entries)
    }

    /// Decode one entity object. Properties missing from the object stay
    /// absent; JSON nulls become [`RawEntryValue::Null`].
    pub fn entry(&self, object: &Object) -> Result<Entry, JsonError> {
        let mut entry = Entry::new();
        for (name, edm_type) in &self.properties {
            if *edm_type == EdmType::Stream {
                for link in media_links(name, object) {
                    entry.push_link(link);
                }
                continue;
            }
            if let Some(json) = object.get(name) {
                entry.insert(name.as_str(), decode(name, *edm_type, json)?);
            }
        }
        Ok(entry)
    }
}

fn payload_error(reason: &str) -> JsonError {
    JsonError::Payload(reason.to_string())
}

fn entity_objects(json: &Json) -> Result<Vec<&Object>, JsonError> {
    let items: &[Json] = match json {
        Json::Array(items) => items,
        Json::Object(object) => match (object.get("value"), object.get("d")) {
            (Some(Json::Array(items)), _) => items,
            (_, Some(Json::Array(items))) => items,
            (_, Some(Json::Object(d))) => match d.get("results") {
                Some(Json::Array(items)) => items,
                _ => return Ok(vec![d]),
            },
            (_, Some(_)) => return Err(payload_error("'d' must be an object or an array")),
            _ => return Ok(vec![object]),
        },
        _ => return Err(payload_error("expected a JSON object or array")),
    };
    items
        .iter()
        .map(|item| {
            item.as_object()
                .ok_or_else(|| payload_error("entries must be JSON objects"))
        })
        .collect()
}

/// Media link annotations of a stream property, e.g. `Photo@odata.mediaReadLink`.
fn media_links(property: &str, object: &Object) -> Vec<MediaLink> {
    let annotation = |term: &str| {
        object
            .get(&format!("{property}@odata.{term}"))
            .or_else(|| object.get(&format!("{property}@{term}")))
            .and_then(Json::as_str)
            .map(str::to_string)
    };
    let mut links = Vec::new();
    if let Some(href) = annotation("mediaReadLink") {
        links.push(MediaLink::new(property, LinkKind::Read, href));
    }
    if let Some(href) = annotation("mediaEditLink") {
        links.push(MediaLink::new(property, LinkKind::Edit, href));
    }
    let content_type = annotation("mediaContentType");
    let etag = annotation("mediaEtag");
    if content_type.is_some() || etag.is_some() {
        links.push(MediaLink {
            property: property.to_string(),
            content_type,
            etag,
            ..MediaLink::default()
        });
    }
    links
}

fn decode(property: &str, edm_type: EdmType, json: &Json) -> Result<RawEntryValue, JsonError> {
    if json.is_null() {
        return Ok(RawEntryValue::Null);
    }
    decode_literal(edm_type, json).map_err(|reason| JsonError::InvalidLiteral {
        property: property.to_string(),
        edm_type: edm_type.to_string(),
        reason,
    })
}

fn text(json: &Json) -> Result<&str, String> {
    json.as_str()
        .ok_or_else(|| format!("expected a string, found {json}"))
}

fn decode_literal(edm_type: EdmType, json: &Json) -> Result<RawEntryValue, String> {
    let value = match edm_type {
        EdmType::Boolean => RawEntryValue::Boolean(
            json.as_bool()
                .ok_or_else(|| format!("expected a boolean, found {json}"))?,
        ),
        EdmType::Byte | EdmType::Int16 => {
            RawEntryValue::Int16(narrow(json, |n| n.to_i16())?)
        }
        EdmType::SByte => RawEntryValue::Int8(narrow(json, |n| n.to_i8())?),
        EdmType::Int32 => RawEntryValue::Int32(narrow(json, |n| n.to_i32())?),
        EdmType::Int64 => {
            let n = integer(json)?;
            match n.to_i64() {
                Some(v) => RawEntryValue::Int64(v),
                None => RawEntryValue::BigInt(n),
            }
        }
        EdmType::Single => RawEntryValue::Float32(float(json)? as f32),
        EdmType::Double => RawEntryValue::Float64(float(json)?),
        EdmType::Decimal => RawEntryValue::Decimal(decimal_literal(json)?),
        EdmType::String => RawEntryValue::String(text(json)?.to_string()),
        EdmType::Guid => RawEntryValue::Guid(
            Uuid::parse_str(text(json)?).map_err(|e| e.to_string())?,
        ),
        EdmType::Binary => {
            RawEntryValue::Bytes(STANDARD.decode(text(json)?).map_err(|e| e.to_string())?)
        }
        EdmType::DateTime => date_time(text(json)?)?,
        EdmType::DateTimeOffset => RawEntryValue::DateTime(date_time_offset(text(json)?)?),
        EdmType::Date => {
            let date = NaiveDate::parse_from_str(text(json)?, "%Y-%m-%d").map_err(|e| e.to_string())?;
            RawEntryValue::DateTime(date.and_time(NaiveTime::MIN).and_utc().fixed_offset())
        }
        EdmType::Time => {
            let literal = text(json)?;
            let time = IsoDuration::parse(literal)
                .and_then(|d| d.time_of_day())
                .ok_or_else(|| format!("'{literal}' is not a time of day"))?;
            RawEntryValue::Time(time)
        }
        EdmType::TimeOfDay => {
            let literal = text(json)?;
            let time = NaiveTime::parse_from_str(literal, "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(literal, "%H:%M"))
                .map_err(|e| e.to_string())?;
            RawEntryValue::Time(time)
        }
        EdmType::Duration => {
            let literal = text(json)?;
            let seconds = IsoDuration::parse(literal)
                .and_then(|d| d.seconds())
                .ok_or_else(|| format!("'{literal}' is not an ISO-8601 duration"))?;
            RawEntryValue::Decimal(seconds)
        }
        EdmType::Geo(dimension, _) => RawEntryValue::Geospatial(geospatial(dimension, json)?),
        // Stream content is never inlined; only its links are read.
        EdmType::Stream => RawEntryValue::Null,
    };
    Ok(value)
}

fn integer(json: &Json) -> Result<BigInt, String> {
    let parsed = match json {
        Json::Number(n) => n.to_string().parse().ok(),
        Json::String(s) => s.trim_end_matches(['L', 'l']).parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| format!("expected an integer, found {json}"))
}

fn narrow<T>(json: &Json, fit: impl Fn(&BigInt) -> Option<T>) -> Result<T, String> {
    let n = integer(json)?;
    fit(&n).ok_or_else(|| format!("{n} is out of range"))
}

fn float(json: &Json) -> Result<f64, String> {
    let parsed = match json {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => match s.as_str() {
            "INF" => Some(f64::INFINITY),
            "-INF" => Some(f64::NEG_INFINITY),
            "NaN" => Some(f64::NAN),
            other => other.trim_end_matches(['d', 'D', 'f', 'F']).parse().ok(),
        },
        _ => None,
    };
    parsed.ok_or_else(|| format!("expected a number, found {json}"))
}

/// Numbers keep their literal text, so no digit passes through `f64`.
fn decimal_literal(json: &Json) -> Result<BigDecimal, String> {
    let literal = match json {
        Json::Number(n) => n.to_string(),
        Json::String(s) => s.trim_end_matches(['m', 'M']).to_string(),
        other => return Err(format!("expected a decimal, found {other}")),
    };
    decimal::parse(&literal).map_err(|e| e.to_string())
}

/// `/Date(<millis>[(+|-)<offset minutes>])/`
fn ms_date(literal: &str) -> Option<(DateTime<Utc>, Option<FixedOffset>)> {
    let body = literal.strip_prefix("/Date(")?.strip_suffix(")/")?;
    let (millis, offset) = match body.get(1..)?.find(['+', '-']) {
        Some(pos) => {
            let (millis, offset) = body.split_at(pos + 1);
            let minutes: i32 = offset.parse().ok()?;
            (millis, Some(FixedOffset::east_opt(minutes.checked_mul(60)?)?))
        }
        None => (body, None),
    };
    let instant = DateTime::from_timestamp_millis(millis.parse().ok()?)?;
    Some((instant, offset))
}

/// v2 `Edm.DateTime`: a UTC instant in `/Date()/` form, or an ISO literal.
fn date_time(literal: &str) -> Result<RawEntryValue, String> {
    if let Some((instant, _)) = ms_date(literal) {
        return Ok(RawEntryValue::Instant(instant));
    }
    if let Ok(value) = DateTime::parse_from_rfc3339(literal) {
        return Ok(RawEntryValue::DateTime(value));
    }
    NaiveDateTime::parse_from_str(literal, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(literal, "%Y-%m-%dT%H:%M"))
        .map(RawEntryValue::Timestamp)
        .map_err(|e| format!("'{literal}': {e}"))
}

fn date_time_offset(literal: &str) -> Result<DateTime<FixedOffset>, String> {
    if let Some((instant, offset)) = ms_date(literal) {
        let offset = offset.unwrap_or_else(|| Utc.fix());
        return Ok(instant.with_timezone(&offset));
    }
    DateTime::parse_from_rfc3339(literal).map_err(|e| format!("'{literal}': {e}"))
}

/// `[-]P[nD][T[nH][nM][n[.f]S]]`
#[derive(Debug, PartialEq)]
struct IsoDuration<'a> {
    negative: bool,
    whole_seconds: i64,
    fraction: &'a str,
}

impl<'a> IsoDuration<'a> {
    fn parse(literal: &'a str) -> Option<Self> {
        let (negative, rest) = match literal.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, literal),
        };
        let rest = rest.strip_prefix('P')?;
        let (date, time) = match rest.split_once('T') {
            Some((date, time)) => (date, Some(time)),
            None => (rest, None),
        };
        let mut whole_seconds = 0i64;
        if !date.is_empty() {
            let days: i64 = date.strip_suffix('D')?.parse().ok()?;
            whole_seconds = days.checked_mul(SECONDS_PER_DAY)?;
        }
        let mut fraction = "";
        if let Some(mut time) = time {
            if time.is_empty() {
                return None;
            }
            for (designator, factor) in [('H', 3_600i64), ('M', 60)] {
                if let Some(pos) = time.find(designator) {
                    let n: i64 = time[..pos].parse().ok()?;
                    whole_seconds = whole_seconds.checked_add(n.checked_mul(factor)?)?;
                    time = &time[pos + 1..];
                }
            }
            if !time.is_empty() {
                let seconds = time.strip_suffix('S')?;
                let (int, frac) = seconds.split_once('.').unwrap_or((seconds, ""));
                whole_seconds = whole_seconds.checked_add(int.parse().ok()?)?;
                if !frac.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                fraction = frac;
            }
        }
        Some(Self {
            negative,
            whole_seconds,
            fraction,
        })
    }

    fn seconds(&self) -> Option<BigDecimal> {
        let sign = if self.negative { "-" } else { "" };
        let literal = if self.fraction.is_empty() {
            format!("{sign}{}", self.whole_seconds)
        } else {
            format!("{sign}{}.{}", self.whole_seconds, self.fraction)
        };
        decimal::parse(&literal).ok()
    }

    fn time_of_day(&self) -> Option<NaiveTime> {
        if self.negative || !(0..SECONDS_PER_DAY).contains(&self.whole_seconds) {
            return None;
        }
        let digits = &self.fraction[..self.fraction.len().min(9)];
        let nanos: u32 = if digits.is_empty() {
            0
        } else {
            format!("{digits:0<9}").parse().ok()?
        };
        NaiveTime::from_num_seconds_from_midnight_opt(u32::try_from(self.whole_seconds).ok()?, nanos)
    }
}

fn geospatial(dimension: Dimension, json: &Json) -> Result<Geospatial, String> {
    let object = json
        .as_object()
        .ok_or_else(|| format!("expected a GeoJSON object, found {json}"))?;
    let srid = object
        .get("crs")
        .and_then(|crs| crs.pointer("/properties/name"))
        .and_then(Json::as_str)
        .and_then(|name| name.rsplit(':').next())
        .and_then(|code| code.parse().ok());
    Ok(Geospatial {
        dimension,
        srid,
        shape: shape(object)?,
    })
}

fn shape(object: &Object) -> Result<Shape, String> {
    let kind = object
        .get("type")
        .and_then(Json::as_str)
        .ok_or("GeoJSON object without 'type'")?;
    if kind == "GeometryCollection" {
        let members = object
            .get("geometries")
            .and_then(Json::as_array)
            .ok_or("GeometryCollection without 'geometries'")?;
        return members
            .iter()
            .map(|m| {
                m.as_object()
                    .ok_or_else(|| format!("expected a GeoJSON object, found {m}"))
                    .and_then(shape)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Shape::Collection);
    }
    let coordinates = object
        .get("coordinates")
        .ok_or_else(|| format!("{kind} without 'coordinates'"))?;
    let shape = match kind {
        "Point" => Shape::Point(position(coordinates)?),
        "LineString" => Shape::LineString(positions(coordinates)?),
        "MultiPoint" => Shape::MultiPoint(positions(coordinates)?),
        "Polygon" => Shape::Polygon(polygon(coordinates)?),
        "MultiLineString" => Shape::MultiLineString(
            array(coordinates)?
                .iter()
                .map(positions)
                .collect::<Result<_, _>>()?,
        ),
        "MultiPolygon" => Shape::MultiPolygon(
            array(coordinates)?
                .iter()
                .map(polygon)
                .collect::<Result<_, _>>()?,
        ),
        other => return Err(format!("unknown GeoJSON type '{other}'")),
    };
    Ok(shape)
}

fn array(json: &Json) -> Result<&Vec<Json>, String> {
    json.as_array()
        .ok_or_else(|| format!("expected an array, found {json}"))
}

fn position(json: &Json) -> Result<Point, String> {
    let coords = array(json)?;
    let coord = |i: usize| coords.get(i).and_then(Json::as_f64);
    match (coord(0), coord(1)) {
        (Some(x), Some(y)) => Ok(Point { x, y, z: coord(2) }),
        _ => Err(format!("invalid position {json}")),
    }
}

fn positions(json: &Json) -> Result<Vec<Point>, String> {
    array(json)?.iter().map(position).collect()
}

/// First ring is the exterior, the rest are interiors.
fn polygon(json: &Json) -> Result<Polygon, String> {
    let mut rings = array(json)?.iter().map(positions);
    let exterior = rings.next().transpose()?.unwrap_or_default();
    let interiors = rings.collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon {
        exterior,
        interiors,
    })
}

//! EDM type catalog: recognized primitive type names and their canonical Arrow types.
//!
//! OData v2 metadata spells types without a namespace (`Int32`), v4 with the
//! `Edm.` prefix (`Edm.Int32`). Both spellings resolve identically.

use std::fmt;
use std::str::FromStr;

use arrow::datatypes::{
    DECIMAL128_MAX_PRECISION, DECIMAL256_MAX_PRECISION, DataType, TimeUnit,
};
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::schema;

/// Precision used for `Edm.Decimal` properties that carry no precision facet.
pub const DEFAULT_DECIMAL_PRECISION: u32 = 38;

/// Timezone attached to every timestamp column.
pub const UTC: &str = "UTC";

/// Whether a geospatial value lives on the round earth or a flat plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Geography,
    Geometry,
}

impl Dimension {
    /// Literal written to the `dimension` field of geospatial records.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Geography => "GEOGRAPHY",
            Self::Geometry => "GEOMETRY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeoKind {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    Collection,
}

impl GeoKind {
    /// Literal written to the `type` discriminator of geospatial records.
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::LineString => "LineString",
            Self::Polygon => "Polygon",
            Self::MultiPoint => "MultiPoint",
            Self::MultiLineString => "MultiLineString",
            Self::MultiPolygon => "MultiPolygon",
            Self::Collection => "GeometryCollection",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "Point" => Self::Point,
            "LineString" => Self::LineString,
            "Polygon" => Self::Polygon,
            "MultiPoint" => Self::MultiPoint,
            "MultiLineString" => Self::MultiLineString,
            "MultiPolygon" => Self::MultiPolygon,
            "Collection" => Self::Collection,
            _ => return None,
        })
    }
}

/// A recognized EDM primitive type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdmType {
    Binary,
    Boolean,
    Byte,
    SByte,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    Decimal,
    Guid,
    String,
    DateTime,
    DateTimeOffset,
    Time,
    Date,
    Duration,
    TimeOfDay,
    Stream,
    Geo(Dimension, GeoKind),
}

impl FromStr for EdmType {
    type Err = SchemaError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let bare = name.strip_prefix("Edm.").unwrap_or(name);
        let edm_type = match bare {
            "Binary" => Self::Binary,
            "Boolean" => Self::Boolean,
            "Byte" => Self::Byte,
            "SByte" => Self::SByte,
            "Int16" => Self::Int16,
            "Int32" => Self::Int32,
            "Int64" => Self::Int64,
            "Single" => Self::Single,
            "Double" => Self::Double,
            "Decimal" => Self::Decimal,
            "Guid" => Self::Guid,
            "String" => Self::String,
            "DateTime" => Self::DateTime,
            "DateTimeOffset" => Self::DateTimeOffset,
            "Time" => Self::Time,
            "Date" => Self::Date,
            "Duration" => Self::Duration,
            "TimeOfDay" => Self::TimeOfDay,
            "Stream" => Self::Stream,
            other => {
                let geo = other
                    .strip_prefix("Geography")
                    .map(|kind| (Dimension::Geography, kind))
                    .or_else(|| other.strip_prefix("Geometry").map(|kind| (Dimension::Geometry, kind)))
                    .and_then(|(dimension, kind)| {
                        GeoKind::from_suffix(kind).map(|kind| Self::Geo(dimension, kind))
                    });
                return geo.ok_or_else(|| SchemaError::UnsupportedType(name.to_string()));
            }
        };
        Ok(edm_type)
    }
}

impl fmt::Display for EdmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Geo(dimension, kind) => {
                let prefix = match dimension {
                    Dimension::Geography => "Geography",
                    Dimension::Geometry => "Geometry",
                };
                let suffix = match kind {
                    GeoKind::Collection => "Collection",
                    other => other.type_name(),
                };
                write!(f, "Edm.{prefix}{suffix}")
            }
            other => write!(f, "Edm.{other:?}"),
        }
    }
}

impl EdmType {
    /// Canonical output type. `precision`/`scale` are only read for `Decimal`.
    pub fn canonical_type(
        &self,
        precision: Option<u32>,
        scale: Option<u32>,
    ) -> Result<DataType, SchemaError> {
        let data_type = match self {
            Self::Binary => DataType::Binary,
            Self::Boolean => DataType::Boolean,
            Self::Byte | Self::SByte | Self::Int16 | Self::Int32 => DataType::Int32,
            Self::Int64 => DataType::Int64,
            Self::Single => DataType::Float32,
            Self::Double => DataType::Float64,
            Self::Decimal => decimal_type(
                precision.unwrap_or(DEFAULT_DECIMAL_PRECISION),
                scale.unwrap_or(0),
            )?,
            Self::Guid | Self::String => DataType::Utf8,
            // A numeric timestamp would drop the offset.
            Self::DateTimeOffset | Self::Duration => DataType::Utf8,
            Self::DateTime | Self::Date => timestamp_type(TimeUnit::Microsecond),
            Self::Time | Self::TimeOfDay => time_type(TimeUnit::Microsecond),
            Self::Stream => schema::stream_type(),
            Self::Geo(_, kind) => schema::geo_type(*kind),
        };
        Ok(data_type)
    }
}

/// Resolve an EDM type name straight to its canonical output type.
pub fn canonical_type(
    edm_type_name: &str,
    precision: Option<u32>,
    scale: Option<u32>,
) -> Result<DataType, SchemaError> {
    edm_type_name.parse::<EdmType>()?.canonical_type(precision, scale)
}

/// Fixed-precision decimal; switches to 256-bit storage past 38 digits.
pub fn decimal_type(precision: u32, scale: u32) -> Result<DataType, SchemaError> {
    let invalid = || SchemaError::InvalidDecimal { precision, scale };
    if precision == 0 || scale > precision {
        return Err(invalid());
    }
    if precision <= u32::from(DECIMAL128_MAX_PRECISION) {
        Ok(DataType::Decimal128(precision as u8, scale as i8))
    } else if precision <= u32::from(DECIMAL256_MAX_PRECISION) {
        Ok(DataType::Decimal256(precision as u8, scale as i8))
    } else {
        Err(invalid())
    }
}

pub fn timestamp_type(unit: TimeUnit) -> DataType {
    DataType::Timestamp(unit, Some(UTC.into()))
}

/// `Time32` for milliseconds, `Time64` for microseconds.
pub fn time_type(unit: TimeUnit) -> DataType {
    match unit {
        TimeUnit::Second | TimeUnit::Millisecond => DataType::Time32(unit),
        TimeUnit::Microsecond | TimeUnit::Nanosecond => DataType::Time64(unit),
    }
}

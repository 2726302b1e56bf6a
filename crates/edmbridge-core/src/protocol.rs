//! Protocol adapter: which raw representations each OData version may hand
//! over for each output type.

use std::fmt;
use std::str::FromStr;

use arrow::datatypes::DataType;
use serde::{Deserialize, Serialize};

use crate::raw::Repr;
use crate::schema::RecordShape;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ODataVersion {
    V2,
    V4,
}

impl fmt::Display for ODataVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V2 => f.write_str("v2"),
            Self::V4 => f.write_str("v4"),
        }
    }
}

impl FromStr for ODataVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v2" | "2" | "2.0" => Ok(Self::V2),
            "v4" | "4" | "4.0" => Ok(Self::V4),
            other => Err(format!("unknown OData version '{other}'")),
        }
    }
}

/// Output leaf an extracted value is converted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal,
    Bytes,
    String,
    Timestamp,
    Time,
    Geospatial,
}

impl Target {
    /// `None` for types with no direct raw source (lists, streams, wrappers,
    /// arbitrary structs).
    pub fn of(data_type: &DataType) -> Option<Self> {
        Some(match data_type {
            DataType::Boolean => Self::Boolean,
            DataType::Int32 => Self::Int32,
            DataType::Int64 => Self::Int64,
            DataType::Float32 => Self::Float32,
            DataType::Float64 => Self::Float64,
            DataType::Decimal128(..) | DataType::Decimal256(..) => Self::Decimal,
            DataType::Binary => Self::Bytes,
            DataType::Utf8 => Self::String,
            DataType::Timestamp(..) => Self::Timestamp,
            DataType::Time32(_) | DataType::Time64(_) => Self::Time,
            DataType::Struct(_) => match RecordShape::of(data_type) {
                RecordShape::Geo(_) => Self::Geospatial,
                _ => return None,
            },
            _ => return None,
        })
    }
}

const INTEGRAL: &[Repr] = &[Repr::Int8, Repr::Int16, Repr::Int32, Repr::Int64];
const WIDE_INTEGRAL: &[Repr] = &[Repr::Int8, Repr::Int16, Repr::Int32, Repr::Int64, Repr::BigInt];
const FLOATING: &[Repr] = &[
    Repr::Float64,
    Repr::Float32,
    Repr::Decimal,
    Repr::Int8,
    Repr::Int16,
    Repr::Int32,
    Repr::Int64,
];
const DECIMAL: &[Repr] = &[
    Repr::Decimal,
    Repr::BigInt,
    Repr::Float64,
    Repr::Float32,
    Repr::Int8,
    Repr::Int16,
    Repr::Int32,
    Repr::Int64,
];

impl ODataVersion {
    /// Representations accepted for `target`, in preference order.
    pub fn permitted(self, target: Target) -> &'static [Repr] {
        match (self, target) {
            (_, Target::Boolean) => &[Repr::Boolean],
            (Self::V2, Target::Int32) => INTEGRAL,
            (Self::V4, Target::Int32) | (_, Target::Int64) => WIDE_INTEGRAL,
            (_, Target::Float32 | Target::Float64) => FLOATING,
            (_, Target::Decimal) => DECIMAL,
            (_, Target::Bytes) => &[Repr::Bytes],
            (Self::V2, Target::String) => &[Repr::String, Repr::Guid, Repr::DateTime],
            (Self::V4, Target::String) => &[
                Repr::String,
                Repr::Guid,
                Repr::DateTime,
                Repr::Timestamp,
                Repr::Decimal,
            ],
            // v2 carries epoch milliseconds and milliseconds of day as longs.
            (Self::V2, Target::Timestamp) => &[Repr::DateTime, Repr::Instant, Repr::Timestamp, Repr::Int64],
            (Self::V2, Target::Time) => &[
                Repr::DateTime,
                Repr::Instant,
                Repr::Timestamp,
                Repr::Time,
                Repr::Int64,
            ],
            (Self::V4, Target::Timestamp) => &[Repr::DateTime, Repr::Timestamp],
            (Self::V4, Target::Time) => &[Repr::DateTime, Repr::Timestamp, Repr::Time],
            (Self::V2, Target::Geospatial) => &[],
            (Self::V4, Target::Geospatial) => &[Repr::Geospatial],
        }
    }

    /// Whether `Edm.Stream` properties exist in this version.
    pub fn supports_streams(self) -> bool {
        self == Self::V4
    }
}

//! Raw entry values as produced by the protocol client.

use std::fmt;

use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime, Utc};
use num_bigint::BigInt;
use uuid::Uuid;

use crate::catalog::{Dimension, GeoKind};

/// One property value of one entry, in whichever representation the client
/// produced for it.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEntryValue {
    Null,
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    BigInt(BigInt),
    Float32(f32),
    Float64(f64),
    Decimal(BigDecimal),
    Bytes(Vec<u8>),
    String(String),
    Guid(Uuid),
    /// Calendar value carrying its original UTC offset.
    DateTime(DateTime<FixedOffset>),
    /// UTC instant, as v2 clients produce for `Edm.DateTime`.
    Instant(DateTime<Utc>),
    /// Local date-time without zone.
    Timestamp(NaiveDateTime),
    Time(NaiveTime),
    Geospatial(Geospatial),
}

/// Tag of a [`RawEntryValue`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Repr {
    Null,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    BigInt,
    Float32,
    Float64,
    Decimal,
    Bytes,
    String,
    Guid,
    DateTime,
    Instant,
    Timestamp,
    Time,
    Geospatial,
}

impl Repr {
    pub fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Int8 => "byte",
            Self::Int16 => "short",
            Self::Int32 => "int",
            Self::Int64 => "long",
            Self::BigInt => "big-integer",
            Self::Float32 => "float",
            Self::Float64 => "double",
            Self::Decimal => "big-decimal",
            Self::Bytes => "bytes",
            Self::String => "string",
            Self::Guid => "guid",
            Self::DateTime => "calendar",
            Self::Instant => "instant",
            Self::Timestamp => "timestamp",
            Self::Time => "time",
            Self::Geospatial => "geospatial",
        }
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl RawEntryValue {
    pub fn repr(&self) -> Repr {
        match self {
            Self::Null => Repr::Null,
            Self::Boolean(_) => Repr::Boolean,
            Self::Int8(_) => Repr::Int8,
            Self::Int16(_) => Repr::Int16,
            Self::Int32(_) => Repr::Int32,
            Self::Int64(_) => Repr::Int64,
            Self::BigInt(_) => Repr::BigInt,
            Self::Float32(_) => Repr::Float32,
            Self::Float64(_) => Repr::Float64,
            Self::Decimal(_) => Repr::Decimal,
            Self::Bytes(_) => Repr::Bytes,
            Self::String(_) => Repr::String,
            Self::Guid(_) => Repr::Guid,
            Self::DateTime(_) => Repr::DateTime,
            Self::Instant(_) => Repr::Instant,
            Self::Timestamp(_) => Repr::Timestamp,
            Self::Time(_) => Repr::Time,
            Self::Geospatial(_) => Repr::Geospatial,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for RawEntryValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<i32> for RawEntryValue {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for RawEntryValue {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f64> for RawEntryValue {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<bool> for RawEntryValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<BigDecimal> for RawEntryValue {
    fn from(v: BigDecimal) -> Self {
        Self::Decimal(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub exterior: Vec<Point>,
    /// Interior rings in declaration order.
    pub interiors: Vec<Vec<Point>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Point(Point),
    LineString(Vec<Point>),
    Polygon(Polygon),
    MultiPoint(Vec<Point>),
    MultiLineString(Vec<Vec<Point>>),
    MultiPolygon(Vec<Polygon>),
    Collection(Vec<Shape>),
}

impl Shape {
    pub fn kind(&self) -> GeoKind {
        match self {
            Self::Point(_) => GeoKind::Point,
            Self::LineString(_) => GeoKind::LineString,
            Self::Polygon(_) => GeoKind::Polygon,
            Self::MultiPoint(_) => GeoKind::MultiPoint,
            Self::MultiLineString(_) => GeoKind::MultiLineString,
            Self::MultiPolygon(_) => GeoKind::MultiPolygon,
            Self::Collection(_) => GeoKind::Collection,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Geospatial {
    pub dimension: Dimension,
    pub srid: Option<u32>,
    pub shape: Shape,
}

impl Geospatial {
    pub fn new(dimension: Dimension, shape: Shape) -> Self {
        Self {
            dimension,
            srid: None,
            shape,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Read,
    Edit,
}

/// A media read or edit link of a stream property.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaLink {
    pub property: String,
    pub kind: Option<LinkKind>,
    pub href: Option<String>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

impl MediaLink {
    pub fn new(property: impl Into<String>, kind: LinkKind, href: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            kind: Some(kind),
            href: Some(href.into()),
            ..Self::default()
        }
    }
}

/// One entry: ordered properties plus the media links of its stream properties.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entry {
    properties: Vec<(String, RawEntryValue)>,
    links: Vec<MediaLink>,
}

impl Entry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, replacing an earlier value of the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<RawEntryValue>) {
        let name = name.into();
        let value = value.into();
        match self.properties.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.properties.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<RawEntryValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn with_link(mut self, link: MediaLink) -> Self {
        self.links.push(link);
        self
    }

    pub fn push_link(&mut self, link: MediaLink) {
        self.links.push(link);
    }

    pub fn get(&self, name: &str) -> Option<&RawEntryValue> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &RawEntryValue)> {
        self.properties.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn links_for<'a>(&'a self, property: &'a str) -> impl Iterator<Item = &'a MediaLink> {
        self.links.iter().filter(move |l| l.property == property)
    }

    pub fn links(&self) -> &[MediaLink] {
        &self.links
    }
}

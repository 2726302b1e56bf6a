//! Fixed-shape Arrow types for geospatial values, stream properties, and the
//! value+metadata wrapper used when annotations are included.
//!
//! LineString and MultiPoint share one shape; the `type` field is the only
//! thing that tells them apart. Nested geometry collections cannot be
//! described because metadata carries no component type for them.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Fields};

use crate::catalog::GeoKind;

pub const GEO_TYPE: &str = "type";
pub const GEO_DIMENSION: &str = "dimension";
pub const GEO_COORDINATES: &str = "coordinates";
pub const POINT_X: &str = "x";
pub const POINT_Y: &str = "y";
pub const POINT_Z: &str = "z";
pub const POLYGON_EXTERIOR: &str = "exterior";
pub const POLYGON_INTERIOR: &str = "interior";
pub const POLYGON_INTERIOR_RINGS: &str = "numberOfInteriorRings";
pub const COLLECTION_POINTS: &str = "points";
pub const COLLECTION_LINE_STRINGS: &str = "lineStrings";
pub const COLLECTION_POLYGONS: &str = "polygons";
pub const COLLECTION_MULTI_POINTS: &str = "multiPoints";
pub const COLLECTION_MULTI_LINE_STRINGS: &str = "multiLineStrings";
pub const COLLECTION_MULTI_POLYGONS: &str = "multiPolygons";

pub const STREAM_ETAG: &str = "mediaEtag";
pub const STREAM_CONTENT_TYPE: &str = "mediaContentType";
pub const STREAM_READ_LINK: &str = "mediaReadLink";
pub const STREAM_EDIT_LINK: &str = "mediaEditLink";

pub const VALUE: &str = "value";
pub const METADATA_ANNOTATIONS: &str = "metadata-annotations";

/// Name of the item field inside every list type.
pub const LIST_ITEM: &str = "item";

/// List with non-nullable items.
pub fn list_of(item: DataType) -> DataType {
    DataType::List(Arc::new(Field::new(LIST_ITEM, item, false)))
}

fn header(kind_fields: Vec<Field>) -> DataType {
    let mut fields = vec![
        Field::new(GEO_TYPE, DataType::Utf8, false),
        Field::new(GEO_DIMENSION, DataType::Utf8, false),
    ];
    fields.extend(kind_fields);
    DataType::Struct(Fields::from(fields))
}

pub fn point_type() -> DataType {
    DataType::Struct(Fields::from(vec![
        Field::new(GEO_DIMENSION, DataType::Utf8, false),
        Field::new(POINT_X, DataType::Float64, false),
        Field::new(POINT_Y, DataType::Float64, false),
        Field::new(POINT_Z, DataType::Float64, false),
    ]))
}

pub fn line_string_type() -> DataType {
    header(vec![Field::new(GEO_COORDINATES, list_of(point_type()), false)])
}

pub fn multi_point_type() -> DataType {
    line_string_type()
}

pub fn polygon_type() -> DataType {
    header(vec![
        Field::new(POLYGON_EXTERIOR, list_of(point_type()), false),
        Field::new(POLYGON_INTERIOR, list_of(point_type()), false),
        Field::new(POLYGON_INTERIOR_RINGS, DataType::Int32, false),
    ])
}

pub fn multi_line_string_type() -> DataType {
    header(vec![Field::new(
        GEO_COORDINATES,
        list_of(line_string_type()),
        false,
    )])
}

pub fn multi_polygon_type() -> DataType {
    header(vec![Field::new(GEO_COORDINATES, list_of(polygon_type()), false)])
}

pub fn collection_type() -> DataType {
    header(vec![
        Field::new(COLLECTION_POINTS, list_of(point_type()), false),
        Field::new(COLLECTION_LINE_STRINGS, list_of(line_string_type()), false),
        Field::new(COLLECTION_POLYGONS, list_of(polygon_type()), false),
        Field::new(COLLECTION_MULTI_POINTS, list_of(multi_point_type()), false),
        Field::new(
            COLLECTION_MULTI_LINE_STRINGS,
            list_of(multi_line_string_type()),
            false,
        ),
        Field::new(
            COLLECTION_MULTI_POLYGONS,
            list_of(multi_polygon_type()),
            false,
        ),
    ])
}

pub fn geo_type(kind: GeoKind) -> DataType {
    match kind {
        GeoKind::Point => point_type(),
        GeoKind::LineString => line_string_type(),
        GeoKind::Polygon => polygon_type(),
        GeoKind::MultiPoint => multi_point_type(),
        GeoKind::MultiLineString => multi_line_string_type(),
        GeoKind::MultiPolygon => multi_polygon_type(),
        GeoKind::Collection => collection_type(),
    }
}

pub fn stream_type() -> DataType {
    DataType::Struct(Fields::from(vec![
        Field::new(STREAM_ETAG, DataType::Utf8, true),
        Field::new(STREAM_CONTENT_TYPE, DataType::Utf8, true),
        Field::new(STREAM_READ_LINK, DataType::Utf8, true),
        Field::new(STREAM_EDIT_LINK, DataType::Utf8, true),
    ]))
}

/// `{value: <value>, metadata-annotations: {<annotation fields>}}`.
pub fn value_with_metadata_type(value: Field, annotations: Fields) -> DataType {
    DataType::Struct(Fields::from(vec![
        value.with_name(VALUE),
        Field::new(METADATA_ANNOTATIONS, DataType::Struct(annotations), false),
    ]))
}

/// Structural type equality that ignores the nullability of nested fields.
pub fn same_base_type(left: &DataType, right: &DataType) -> bool {
    match (left, right) {
        (DataType::List(l), DataType::List(r)) => same_base_type(l.data_type(), r.data_type()),
        (DataType::Struct(l), DataType::Struct(r)) => {
            l.len() == r.len()
                && l.iter().zip(r.iter()).all(|(l, r)| {
                    l.name() == r.name() && same_base_type(l.data_type(), r.data_type())
                })
        }
        (l, r) => l == r,
    }
}

/// What a struct-typed output field represents, decided by its field names
/// and types; nested nullability is not part of the shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordShape {
    Geo(GeoKind),
    Stream,
    ValueWithMetadata,
    Other,
}

impl RecordShape {
    /// LineString and MultiPoint are indistinguishable here; callers resolve
    /// them from the source value.
    pub fn of(data_type: &DataType) -> Self {
        let DataType::Struct(fields) = data_type else {
            return Self::Other;
        };
        if fields.len() == 2
            && fields[0].name() == VALUE
            && fields[1].name() == METADATA_ANNOTATIONS
            && matches!(fields[1].data_type(), DataType::Struct(_))
        {
            return Self::ValueWithMetadata;
        }
        if same_base_type(data_type, &stream_type()) {
            return Self::Stream;
        }
        [
            GeoKind::Point,
            GeoKind::LineString,
            GeoKind::Polygon,
            GeoKind::MultiLineString,
            GeoKind::MultiPolygon,
            GeoKind::Collection,
        ]
        .into_iter()
        .find(|kind| same_base_type(data_type, &geo_type(*kind)))
        .map_or(Self::Other, Self::Geo)
    }
}

//! JSON payload -> entries -> records -> RecordBatch, driven by fixture files.

use std::sync::Arc;

use arrow::array::{Array, AsArray};
use arrow::datatypes::{
    DataType, Decimal128Type, Field, Float64Type, Int32Type, Int64Type, Schema,
    Time64MicrosecondType, TimestampMicrosecondType,
};
use arrow::record_batch::RecordBatch;
use edmbridge_core::{
    EntryReader, EntryTransformer, ExtractError, MetadataDocument, SchemaError, infer_schema,
    output_schema, parse_schema, records_to_batch, schema_to_json,
};

const PRODUCTS_METADATA: &str = include_str!("fixtures/products_v4_metadata.json");
const PRODUCTS_ENTRIES: &str = include_str!("fixtures/products_v4_entries.json");
const ORDERS_METADATA: &str = include_str!("fixtures/orders_v2_metadata.json");
const ORDERS_ENTRIES: &str = include_str!("fixtures/orders_v2_entries.json");

fn convert(
    metadata: &str,
    entries: &str,
    selected: &[&str],
    annotations: bool,
    user: Option<Schema>,
) -> RecordBatch {
    let metadata = MetadataDocument::from_json(metadata).unwrap();
    let selected: Vec<String> = selected.iter().map(|s| s.to_string()).collect();
    let inferred = infer_schema(&metadata.properties, &selected, annotations).unwrap();
    let schema = output_schema(inferred, user).unwrap();
    let entries = EntryReader::new(&metadata).read(entries).unwrap();
    let transformer =
        EntryTransformer::new(schema.clone(), metadata.version).with_annotations(&metadata.properties);
    let records: Vec<_> = entries
        .iter()
        .map(|e| transformer.transform(e).unwrap())
        .collect();
    records_to_batch(schema, &records).unwrap()
}

#[test]
fn v4_products_convert_end_to_end() {
    let batch = convert(PRODUCTS_METADATA, PRODUCTS_ENTRIES, &[], false, None);
    assert_eq!(batch.num_rows(), 2);
    assert_eq!(batch.num_columns(), 9);

    let ids = batch.column_by_name("ID").unwrap().as_primitive::<Int32Type>();
    assert_eq!(ids.values().to_vec(), [1, 2]);

    let names = batch.column_by_name("Name").unwrap().as_string::<i32>();
    assert_eq!(names.value(0), "Bread");
    assert!(names.is_null(1));

    let prices = batch.column_by_name("Price").unwrap().as_primitive::<Decimal128Type>();
    assert_eq!(prices.data_type(), &DataType::Decimal128(10, 2));
    assert_eq!(prices.values().to_vec(), [250, 123_456]);

    let released = batch.column_by_name("Released").unwrap().as_string::<i32>();
    assert_eq!(released.value(0), "1992-01-01T00:00:00.5Z");
    assert_eq!(released.value(1), "2005-10-01T12:30:00-05:00");

    let updated = batch
        .column_by_name("Updated")
        .unwrap()
        .as_primitive::<TimestampMicrosecondType>();
    assert_eq!(updated.value(0), 1_593_475_200_000_000);
    assert!(updated.is_null(1));

    let photo = batch.column_by_name("Photo").unwrap().as_struct();
    assert!(photo.is_null(1));
    let read_link = photo.column_by_name("mediaReadLink").unwrap().as_string::<i32>();
    assert_eq!(read_link.value(0), "Products(1)/Photo");
    let content_type = photo.column_by_name("mediaContentType").unwrap().as_string::<i32>();
    assert_eq!(content_type.value(0), "image/jpeg");
    assert!(photo.column_by_name("mediaEditLink").unwrap().is_null(0));

    let store = batch.column_by_name("Store").unwrap().as_struct();
    assert!(store.is_null(1));
    let x = store.column_by_name("x").unwrap().as_primitive::<Float64Type>();
    assert_eq!(x.value(0), 13.4);
    let z = store.column_by_name("z").unwrap().as_primitive::<Float64Type>();
    assert_eq!(z.value(0), 0.0);
    let dimension = store.column_by_name("dimension").unwrap().as_string::<i32>();
    assert_eq!(dimension.value(0), "GEOGRAPHY");

    let rating = batch.column_by_name("Rating").unwrap().as_primitive::<Float64Type>();
    assert_eq!(rating.values().to_vec(), [4.0, 3.5]);
}

#[test]
fn v4_annotations_ride_along_with_values() {
    let batch = convert(
        PRODUCTS_METADATA,
        PRODUCTS_ENTRIES,
        &["ID", "Price"],
        true,
        None,
    );
    assert_eq!(batch.num_columns(), 2);

    let price = batch.column_by_name("Price").unwrap().as_struct();
    let value = price.column_by_name("value").unwrap().as_primitive::<Decimal128Type>();
    assert_eq!(value.value(1), 123_456);

    let metadata = price.column_by_name("metadata-annotations").unwrap().as_struct();
    let currency = metadata
        .column_by_name("org_odata_measures_v1_isocurrency")
        .unwrap()
        .as_struct();
    let term = currency.column_by_name("term").unwrap().as_string::<i32>();
    assert_eq!(term.value(0), "Org.OData.Measures.V1.ISOCurrency");
    let expression = currency.column_by_name("expression").unwrap().as_struct();
    let name = expression.column_by_name("name").unwrap().as_string::<i32>();
    let path = expression.column_by_name("value").unwrap().as_string::<i32>();
    assert_eq!((name.value(1), path.value(1)), ("Path", "Currency"));

    let description = metadata
        .column_by_name("short_core_description")
        .unwrap()
        .as_struct();
    let qualifier = description.column_by_name("qualifier").unwrap().as_string::<i32>();
    assert_eq!(qualifier.value(0), "Short");
}

#[test]
fn v2_orders_convert_end_to_end() {
    let batch = convert(ORDERS_METADATA, ORDERS_ENTRIES, &[], true, None);
    assert_eq!(batch.num_rows(), 2);

    let order_date = batch
        .column_by_name("OrderDate")
        .unwrap()
        .as_primitive::<TimestampMicrosecondType>();
    assert_eq!(order_date.value(0), 836_438_400_000_000);
    assert!(order_date.is_null(1));

    let ship_time = batch
        .column_by_name("ShipTime")
        .unwrap()
        .as_primitive::<Time64MicrosecondType>();
    assert_eq!(ship_time.value(0), 48_015_500_000);

    let freight = batch
        .column_by_name("Freight")
        .unwrap()
        .as_primitive::<Decimal128Type>();
    assert_eq!(freight.values().to_vec(), [323_800, 116_100]);

    let quantity = batch.column_by_name("Quantity").unwrap().as_primitive::<Int64Type>();
    assert_eq!(quantity.values().to_vec(), [12, 9]);

    let express = batch.column_by_name("Express").unwrap().as_boolean();
    assert!(!express.value(0));
    assert!(express.value(1));

    let customer = batch.column_by_name("CustomerID").unwrap().as_struct();
    let value = customer.column_by_name("value").unwrap().as_string::<i32>();
    assert_eq!(value.value(0), "VINET");
    let metadata = customer.column_by_name("metadata-annotations").unwrap().as_struct();
    let label = metadata.column_by_name("sap_label").unwrap().as_string::<i32>();
    assert_eq!(label.value(1), "Customer");
    let filterable = metadata.column_by_name("sap_filterable").unwrap().as_string::<i32>();
    assert_eq!(filterable.value(0), "true");
}

#[test]
fn override_schema_narrows_output() {
    let user = parse_schema(
        r#"{
            "type": "record",
            "name": "orders",
            "fields": [
                {"name": "OrderID", "type": ["int", "null"]},
                {"name": "Freight", "type": ["null", {"type": "bytes", "logicalType": "decimal", "precision": 19, "scale": 4}]}
            ]
        }"#,
    )
    .unwrap();
    let batch = convert(ORDERS_METADATA, ORDERS_ENTRIES, &[], false, Some(user));
    assert_eq!(batch.num_columns(), 2);
    assert_eq!(batch.schema().field(0).name(), "OrderID");
}

#[test]
fn incompatible_override_is_rejected() {
    let metadata = MetadataDocument::from_json(ORDERS_METADATA).unwrap();
    let inferred = infer_schema(&metadata.properties, &[], false).unwrap();
    let user = Schema::new(vec![Field::new("Freight", DataType::Float64, true)]);
    let err = output_schema(inferred, Some(user)).unwrap_err();
    assert!(matches!(err, SchemaError::Compatibility { field, .. } if field == "Freight"));
}

#[test]
fn inferred_schema_renders_as_schema_json() {
    let metadata = MetadataDocument::from_json(PRODUCTS_METADATA).unwrap();
    let inferred = infer_schema(&metadata.properties, &[], false).unwrap();
    let json = schema_to_json(&inferred);
    assert_eq!(json["fields"][0]["name"], "ID");
    assert_eq!(json["fields"][0]["type"], "int");
    assert_eq!(json["fields"][2]["type"][0]["logicalType"], "decimal");
}

#[test]
fn missing_required_value_aborts_the_entry() {
    let metadata = MetadataDocument::from_json(ORDERS_METADATA).unwrap();
    let inferred = infer_schema(&metadata.properties, &[], false).unwrap();
    let transformer = EntryTransformer::new(Arc::new(inferred), metadata.version);
    let entries = EntryReader::new(&metadata)
        .read(r#"{"d": {"results": [{"CustomerID": "ALFKI"}]}}"#)
        .unwrap();
    let err = transformer.transform(&entries[0]).unwrap_err();
    assert!(matches!(err, ExtractError::NullValue { field } if field == "OrderID"));
}

#[test]
fn override_may_relax_nested_nullability() {
    let user = parse_schema(
        r#"{
            "type": "record",
            "name": "products",
            "fields": [
                {"name": "ID", "type": "int"},
                {"name": "Store", "type": ["null", {
                    "type": "record",
                    "name": "Store",
                    "fields": [
                        {"name": "dimension", "type": "string"},
                        {"name": "x", "type": "double"},
                        {"name": "y", "type": "double"},
                        {"name": "z", "type": ["double", "null"]}
                    ]
                }]}
            ]
        }"#,
    )
    .unwrap();
    let batch = convert(PRODUCTS_METADATA, PRODUCTS_ENTRIES, &[], false, Some(user));
    assert_eq!(batch.num_columns(), 2);
    let store = batch.column_by_name("Store").unwrap().as_struct();
    let x = store.column_by_name("x").unwrap().as_primitive::<Float64Type>();
    assert_eq!(x.value(0), 13.4);
    assert!(store.is_null(1));
}

#[test]
fn wide_decimal_payload_keeps_every_digit() {
    let metadata = r#"{
        "version": "v4",
        "properties": [{"name": "P", "edmTypeName": "Edm.Decimal", "precision": 22, "scale": 2}]
    }"#;
    let entries = r#"{"value": [{"P": 12345678901234567890.12}, {"P": -0.5}]}"#;
    let batch = convert(metadata, entries, &[], false, None);
    let p = batch.column(0).as_primitive::<Decimal128Type>();
    assert_eq!(p.data_type(), &DataType::Decimal128(22, 2));
    assert_eq!(p.value(0), 1_234_567_890_123_456_789_012);
    assert_eq!(p.value(1), -50);
}

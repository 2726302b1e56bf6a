//! Vertical card display for converted entries.
//!
//! Renders each row of a RecordBatch as a card grouped into plain
//! properties, media streams, geospatial values and annotated properties,
//! with nested records indented below their field.

use arrow::array::{Array, AsArray, StructArray};
use arrow::datatypes::{DataType, Field};
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use edmbridge_core::schema::{self, RecordShape};

const MAX_LIST_ITEMS: usize = 10;
const LABEL_WIDTH: usize = 26;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Properties,
    Streams,
    Geospatial,
    Annotated,
}

impl Section {
    const ALL: [Section; 4] = [
        Section::Properties,
        Section::Streams,
        Section::Geospatial,
        Section::Annotated,
    ];

    fn of(field: &Field) -> Self {
        match RecordShape::of(field.data_type()) {
            RecordShape::Stream => Self::Streams,
            RecordShape::Geo(_) => Self::Geospatial,
            RecordShape::ValueWithMetadata => Self::Annotated,
            RecordShape::Other => Self::Properties,
        }
    }

    fn header(self) -> &'static str {
        match self {
            Self::Properties => "Properties",
            Self::Streams => "Media Streams",
            Self::Geospatial => "Geospatial",
            Self::Annotated => "Annotated Properties",
        }
    }
}

// ── Public API ──

/// Print every row of `batch` as a vertical card.
pub fn print_record_cards(batch: &RecordBatch) -> anyhow::Result<()> {
    for row in 0..batch.num_rows() {
        println!("=== entry {} ===", row + 1);
        for section in Section::ALL {
            print_section(batch, section, row)?;
        }
    }
    Ok(())
}

// ── Section rendering ──

fn print_section(batch: &RecordBatch, section: Section, row: usize) -> anyhow::Result<()> {
    let schema = batch.schema();
    let columns: Vec<usize> = (0..schema.fields().len())
        .filter(|&i| Section::of(schema.field(i)) == section)
        .filter(|&i| !batch.column(i).is_null(row))
        .collect();
    if columns.is_empty() {
        return Ok(());
    }

    println!("{}", section.header());
    for i in columns {
        print_value(schema.field(i).name(), batch.column(i).as_ref(), row, 1)?;
    }
    println!();
    Ok(())
}

fn print_value(label: &str, array: &dyn Array, row: usize, depth: usize) -> anyhow::Result<()> {
    let indent = "  ".repeat(depth);
    if array.is_null(row) {
        return Ok(());
    }
    match array.data_type() {
        DataType::Struct(_) => {
            println!("{indent}{label}:");
            print_struct(array.as_struct(), row, depth + 1)?;
        }
        DataType::List(inner) => {
            let list = array.as_list::<i32>();
            let values = list.value(row);
            let len = values.len();
            match inner.data_type() {
                DataType::Struct(_) => {
                    println!("{indent}{label} ({len}):");
                    let structs = values.as_struct();
                    for item in 0..len.min(MAX_LIST_ITEMS) {
                        println!("{indent}  - [{item}]");
                        print_struct(structs, item, depth + 2)?;
                    }
                }
                _ => {
                    let formatter = ArrayFormatter::try_new(values.as_ref(), &FormatOptions::default())?;
                    let items: Vec<String> = (0..len.min(MAX_LIST_ITEMS))
                        .map(|i| formatter.value(i).to_string())
                        .collect();
                    println!("{indent}{:<LABEL_WIDTH$} {}", label, items.join(", "));
                }
            }
            if len > MAX_LIST_ITEMS {
                println!("{indent}  ... and {} more", len - MAX_LIST_ITEMS);
            }
        }
        DataType::Boolean => {
            let value = array.as_boolean().value(row);
            println!("{indent}{:<LABEL_WIDTH$} {}", label, if value { "yes" } else { "no" });
        }
        _ => {
            let formatter = ArrayFormatter::try_new(array, &FormatOptions::default())?;
            println!("{indent}{:<LABEL_WIDTH$} {}", label, formatter.value(row));
        }
    }
    Ok(())
}

fn print_struct(structs: &StructArray, row: usize, depth: usize) -> anyhow::Result<()> {
    for (field, column) in structs.fields().iter().zip(structs.columns()) {
        // The geometry discriminators repeat on every nested record.
        if depth > 2 && field.name() == schema::GEO_DIMENSION {
            continue;
        }
        print_value(field.name(), column.as_ref(), row, depth)?;
    }
    Ok(())
}

//! Columnar hand-off: extracted records to an Arrow `RecordBatch`.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BinaryArray, BooleanArray, Decimal128Array, Decimal256Array, ListArray,
    PrimitiveArray, StringArray, StructArray,
};
use arrow::buffer::{NullBuffer, OffsetBuffer};
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Field, Fields, Float32Type, Float64Type, Int32Type, Int64Type,
    SchemaRef, Time32MillisecondType, Time32SecondType, Time64MicrosecondType,
    Time64NanosecondType, TimeUnit, TimestampMicrosecondType, TimestampMillisecondType,
    TimestampNanosecondType, TimestampSecondType, i256,
};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use tracing::info;

use crate::value::{Record, Value};

static NULL: Value = Value::Null;

/// Build one batch from records extracted against `schema`.
pub fn records_to_batch(schema: SchemaRef, records: &[Record]) -> Result<RecordBatch, ArrowError> {
    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            let values: Vec<&Value> = records
                .iter()
                .map(|r| r.get(field.name()).unwrap_or(&NULL))
                .collect();
            column(field, &values)
        })
        .collect::<Result<Vec<_>, _>>()?;
    let batch = RecordBatch::try_new(schema, columns)?;
    info!(rows = batch.num_rows(), columns = batch.num_columns(), "built record batch");
    Ok(batch)
}

fn invalid(field: &str, value: &Value) -> ArrowError {
    ArrowError::InvalidArgumentError(format!(
        "field '{field}' cannot hold value {value:?}"
    ))
}

fn leaf<'a, T>(
    field: &str,
    value: &'a Value,
    pick: impl Fn(&'a Value) -> Option<T>,
) -> Result<Option<T>, ArrowError> {
    if value.is_null() {
        return Ok(None);
    }
    pick(value).map(Some).ok_or_else(|| invalid(field, value))
}

fn primitive<T: ArrowPrimitiveType>(
    field: &str,
    values: &[&Value],
    pick: impl Fn(&Value) -> Option<T::Native>,
) -> Result<PrimitiveArray<T>, ArrowError> {
    values.iter().map(|v| leaf(field, v, &pick)).collect()
}

fn timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Timestamp(v) => Some(*v),
        _ => None,
    }
}

fn time32(value: &Value) -> Option<i32> {
    match value {
        Value::Time(v) => i32::try_from(*v).ok(),
        _ => None,
    }
}

fn time64(value: &Value) -> Option<i64> {
    match value {
        Value::Time(v) => Some(*v),
        _ => None,
    }
}

/// Sign-extend a big-endian two's-complement integer to `N` bytes.
fn sign_extend<const N: usize>(bytes: &[u8]) -> Option<[u8; N]> {
    if bytes.len() > N {
        return None;
    }
    let fill = if bytes.first().is_some_and(|b| b & 0x80 != 0) {
        0xff
    } else {
        0
    };
    let mut out = [fill; N];
    out[N - bytes.len()..].copy_from_slice(bytes);
    Some(out)
}

fn column(field: &Field, values: &[&Value]) -> Result<ArrayRef, ArrowError> {
    let name = field.name().as_str();
    let array: ArrayRef = match field.data_type() {
        DataType::Boolean => Arc::new(
            values
                .iter()
                .map(|v| {
                    leaf(name, v, |v| match v {
                        Value::Boolean(b) => Some(*b),
                        _ => None,
                    })
                })
                .collect::<Result<BooleanArray, _>>()?,
        ),
        DataType::Int32 => Arc::new(primitive::<Int32Type>(name, values, |v| match v {
            Value::Int32(n) => Some(*n),
            _ => None,
        })?),
        DataType::Int64 => Arc::new(primitive::<Int64Type>(name, values, |v| match v {
            Value::Int64(n) => Some(*n),
            _ => None,
        })?),
        DataType::Float32 => Arc::new(primitive::<Float32Type>(name, values, |v| match v {
            Value::Float32(n) => Some(*n),
            _ => None,
        })?),
        DataType::Float64 => Arc::new(primitive::<Float64Type>(name, values, |v| match v {
            Value::Float64(n) => Some(*n),
            _ => None,
        })?),
        DataType::Binary => Arc::new(
            values
                .iter()
                .map(|v| {
                    leaf(name, v, |v| match v {
                        Value::Bytes(b) => Some(b.as_slice()),
                        _ => None,
                    })
                })
                .collect::<Result<BinaryArray, _>>()?,
        ),
        DataType::Utf8 => Arc::new(
            values
                .iter()
                .map(|v| leaf(name, v, Value::as_str))
                .collect::<Result<StringArray, _>>()?,
        ),
        DataType::Decimal128(precision, scale) => {
            let array = values
                .iter()
                .map(|v| {
                    leaf(name, v, |v| match v {
                        Value::Decimal(bytes) => sign_extend::<16>(bytes).map(i128::from_be_bytes),
                        _ => None,
                    })
                })
                .collect::<Result<Decimal128Array, _>>()?;
            Arc::new(array.with_precision_and_scale(*precision, *scale)?)
        }
        DataType::Decimal256(precision, scale) => {
            let array = values
                .iter()
                .map(|v| {
                    leaf(name, v, |v| match v {
                        Value::Decimal(bytes) => sign_extend::<32>(bytes).map(i256::from_be_bytes),
                        _ => None,
                    })
                })
                .collect::<Result<Decimal256Array, _>>()?;
            Arc::new(array.with_precision_and_scale(*precision, *scale)?)
        }
        DataType::Timestamp(unit, tz) => match unit {
            TimeUnit::Second => Arc::new(
                primitive::<TimestampSecondType>(name, values, timestamp)?
                    .with_timezone_opt(tz.clone()),
            ),
            TimeUnit::Millisecond => Arc::new(
                primitive::<TimestampMillisecondType>(name, values, timestamp)?
                    .with_timezone_opt(tz.clone()),
            ),
            TimeUnit::Microsecond => Arc::new(
                primitive::<TimestampMicrosecondType>(name, values, timestamp)?
                    .with_timezone_opt(tz.clone()),
            ),
            TimeUnit::Nanosecond => Arc::new(
                primitive::<TimestampNanosecondType>(name, values, timestamp)?
                    .with_timezone_opt(tz.clone()),
            ),
        },
        DataType::Time32(TimeUnit::Second) => {
            Arc::new(primitive::<Time32SecondType>(name, values, time32)?)
        }
        DataType::Time32(TimeUnit::Millisecond) => {
            Arc::new(primitive::<Time32MillisecondType>(name, values, time32)?)
        }
        DataType::Time64(TimeUnit::Microsecond) => {
            Arc::new(primitive::<Time64MicrosecondType>(name, values, time64)?)
        }
        DataType::Time64(TimeUnit::Nanosecond) => {
            Arc::new(primitive::<Time64NanosecondType>(name, values, time64)?)
        }
        DataType::List(item) => list(name, item, values)?,
        DataType::Struct(fields) => structure(name, fields, values)?,
        other => {
            return Err(ArrowError::NotYetImplemented(format!(
                "field '{name}' has unsupported type {other}"
            )));
        }
    };
    Ok(array)
}

fn validity(values: &[&Value]) -> Option<NullBuffer> {
    let valid: Vec<bool> = values.iter().map(|v| !v.is_null()).collect();
    valid.contains(&false).then(|| NullBuffer::from(valid))
}

fn list(name: &str, item: &Arc<Field>, values: &[&Value]) -> Result<ArrayRef, ArrowError> {
    let mut lengths = Vec::with_capacity(values.len());
    let mut children = Vec::new();
    for value in values {
        match value {
            Value::List(items) => {
                lengths.push(items.len());
                children.extend(items.iter());
            }
            Value::Null => lengths.push(0),
            other => return Err(invalid(name, other)),
        }
    }
    let child = column(item, &children)?;
    let array = ListArray::try_new(
        Arc::clone(item),
        OffsetBuffer::from_lengths(lengths),
        child,
        validity(values),
    )?;
    Ok(Arc::new(array))
}

fn structure(name: &str, fields: &Fields, values: &[&Value]) -> Result<ArrayRef, ArrowError> {
    let mut rows = Vec::with_capacity(values.len());
    for value in values {
        match value {
            Value::Record(record) => rows.push(Some(record)),
            Value::Null => rows.push(None),
            other => return Err(invalid(name, other)),
        }
    }
    let children = fields
        .iter()
        .map(|field| {
            let column_values: Vec<&Value> = rows
                .iter()
                .map(|row| row.and_then(|r| r.get(field.name())).unwrap_or(&NULL))
                .collect();
            column(field, &column_values)
        })
        .collect::<Result<Vec<_>, _>>()?;
    let array = StructArray::try_new(fields.clone(), children, validity(values))?;
    Ok(Arc::new(array))
}

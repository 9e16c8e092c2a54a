//! Tagged records to Arrow
//!
//! Raw fields keep their source names and come first, in first-seen order
//! across the group; the envelope columns follow.
//!
//! When the source declared a schema (Parquet feeds), every raw column that
//! appears in it is written with its declared type. Otherwise types are
//! inferred from the values present, never losing digits:
//! - booleans stay boolean
//! - integers become Int64, or UInt64 when a non-negative column holds a
//!   value above `i64::MAX`
//! - a column of floats only becomes Float64
//! - anything else, including integers mixed with floats and nested
//!   arrays/objects, is stored as its JSON text in a UTF-8 column

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{
    new_null_array, ArrayRef, BooleanBuilder, Date32Array, Float64Builder, Int64Builder,
    RecordBatch, StringArray, StringBuilder, TimestampMicrosecondArray, UInt64Builder,
};
use arrow::compute::{cast_with_options, CastOptions};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use bronze_ingest_core::{RawRecord, TaggedRecord};
use chrono::Datelike;
use serde_json::Value;
use tracing::warn;

use crate::{Result, WriterError};

pub const INGESTION_TIMESTAMP: &str = "ingestion_timestamp";
pub const SOURCE_FILE: &str = "source_file";
pub const BATCH_ID: &str = "batch_id";
pub const INGESTION_DATE: &str = "ingestion_date";

pub const ENVELOPE_COLUMNS: [&str; 4] =
    [INGESTION_TIMESTAMP, SOURCE_FILE, BATCH_ID, INGESTION_DATE];

/// Prefix applied to raw fields whose name clashes with an envelope column.
pub const COLLISION_PREFIX: &str = "_source_";

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    /// Only nulls seen so far
    Unknown,
    Boolean,
    /// Integers, none negative, all within i64
    NonNegativeInt,
    Int64,
    UInt64,
    Float64,
    Utf8,
}

impl ColumnKind {
    fn widen(self, value: &Value) -> Self {
        use ColumnKind::*;
        match value {
            Value::Null => self,
            Value::Bool(_) => match self {
                Unknown | Boolean => Boolean,
                _ => Utf8,
            },
            Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    match (self, v < 0) {
                        (Unknown | NonNegativeInt, false) => NonNegativeInt,
                        (Unknown | NonNegativeInt | Int64, _) => Int64,
                        (UInt64, false) => UInt64,
                        _ => Utf8,
                    }
                } else if n.is_u64() {
                    match self {
                        Unknown | NonNegativeInt | UInt64 => UInt64,
                        _ => Utf8,
                    }
                } else {
                    match self {
                        Unknown | Float64 => Float64,
                        _ => Utf8,
                    }
                }
            }
            Value::String(_) | Value::Array(_) | Value::Object(_) => Utf8,
        }
    }

    fn data_type(self) -> DataType {
        match self {
            ColumnKind::Boolean => DataType::Boolean,
            ColumnKind::NonNegativeInt | ColumnKind::Int64 => DataType::Int64,
            ColumnKind::UInt64 => DataType::UInt64,
            ColumnKind::Float64 => DataType::Float64,
            ColumnKind::Unknown | ColumnKind::Utf8 => DataType::Utf8,
        }
    }
}

struct RawColumn {
    /// Field name in the source record
    source_name: String,
    /// Column name in the written file
    column_name: String,
    kind: ColumnKind,
    /// Type the source schema declares for this field
    declared: Option<DataType>,
}

/// Build one RecordBatch from the records of a single partition.
///
/// `declared` is the schema the source files carried, if any.
pub fn to_record_batch(
    records: &[TaggedRecord],
    declared: Option<&Schema>,
) -> Result<RecordBatch> {
    let rows: Vec<RawRecord> = records.iter().map(|r| r.payload().fields()).collect();
    let columns = infer_columns(&rows, declared);

    let mut fields = Vec::with_capacity(columns.len() + ENVELOPE_COLUMNS.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(fields.capacity());

    for column in &columns {
        let array = build_raw_array(column, &rows);
        fields.push(Field::new(
            &column.column_name,
            array.data_type().clone(),
            true,
        ));
        arrays.push(array);
    }

    fields.push(Field::new(
        INGESTION_TIMESTAMP,
        DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
        false,
    ));
    arrays.push(Arc::new(
        TimestampMicrosecondArray::from(
            records
                .iter()
                .map(|r| r.envelope().ingestion_timestamp().timestamp_micros())
                .collect::<Vec<_>>(),
        )
        .with_timezone("UTC"),
    ));

    fields.push(Field::new(SOURCE_FILE, DataType::Utf8, false));
    arrays.push(Arc::new(StringArray::from_iter_values(
        records.iter().map(|r| r.envelope().source_file()),
    )));

    fields.push(Field::new(BATCH_ID, DataType::Utf8, false));
    arrays.push(Arc::new(StringArray::from_iter_values(
        records.iter().map(|r| r.envelope().batch_id().to_string()),
    )));

    fields.push(Field::new(INGESTION_DATE, DataType::Date32, false));
    arrays.push(Arc::new(Date32Array::from(
        records
            .iter()
            .map(|r| r.envelope().ingestion_date().num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
            .collect::<Vec<_>>(),
    )));

    let schema = Arc::new(Schema::new(fields));
    RecordBatch::try_new(schema, arrays).map_err(|e| {
        let partition = records
            .first()
            .map(|r| r.partition_key().to_string())
            .unwrap_or_default();
        WriterError::encode(partition, e)
    })
}

fn infer_columns(rows: &[RawRecord], declared: Option<&Schema>) -> Vec<RawColumn> {
    let mut columns: Vec<RawColumn> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for row in rows {
        for (name, value) in row {
            let idx = *index.entry(name.as_str()).or_insert_with(|| {
                columns.push(RawColumn {
                    source_name: name.clone(),
                    column_name: name.clone(),
                    kind: ColumnKind::Unknown,
                    declared: declared
                        .and_then(|schema| schema.field_with_name(name).ok())
                        .map(|field| field.data_type().clone()),
                });
                columns.len() - 1
            });
            columns[idx].kind = columns[idx].kind.widen(value);
        }
    }

    for column in &mut columns {
        if ENVELOPE_COLUMNS.contains(&column.source_name.as_str()) {
            column.column_name = format!("{}{}", COLLISION_PREFIX, column.source_name);
            warn!(
                field = %column.source_name,
                renamed_to = %column.column_name,
                "Source field collides with an ingestion column; keeping it under a new name"
            );
        }
    }

    columns
}

fn build_raw_array(column: &RawColumn, rows: &[RawRecord]) -> ArrayRef {
    let inferred = build_inferred_array(column, rows);
    let Some(declared) = &column.declared else {
        return inferred;
    };

    if column.kind == ColumnKind::Unknown {
        return new_null_array(declared, rows.len());
    }
    // Binary values arrive base64 encoded; casting would store the text bytes
    if inferred.data_type() == declared || is_binary(declared) {
        return inferred;
    }

    let options = CastOptions {
        safe: false,
        ..Default::default()
    };
    match cast_with_options(&inferred, declared, &options) {
        Ok(array) => array,
        Err(e) => {
            warn!(
                field = %column.source_name,
                declared = %declared,
                written_as = %inferred.data_type(),
                error = %e,
                "Values do not fit the declared type; keeping the inferred type"
            );
            inferred
        }
    }
}

fn is_binary(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Binary
            | DataType::LargeBinary
            | DataType::BinaryView
            | DataType::FixedSizeBinary(_)
    )
}

fn build_inferred_array(column: &RawColumn, rows: &[RawRecord]) -> ArrayRef {
    let values = rows.iter().map(|row| row.get(&column.source_name));
    match column.kind {
        ColumnKind::Boolean => {
            let mut builder = BooleanBuilder::with_capacity(rows.len());
            for value in values {
                builder.append_option(value.and_then(Value::as_bool));
            }
            Arc::new(builder.finish())
        }
        ColumnKind::NonNegativeInt | ColumnKind::Int64 => {
            let mut builder = Int64Builder::with_capacity(rows.len());
            for value in values {
                builder.append_option(value.and_then(Value::as_i64));
            }
            Arc::new(builder.finish())
        }
        ColumnKind::UInt64 => {
            let mut builder = UInt64Builder::with_capacity(rows.len());
            for value in values {
                builder.append_option(value.and_then(Value::as_u64));
            }
            Arc::new(builder.finish())
        }
        ColumnKind::Float64 => {
            let mut builder = Float64Builder::with_capacity(rows.len());
            for value in values {
                builder.append_option(value.and_then(Value::as_f64));
            }
            Arc::new(builder.finish())
        }
        ColumnKind::Unknown | ColumnKind::Utf8 => {
            let mut builder = StringBuilder::with_capacity(rows.len(), rows.len() * 16);
            for value in values {
                match value {
                    None | Some(Value::Null) => builder.append_null(),
                    Some(Value::String(s)) => builder.append_value(s),
                    Some(other) => builder.append_value(other.to_string()),
                }
            }
            Arc::new(builder.finish())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::{
        Date32Type, Float64Type, Int32Type, Int64Type, TimestampMicrosecondType, UInt64Type,
    };
    use bronze_ingest_core::{tag, BatchId, MalformedRecord, RecordPayload};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("test records must be objects"),
        }
    }

    fn tagged(records: Vec<RecordPayload>) -> Vec<TaggedRecord> {
        let ts = Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap();
        tag(records, "s3://landing-zone/wms/a.json", BatchId::generate(), ts)
    }

    #[test]
    fn test_raw_columns_then_envelope() {
        let records = tagged(vec![
            record(json!({"sku": "A1", "qty": 5})).into(),
            record(json!({"sku": "B2", "qty": 7, "note": "late"})).into(),
        ]);

        let batch = to_record_batch(&records, None).unwrap();
        let schema = batch.schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();

        assert_eq!(
            names,
            vec![
                "sku",
                "qty",
                "note",
                "ingestion_timestamp",
                "source_file",
                "batch_id",
                "ingestion_date"
            ]
        );
        assert_eq!(batch.num_rows(), 2);

        let qty = batch.column(1).as_primitive::<Int64Type>();
        assert_eq!(qty.value(0), 5);
        assert_eq!(qty.value(1), 7);
        assert!(batch.column(2).is_null(0));

        let ts = batch.column(3).as_primitive::<TimestampMicrosecondType>();
        assert_eq!(
            ts.value(0),
            Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0)
                .unwrap()
                .timestamp_micros()
        );
        let date = batch.column(6).as_primitive::<Date32Type>();
        // 2024-03-02
        assert_eq!(date.value(0), 19_784);
    }

    #[test]
    fn test_mixed_types_widen() {
        let records = tagged(vec![
            record(json!({"price": 1, "code": 10, "dims": {"w": 2}, "weight": 0.5})).into(),
            record(json!({"price": 1.5, "code": "X9", "dims": null, "weight": 2.25})).into(),
        ]);

        let batch = to_record_batch(&records, None).unwrap();

        // Integers mixed with floats keep their exact text
        let price = batch.column(0).as_string::<i32>();
        assert_eq!(price.value(0), "1");
        assert_eq!(price.value(1), "1.5");

        let code = batch.column(1).as_string::<i32>();
        assert_eq!(code.value(0), "10");
        assert_eq!(code.value(1), "X9");

        let dims = batch.column(2).as_string::<i32>();
        assert_eq!(dims.value(0), r#"{"w":2}"#);
        assert!(dims.is_null(1));

        let weight = batch.column(3).as_primitive::<Float64Type>();
        assert_eq!(weight.value(0), 0.5);
        assert_eq!(weight.value(1), 2.25);
    }

    #[test]
    fn test_large_integers_keep_every_digit() {
        let values: Vec<Value> = serde_json::from_str(
            r#"[{"id": 18446744073709551615, "seq": -1},
                {"id": 9007199254740993, "seq": 18446744073709551615}]"#,
        )
        .unwrap();
        let records = tagged(
            values
                .into_iter()
                .map(|v| RecordPayload::from(record(v)))
                .collect(),
        );

        let batch = to_record_batch(&records, None).unwrap();

        let id = batch.column(0).as_primitive::<UInt64Type>();
        assert_eq!(id.value(0), u64::MAX);
        assert_eq!(id.value(1), 9_007_199_254_740_993);

        // A negative value rules out UInt64; text keeps both exact
        let seq = batch.column(1).as_string::<i32>();
        assert_eq!(seq.value(0), "-1");
        assert_eq!(seq.value(1), "18446744073709551615");
    }

    #[test]
    fn test_declared_types_are_restored() {
        let declared = Schema::new(vec![
            Field::new("qty", DataType::Int32, false),
            Field::new("shipped", DataType::Date32, true),
            Field::new("note", DataType::Int32, true),
            Field::new("label", DataType::Binary, true),
        ]);
        let records = tagged(vec![
            record(json!({"qty": 5, "shipped": "2024-03-02", "note": null, "label": "AAE="})).into(),
            record(json!({"qty": 7, "shipped": null, "note": null, "label": null})).into(),
        ]);

        let batch = to_record_batch(&records, Some(&declared)).unwrap();
        let schema = batch.schema();

        assert_eq!(schema.field(0).data_type(), &DataType::Int32);
        assert_eq!(schema.field(1).data_type(), &DataType::Date32);
        assert_eq!(schema.field(2).data_type(), &DataType::Int32);
        assert_eq!(schema.field(3).data_type(), &DataType::Utf8);

        let qty = batch.column(0).as_primitive::<Int32Type>();
        assert_eq!(qty.value(1), 7);
        let shipped = batch.column(1).as_primitive::<Date32Type>();
        assert_eq!(shipped.value(0), 19_784);
        assert!(shipped.is_null(1));
        assert_eq!(batch.column(2).null_count(), 2);
        assert_eq!(batch.column(3).as_string::<i32>().value(0), "AAE=");
    }

    #[test]
    fn test_values_outside_declared_type_keep_inferred_type() {
        let declared = Schema::new(vec![Field::new("qty", DataType::Int32, true)]);
        let records = tagged(vec![record(json!({"qty": "five"})).into()]);

        let batch = to_record_batch(&records, Some(&declared)).unwrap();

        assert_eq!(batch.schema().field(0).data_type(), &DataType::Utf8);
        assert_eq!(batch.column(0).as_string::<i32>().value(0), "five");
    }

    #[test]
    fn test_envelope_name_collision_is_renamed() {
        let records = tagged(vec![record(json!({"batch_id": "supplier-77", "sku": "A1"})).into()]);

        let batch = to_record_batch(&records, None).unwrap();
        let schema = batch.schema();

        let raw = schema.index_of("_source_batch_id").unwrap();
        assert_eq!(batch.column(raw).as_string::<i32>().value(0), "supplier-77");
        let envelope = schema.index_of("batch_id").unwrap();
        assert_ne!(
            batch.column(envelope).as_string::<i32>().value(0),
            "supplier-77"
        );
    }

    #[test]
    fn test_malformed_rows_carry_corrupt_record() {
        let records = tagged(vec![
            record(json!({"sku": "A1"})).into(),
            MalformedRecord {
                raw: "{not json".to_string(),
                line: 2,
                reason: "parse error".to_string(),
            }
            .into(),
        ]);

        let batch = to_record_batch(&records, None).unwrap();
        let corrupt = batch
            .column(batch.schema().index_of("_corrupt_record").unwrap())
            .as_string::<i32>();

        assert!(corrupt.is_null(0));
        assert_eq!(corrupt.value(1), "{not json");
    }
}

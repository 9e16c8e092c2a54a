//! Ingestion tagger
//!
//! Stamps every record read from one source file with the run's batch id,
//! the file path and one ingestion timestamp taken when the file's records
//! are handed over. The partition key follows from that timestamp alone.
//!
//! Records are never inspected: a file delivered days after the events it
//! describes is tagged exactly like an on-time one and lands in today's
//! partition. Reconciling event dates belongs to the next layer.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::clock::Clock;
use crate::types::{
    BatchId, IngestionEnvelope, MalformedRecord, RawRecord, RecordPayload, TaggedRecord,
};

impl From<RawRecord> for RecordPayload {
    fn from(record: RawRecord) -> Self {
        RecordPayload::Parsed(record)
    }
}

impl From<MalformedRecord> for RecordPayload {
    fn from(record: MalformedRecord) -> Self {
        RecordPayload::Malformed(record)
    }
}

impl From<Result<RawRecord, MalformedRecord>> for RecordPayload {
    fn from(result: Result<RawRecord, MalformedRecord>) -> Self {
        match result {
            Ok(record) => RecordPayload::Parsed(record),
            Err(bad) => RecordPayload::Malformed(bad),
        }
    }
}

/// Tag `records` with a fixed ingestion timestamp.
///
/// Output order and length match the input; payloads pass through untouched.
pub fn tag<I>(
    records: I,
    source_file: &str,
    batch_id: BatchId,
    ingestion_timestamp: DateTime<Utc>,
) -> Vec<TaggedRecord>
where
    I: IntoIterator,
    I::Item: Into<RecordPayload>,
{
    records
        .into_iter()
        .map(|record| {
            let envelope = IngestionEnvelope::new(ingestion_timestamp, source_file, batch_id);
            TaggedRecord::new(envelope, record.into())
        })
        .collect()
}

/// Tagger bound to one run's batch identity.
pub struct IngestionTagger<C> {
    batch_id: BatchId,
    clock: C,
}

impl<C: Clock> IngestionTagger<C> {
    pub fn new(batch_id: BatchId, clock: C) -> Self {
        Self { batch_id, clock }
    }

    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    /// Tag one read batch (the records of one source file).
    ///
    /// The clock is read once per call, so all records handed over together
    /// share a timestamp while separate files keep their own read time.
    pub fn tag<I>(&self, records: I, source_file: &str) -> Vec<TaggedRecord>
    where
        I: IntoIterator,
        I::Item: Into<RecordPayload>,
    {
        let ingestion_timestamp = self.clock.now();
        let tagged = tag(records, source_file, self.batch_id, ingestion_timestamp);
        debug!(
            source_file,
            records = tagged.len(),
            ingestion_timestamp = %ingestion_timestamp,
            "Tagged read batch"
        );
        tagged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::partition::PartitionKey;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(value: serde_json::Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_input_produces_no_records() {
        let tagger = IngestionTagger::new(BatchId::generate(), FixedClock(at(2024, 3, 2, 10)));
        let tagged = tagger.tag(Vec::<RawRecord>::new(), "landing/wms/empty.json");
        assert!(tagged.is_empty());
    }

    #[test]
    fn test_envelope_and_passthrough() {
        let batch_id = BatchId::generate();
        let tagger = IngestionTagger::new(batch_id, FixedClock(at(2024, 3, 2, 10)));
        let input = vec![
            record(json!({"sku": "A1", "qty": "5"})),
            record(json!({"sku": "B2", "qty": "7", "extra": {"nested": [1, 2]}})),
        ];

        let tagged = tagger.tag(input.clone(), "landing/ecommerce/orders.csv");

        assert_eq!(tagged.len(), input.len());
        for (out, original) in tagged.iter().zip(&input) {
            assert_eq!(out.payload(), &RecordPayload::Parsed(original.clone()));
            assert_eq!(out.envelope().batch_id(), batch_id);
            assert_eq!(out.envelope().source_file(), "landing/ecommerce/orders.csv");
            assert_eq!(out.envelope().ingestion_timestamp(), at(2024, 3, 2, 10));
            assert_eq!(
                out.partition_key(),
                PartitionKey {
                    year: 2024,
                    month: 3,
                    day: 2
                }
            );
        }
    }

    #[test]
    fn test_business_dates_are_ignored() {
        let tagger = IngestionTagger::new(BatchId::generate(), FixedClock(at(2024, 3, 4, 9)));
        let tagged = tagger.tag(
            vec![
                record(json!({"sku": "A1", "event_date": "2024-03-02"})),
                record(json!({"sku": "A1", "event_date": "1999-12-31"})),
            ],
            "landing/wms/late.json",
        );

        assert_eq!(tagged[0].partition_key(), tagged[1].partition_key());
        assert_eq!(
            tagged[0].partition_key().hive_path(),
            "year=2024/month=03/day=04"
        );
    }

    #[test]
    fn test_malformed_records_are_forwarded() {
        let tagger = IngestionTagger::new(BatchId::generate(), FixedClock(at(2024, 3, 2, 10)));
        let input: Vec<Result<RawRecord, MalformedRecord>> = vec![
            Ok(record(json!({"sku": "A1"}))),
            Err(MalformedRecord {
                raw: "{broken".to_string(),
                line: 2,
                reason: "EOF while parsing an object".to_string(),
            }),
        ];

        let tagged = tagger.tag(input, "landing/wms/mixed.json");

        assert_eq!(tagged.len(), 2);
        assert!(!tagged[0].payload().is_malformed());
        assert!(tagged[1].payload().is_malformed());
        assert_eq!(tagged[1].envelope().source_file(), "landing/wms/mixed.json");
    }

    #[test]
    fn test_separate_runs_get_separate_batch_ids() {
        let clock = FixedClock(at(2024, 3, 2, 10));
        let first = IngestionTagger::new(BatchId::generate(), clock);
        let second = IngestionTagger::new(BatchId::generate(), clock);
        let input = vec![record(json!({"sku": "A1"}))];

        let a = first.tag(input.clone(), "f.json");
        let b = second.tag(input, "f.json");

        assert_ne!(a[0].envelope().batch_id(), b[0].envelope().batch_id());
    }
}

// bronze-ingest-core - Ingestion metadata and partitioning policy
//
// This crate contains the PURE tagging logic of the bronze layer.
// No I/O, no async, no runtime dependencies.
//
// - Every raw record gets an ingestion envelope (timestamp, source file, batch id)
// - The partition key is derived from the ingestion timestamp only
// - Business timestamps embedded in records are never inspected, so a late
//   file simply lands in the partition of the day it was observed

pub mod clock;
pub mod location;
pub mod partition;
pub mod tagger;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use location::{LocationError, StoreLocation};
pub use partition::{partition_dir, PartitionKey};
pub use tagger::{tag, IngestionTagger};
pub use types::{
    BatchId, FileFormat, IngestionEnvelope, MalformedRecord, RawRecord, RecordPayload,
    SourceDescriptor, SourceSystem, TaggedRecord, UnknownSourceSystem, CORRUPT_RECORD_FIELD,
};

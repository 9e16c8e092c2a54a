//! Batch reader trait and its OpenDAL implementation

use arrow::datatypes::SchemaRef;
use async_trait::async_trait;
use bronze_ingest_core::{FileFormat, StoreLocation};
use opendal::Operator;
use tracing::{debug, info};

use crate::{format, ParsedRecord, ReaderError, Result};

/// A data file discovered under an input location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFileRef {
    /// Path relative to the reader's storage root
    pub path: String,
    /// Fully qualified path recorded as `source_file`
    pub uri: String,
}

/// Records parsed from one source file, in file order.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub uri: String,
    pub records: Vec<ParsedRecord>,
    /// Schema embedded in the file, for self-describing formats
    pub schema: Option<SchemaRef>,
}

impl SourceFile {
    pub fn malformed_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_err()).count()
    }
}

/// Converts a directory of source-formatted files into untyped records.
#[async_trait]
pub trait BatchReader: Send + Sync {
    /// Data files under `location`, in lexical order.
    async fn list_files(&self, location: &StoreLocation) -> Result<Vec<SourceFileRef>>;

    /// Read and parse one file.
    async fn read_file(&self, file: &SourceFileRef, format: FileFormat) -> Result<SourceFile>;

    /// Read every data file under `location`.
    async fn read(&self, location: &StoreLocation, format: FileFormat) -> Result<Vec<SourceFile>> {
        let mut files = Vec::new();
        for file in self.list_files(location).await? {
            files.push(self.read_file(&file, format).await?);
        }
        Ok(files)
    }
}

/// Reader over any OpenDAL operator (filesystem, S3, memory).
///
/// Filesystem operators must be rooted at the input directory itself; for S3
/// and memory locations the operator is rooted at the bucket/store and the
/// location prefix is listed inside it.
#[derive(Clone)]
pub struct OpenDalReader {
    operator: Operator,
}

impl OpenDalReader {
    pub fn new(operator: Operator) -> Self {
        Self { operator }
    }
}

#[async_trait]
impl BatchReader for OpenDalReader {
    async fn list_files(&self, location: &StoreLocation) -> Result<Vec<SourceFileRef>> {
        let prefix = location.prefix();
        let list_path = if prefix.is_empty() { "/" } else { prefix };

        let entries = self
            .operator
            .list_with(list_path)
            .recursive(true)
            .await
            .map_err(|e| ReaderError::source_unavailable(location.to_string(), e))?;

        let mut files: Vec<SourceFileRef> = entries
            .into_iter()
            .filter(|entry| entry.metadata().is_file() && !entry.path().ends_with('/'))
            .filter(|entry| {
                let relative = entry.path().strip_prefix(prefix).unwrap_or(entry.path());
                !is_hidden(relative)
            })
            .map(|entry| {
                let path = entry.path().to_string();
                let relative = path.strip_prefix(prefix).unwrap_or(&path).to_string();
                SourceFileRef {
                    uri: location.display_path(&relative),
                    path,
                }
            })
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));

        // Object stores have no empty directories: nothing under the prefix
        // means the feed location does not exist.
        if files.is_empty() && !matches!(location, StoreLocation::Fs { .. }) {
            return Err(ReaderError::source_unavailable(
                location.to_string(),
                "no objects found under location",
            ));
        }

        info!(location = %location, files = files.len(), "Listed source files");
        Ok(files)
    }

    async fn read_file(&self, file: &SourceFileRef, format: FileFormat) -> Result<SourceFile> {
        let bytes = self
            .operator
            .read(&file.path)
            .await
            .map_err(|e| ReaderError::source_unavailable(file.uri.clone(), e))?
            .to_bytes();

        let parsed = format::parse(format, &file.uri, bytes);
        let source = SourceFile {
            uri: file.uri.clone(),
            records: parsed.records,
            schema: parsed.schema,
        };

        debug!(
            source_file = %source.uri,
            format = %format,
            records = source.records.len(),
            malformed = source.malformed_count(),
            "Read source file"
        );
        Ok(source)
    }
}

/// Entries whose name, or any parent directory below the listed prefix,
/// starts with `_` or `.` are bookkeeping files (`_SUCCESS`, `.crc`, ...).
fn is_hidden(relative_path: &str) -> bool {
    relative_path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .any(|segment| segment.starts_with('_') || segment.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opendal::services;
    use serde_json::json;

    async fn memory_store(files: &[(&str, &str)]) -> Operator {
        let op = Operator::new(services::Memory::default()).unwrap().finish();
        for (path, content) in files {
            op.write(path, content.as_bytes().to_vec()).await.unwrap();
        }
        op
    }

    #[test]
    fn test_is_hidden() {
        assert!(is_hidden("_SUCCESS"));
        assert!(is_hidden("part-0.json.crc/.x"));
        assert!(is_hidden("_temporary/0/part.json"));
        assert!(!is_hidden("2024/03/orders.json"));
    }

    #[tokio::test]
    async fn test_list_skips_hidden_and_foreign_prefixes() {
        let op = memory_store(&[
            ("wms/b.json", "{}"),
            ("wms/a.json", "{}"),
            ("wms/_SUCCESS", ""),
            ("wms/.a.json.crc", ""),
            ("erp/c.parquet", ""),
        ])
        .await;
        let reader = OpenDalReader::new(op);
        let location = StoreLocation::parse("memory://wms/").unwrap();

        let files = reader.list_files(&location).await.unwrap();

        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["wms/a.json", "wms/b.json"]);
        assert_eq!(files[0].uri, "memory://wms/a.json");
    }

    #[tokio::test]
    async fn test_missing_location_is_unavailable() {
        let reader = OpenDalReader::new(memory_store(&[("wms/a.json", "{}")]).await);
        let location = StoreLocation::parse("memory://erp/").unwrap();

        let err = reader.list_files(&location).await.unwrap_err();
        assert!(matches!(err, ReaderError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_read_all_files() {
        let op = memory_store(&[
            ("ecommerce/orders-1.csv", "sku,qty\nA1,5\n"),
            ("ecommerce/orders-2.csv", "sku,qty\nB2,1\nC3\n"),
        ])
        .await;
        let reader = OpenDalReader::new(op);
        let location = StoreLocation::parse("memory://ecommerce").unwrap();

        let files = reader.read(&location, FileFormat::Csv).await.unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].uri, "memory://ecommerce/orders-1.csv");
        assert_eq!(files[0].records[0].as_ref().unwrap()["qty"], json!("5"));
        assert_eq!(files[1].records.len(), 2);
        assert_eq!(files[1].malformed_count(), 1);
    }

    #[tokio::test]
    async fn test_unopenable_file_does_not_fail_the_read() {
        let op = memory_store(&[("erp/b-truncated.parquet", "PAR1 truncated upload")]).await;
        let reader = OpenDalReader::new(op);
        let location = StoreLocation::parse("memory://erp/").unwrap();

        let files = reader.read(&location, FileFormat::Parquet).await.unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].malformed_count(), 1);
        assert!(files[0].schema.is_none());
    }
}

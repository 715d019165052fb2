//! Named-table storage on top of the object_store crate.
//!
//! Every table is one object, `<name>.parquet`, at the root of the store.
//! Writing a table replaces the object wholesale, so regenerating one table
//! never touches any other.

use async_trait::async_trait;
use datafusion::arrow::compute::concat_batches;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::parquet::arrow::ArrowWriter;
use datafusion::parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use datafusion::parquet::file::reader::ChunkReader;
use object_store::{
    ObjectStore, PutPayload, local::LocalFileSystem, memory::InMemory, path::Path as ObjectPath,
};
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

use crate::error::{CommonError, ErrorContext, Result};

const TABLE_EXTENSION: &str = "parquet";

/// Storage interface for named tables.
///
/// Implementations own the persisted tables; callers only ever see whole
/// `RecordBatch`es.
#[async_trait]
pub trait TableStore: Send + Sync + Debug {
    /// Names of all stored tables, sorted.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Read a whole table. Fails with `NotFoundError` if it does not exist.
    async fn read_table(&self, name: &str) -> Result<RecordBatch>;

    /// Write a table, replacing any existing table with the same name.
    async fn write_table(&self, name: &str, batch: &RecordBatch) -> Result<()>;

    /// Remove a table. Removing a missing table is not an error.
    async fn drop_table(&self, name: &str) -> Result<()>;

    /// Check if a table exists.
    async fn contains_table(&self, name: &str) -> Result<bool>;

    /// Operation counters since the store was opened.
    async fn stats(&self) -> StoreStats;

    /// Release the store. Every later operation fails.
    async fn close(&self) -> Result<()>;
}

/// Store statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub read_count: u64,
    pub write_count: u64,
    pub delete_count: u64,
    pub error_count: u64,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Default)]
pub enum StoreBackend {
    /// In-memory storage for tests.
    #[default]
    Memory,
    /// A local directory, created on open if missing.
    LocalFileSystem { root_path: String },
}

/// Configuration for store creation.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Storage backend to use.
    pub backend: StoreBackend,
}

/// Builder for creating table store instances.
#[derive(Debug, Default)]
pub struct TableStoreBuilder {
    config: StoreConfig,
}

impl TableStoreBuilder {
    /// Create a new builder with the in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the storage backend.
    pub fn backend(mut self, backend: StoreBackend) -> Self {
        self.config.backend = backend;
        self
    }

    /// Shorthand for a local directory backend.
    pub fn local<S: Into<String>>(self, root_path: S) -> Self {
        self.backend(StoreBackend::LocalFileSystem {
            root_path: root_path.into(),
        })
    }

    /// Open the store.
    pub async fn build(self) -> Result<Arc<dyn TableStore>> {
        let store = ObjectTableStore::open(self.config).await?;
        Ok(Arc::new(store))
    }
}

/// Internal statistics tracker for store operations.
#[derive(Debug, Default)]
struct InternalStoreStats {
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
}

impl InternalStoreStats {
    fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StoreStats {
        StoreStats {
            read_count: self.reads.load(Ordering::Acquire),
            write_count: self.writes.load(Ordering::Acquire),
            delete_count: self.deletes.load(Ordering::Acquire),
            error_count: self.errors.load(Ordering::Acquire),
        }
    }
}

/// Object store-based table store.
struct ObjectTableStore {
    store: Arc<dyn ObjectStore>,
    config: StoreConfig,
    stats: InternalStoreStats,
    closed: AtomicBool,
}

impl Debug for ObjectTableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectTableStore")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .field("closed", &self.closed)
            .finish()
    }
}

impl ObjectTableStore {
    async fn open(config: StoreConfig) -> Result<Self> {
        let store: Arc<dyn ObjectStore> = match &config.backend {
            StoreBackend::Memory => Arc::new(InMemory::new()),
            StoreBackend::LocalFileSystem { root_path } => {
                tokio::fs::create_dir_all(root_path)
                    .await
                    .with_io_context(|| format!("Failed to create store directory {root_path}"))?;
                let fs = LocalFileSystem::new_with_prefix(root_path).with_storage_context(|| {
                    format!("Failed to open local filesystem store at {root_path}")
                })?;
                Arc::new(fs)
            }
        };

        debug!(backend = ?config.backend, "opened table store");
        Ok(Self {
            store,
            config,
            stats: InternalStoreStats::default(),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CommonError::storage_error("table store is closed"));
        }
        Ok(())
    }

    /// Map a table name to its object path.
    fn table_path(name: &str) -> Result<ObjectPath> {
        validate_table_name(name)?;
        Ok(ObjectPath::from(format!("{name}.{TABLE_EXTENSION}")))
    }

    /// Map an object path back to a table name, skipping foreign objects.
    fn path_to_table(path: &ObjectPath) -> Option<String> {
        let filename = path.filename()?;
        let name = filename.strip_suffix(&format!(".{TABLE_EXTENSION}"))?;
        validate_table_name(name).ok()?;
        Some(name.to_string())
    }

    fn convert_error(&self, context: String, error: object_store::Error) -> CommonError {
        self.stats.record_error();
        CommonError::storage_error_with_source(context, error)
    }
}

#[async_trait]
impl TableStore for ObjectTableStore {
    async fn list_tables(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        let listing = self
            .store
            .list_with_delimiter(None)
            .await
            .map_err(|e| self.convert_error("Failed to list tables".to_string(), e))?;
        self.stats.record_read();

        let mut names: Vec<String> = listing
            .objects
            .iter()
            .filter_map(|meta| Self::path_to_table(&meta.location))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn read_table(&self, name: &str) -> Result<RecordBatch> {
        self.ensure_open()?;
        let path = Self::table_path(name)?;

        let bytes = match self.store.get(&path).await {
            Ok(get_result) => get_result
                .bytes()
                .await
                .map_err(|e| self.convert_error(format!("Failed to read table {name}"), e))?,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(CommonError::not_found_error(name.to_string()));
            }
            Err(e) => return Err(self.convert_error(format!("Failed to read table {name}"), e)),
        };
        self.stats.record_read();

        decode_table(bytes).inspect_err(|_| self.stats.record_error())
    }

    async fn write_table(&self, name: &str, batch: &RecordBatch) -> Result<()> {
        self.ensure_open()?;
        let path = Self::table_path(name)?;
        let encoded = encode_table(batch)?;
        let size = encoded.len();

        self.store
            .put(&path, PutPayload::from(encoded))
            .await
            .map_err(|e| self.convert_error(format!("Failed to write table {name}"), e))?;
        self.stats.record_write();

        debug!(table = name, rows = batch.num_rows(), bytes = size, "wrote table");
        Ok(())
    }

    async fn drop_table(&self, name: &str) -> Result<()> {
        self.ensure_open()?;
        let path = Self::table_path(name)?;

        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => {
                self.stats.record_delete();
                Ok(())
            }
            Err(e) => Err(self.convert_error(format!("Failed to drop table {name}"), e)),
        }
    }

    async fn contains_table(&self, name: &str) -> Result<bool> {
        self.ensure_open()?;
        let path = Self::table_path(name)?;

        match self.store.head(&path).await {
            Ok(_) => {
                self.stats.record_read();
                Ok(true)
            }
            Err(object_store::Error::NotFound { .. }) => {
                self.stats.record_read();
                Ok(false)
            }
            Err(e) => Err(self.convert_error(format!("Failed to look up table {name}"), e)),
        }
    }

    async fn stats(&self) -> StoreStats {
        self.stats.snapshot()
    }

    async fn close(&self) -> Result<()> {
        // Writes are durable once `put` returns; closing only fences the handle.
        self.closed.store(true, Ordering::Release);
        debug!(stats = ?self.stats.snapshot(), "closed table store");
        Ok(())
    }
}

/// Table names double as SQL identifiers and object paths.
pub fn validate_table_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(CommonError::storage_error(format!(
            "Invalid table name {name:?}: use ASCII letters, digits and underscores"
        )))
    }
}

fn encode_table(batch: &RecordBatch) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), None)
        .with_serialization_context(|| "Failed to create parquet writer".to_string())?;
    writer
        .write(batch)
        .with_serialization_context(|| "Failed to encode table".to_string())?;
    writer
        .close()
        .with_serialization_context(|| "Failed to finish parquet file".to_string())?;
    Ok(buffer)
}

fn decode_table<R: ChunkReader + 'static>(reader: R) -> Result<RecordBatch> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(reader)
        .with_serialization_context(|| "Failed to read parquet metadata".to_string())?;
    let schema = builder.schema().clone();
    let batches = builder
        .build()
        .with_serialization_context(|| "Failed to open parquet reader".to_string())?
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_serialization_context(|| "Failed to decode table".to_string())?;

    concat_batches(&schema, &batches)
        .with_serialization_context(|| "Failed to combine table batches".to_string())
}

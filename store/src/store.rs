//! The metadata store facade.
//!
//! `MetadataStore` composes a [`MetadataBackend`] with a [`MetadataCache`].
//! Reads consult the cache first and fall back to the backend; every mutation
//! is written through the backend before the cache is updated, so a reader
//! that starts after a write returns observes the written value.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::backend::{FileBackend, MetadataBackend};
use crate::cache::{CacheStats, MetadataCache};
use crate::config::StoreConfig;
use crate::context::{extract_table_name_from_context, parse_field_descriptions};
use crate::error::{MetadataError, Result};
use crate::record::{FieldDescriptor, TableMetadata, validate_table_name};
use crate::render::render_table_context;
use crate::transfer::{ImportFailure, ImportReport};

/// Persistent, cached store of table metadata.
///
/// Writes to one table are serialized by a per-table lock, which also guards
/// the cache fill on a miss. Operations on different tables never contend.
pub struct MetadataStore<B = FileBackend> {
    /// Durable storage.
    backend: B,

    /// Read cache in front of the backend.
    cache: MetadataCache,

    /// Per-table locks for read-modify-write sequences.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MetadataStore<FileBackend> {
    /// Open a file-backed store described by `config`.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let backend = FileBackend::new(&config.storage_dir)?;
        let mut cache = MetadataCache::new(config.cache_ttl());
        if let Some(max_entries) = config.cache_max_entries {
            cache = cache.with_max_entries(max_entries);
        }
        Ok(Self::new(backend, cache))
    }

    /// Directory holding the record files.
    pub fn storage_dir(&self) -> &Path {
        self.backend.root()
    }
}

impl<B: MetadataBackend> MetadataStore<B> {
    /// Create a store from an explicit backend and cache.
    pub fn new(backend: B, cache: MetadataCache) -> Self {
        Self {
            backend,
            cache,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Validate and persist a record, replacing any previous one.
    ///
    /// `last_updated` is stamped here; a caller-supplied value is ignored.
    pub fn store_metadata(&self, record: TableMetadata) -> Result<Arc<TableMetadata>> {
        record.validate()?;
        let table = record.table_name.clone();
        self.with_table_lock(&table, || self.persist(record))
    }

    /// Get the metadata for a table.
    pub fn get_metadata(&self, table_name: &str) -> Result<Arc<TableMetadata>> {
        validate_table_name(table_name)?;
        if let Some(record) = self.cache.get(table_name) {
            debug!("Cache hit for table: {table_name}");
            return Ok(record);
        }
        self.with_table_lock(table_name, || self.load(table_name))
    }

    /// Delete the metadata for a table. Deleting a missing table succeeds.
    pub fn delete_metadata(&self, table_name: &str) -> Result<()> {
        validate_table_name(table_name)?;
        self.with_table_lock(table_name, || {
            self.backend.delete(table_name)?;
            self.cache.invalidate(table_name);
            Ok(())
        })
    }

    /// Names of all persisted tables, sorted.
    pub fn list_stored_tables(&self) -> Result<Vec<String>> {
        let mut tables = self.backend.list_tables()?.collect::<Result<Vec<_>>>()?;
        tables.sort();
        Ok(tables)
    }

    /// Get a table's metadata only if it is recorded under `schema_name`.
    ///
    /// A record with another schema, or none, is reported as `NotFound`.
    pub fn get_metadata_in_schema(
        &self,
        table_name: &str,
        schema_name: &str,
    ) -> Result<Arc<TableMetadata>> {
        let record = self.get_metadata(table_name)?;
        if record.in_schema(schema_name) {
            Ok(record)
        } else {
            Err(MetadataError::NotFound(format!("{schema_name}.{table_name}")))
        }
    }

    /// Names of persisted tables recorded under `schema_name`, sorted.
    pub fn list_stored_tables_in_schema(&self, schema_name: &str) -> Result<Vec<String>> {
        let mut tables = Vec::new();
        for table_name in self.list_stored_tables()? {
            match self.get_metadata(&table_name) {
                Ok(record) if record.in_schema(schema_name) => tables.push(table_name),
                Ok(_) => {}
                Err(e) if e.is_not_found() => {
                    debug!("Table removed while listing: {table_name}");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(tables)
    }

    /// Delete a table's metadata if it is recorded under `schema_name`.
    ///
    /// Returns whether a record was removed; a missing record or one in
    /// another schema is left alone.
    pub fn delete_metadata_in_schema(&self, table_name: &str, schema_name: &str) -> Result<bool> {
        validate_table_name(table_name)?;
        self.with_table_lock(table_name, || {
            match self.load(table_name) {
                Ok(record) if record.in_schema(schema_name) => {}
                Ok(_) => return Ok(false),
                Err(e) if e.is_not_found() => return Ok(false),
                Err(e) => return Err(e),
            }
            self.backend.delete(table_name)?;
            self.cache.invalidate(table_name);
            Ok(true)
        })
    }

    /// Overlay field descriptions onto a table's record.
    ///
    /// Existing fields named in `descriptions` get the new description and
    /// keep their other attributes; unknown names are appended in iteration
    /// order; other fields are untouched. A missing table starts empty.
    pub fn bulk_update_from_descriptions<I, K, V>(
        &self,
        table_name: &str,
        descriptions: I,
    ) -> Result<Arc<TableMetadata>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let descriptions: Vec<(String, String)> = descriptions
            .into_iter()
            .map(|(name, description)| (name.into(), description.into()))
            .collect();

        self.modify(table_name, |record| {
            for (name, description) in descriptions {
                let field = match record.field(&name) {
                    Some(existing) => FieldDescriptor {
                        description,
                        ..existing.clone()
                    },
                    None => FieldDescriptor::new(name, description),
                };
                record.upsert_field(field);
            }
        })
    }

    /// Set the business context of a table, leaving its fields untouched.
    ///
    /// A table without a record gets a new, empty-fields record instead of a
    /// `NotFound` error, so the first note on a table needs no setup.
    /// Whitespace-only text clears the context.
    pub fn update_business_context(
        &self,
        table_name: &str,
        text: &str,
    ) -> Result<Arc<TableMetadata>> {
        let context = non_blank(text);
        self.modify(table_name, |record| record.business_context = context)
    }

    /// Set the table-level description. Creates the record when missing.
    pub fn update_table_description(
        &self,
        table_name: &str,
        text: &str,
    ) -> Result<Arc<TableMetadata>> {
        let description = non_blank(text);
        self.modify(table_name, |record| record.description = description)
    }

    /// Update one field's description, creating the table or field as needed.
    ///
    /// The field's data type is preserved. `business_context` replaces the
    /// field's context only when given.
    pub fn update_field_description(
        &self,
        table_name: &str,
        field_name: &str,
        description: &str,
        business_context: Option<&str>,
    ) -> Result<Arc<TableMetadata>> {
        self.modify(table_name, |record| {
            let mut field = record
                .field(field_name)
                .cloned()
                .unwrap_or_else(|| FieldDescriptor::new(field_name, ""));
            field.description = description.to_string();
            if let Some(context) = business_context {
                field.business_context = non_blank(context);
            }
            record.upsert_field(field);
        })
    }

    /// Store field descriptions written as `TABLE: name` followed by
    /// `field: description` lines.
    pub fn store_from_context(&self, context: &str) -> Result<Arc<TableMetadata>> {
        let table_name = extract_table_name_from_context(context)
            .ok_or_else(|| MetadataError::validation("", "context has no 'TABLE:' line"))?;
        let descriptions = parse_field_descriptions(context);
        if descriptions.is_empty() {
            return Err(MetadataError::validation(
                table_name,
                "context has no field descriptions",
            ));
        }
        self.bulk_update_from_descriptions(&table_name, descriptions)
    }

    /// Rendered prompt context for a table, or `None` if nothing is stored.
    pub fn describe_table(&self, table_name: &str) -> Result<Option<String>> {
        match self.get_metadata(table_name) {
            Ok(record) => Ok(Some(render_table_context(&record))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Every persisted record, keyed by table name.
    ///
    /// Records come straight from the backend in one enumeration pass; tables
    /// deleted during the pass are skipped.
    pub fn export_all_metadata(&self) -> Result<BTreeMap<String, TableMetadata>> {
        let mut tables = BTreeMap::new();
        for table_name in self.backend.list_tables()? {
            let table_name = table_name?;
            match self.backend.read(&table_name) {
                Ok(record) => {
                    tables.insert(table_name, record);
                }
                Err(e) if e.is_not_found() => {
                    debug!("Table removed during export: {table_name}");
                }
                Err(e) => return Err(e),
            }
        }
        info!("Exported metadata for {} tables", tables.len());
        Ok(tables)
    }

    /// Persisted records for the named tables. Missing tables are skipped.
    pub fn export_tables<S: AsRef<str>>(
        &self,
        table_names: &[S],
    ) -> Result<BTreeMap<String, TableMetadata>> {
        let mut tables = BTreeMap::new();
        for table_name in table_names {
            let table_name = table_name.as_ref();
            match self.backend.read(table_name) {
                Ok(record) => {
                    tables.insert(table_name.to_string(), record);
                }
                Err(e) if e.is_not_found() => {
                    warn!("No metadata to export for table: {table_name}");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(tables)
    }

    /// Store every record in `tables`, continuing past failures.
    ///
    /// There is no rollback: tables stored before a failure stay stored. An
    /// entry whose key differs from its record's table name is rejected.
    pub fn import_metadata<I>(&self, tables: I) -> ImportReport
    where
        I: IntoIterator<Item = (String, TableMetadata)>,
    {
        let mut report = ImportReport::default();
        for (table_name, record) in tables {
            let result = if record.table_name == table_name {
                self.store_metadata(record).map(|_| ())
            } else {
                Err(MetadataError::validation(
                    &table_name,
                    format!("entry holds metadata for table '{}'", record.table_name),
                ))
            };

            match result {
                Ok(()) => report.imported.push(table_name),
                Err(error) => {
                    warn!("Failed to import metadata for table {table_name}: {error}");
                    report.failures.push(ImportFailure {
                        table: table_name,
                        error,
                    });
                }
            }
        }

        info!(
            "Imported metadata for {} tables ({} failed)",
            report.imported.len(),
            report.failures.len()
        );
        report
    }

    /// Drop all cached records so the next reads hit the backend.
    pub fn reload(&self) {
        self.cache.invalidate_all();
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn table_lock(&self, table_name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(table_name.to_string()).or_default())
    }

    fn with_table_lock<T>(&self, table_name: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self.table_lock(table_name);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        self.release_table_lock(table_name, lock);
        result
    }

    /// Drop the map entry once no other thread holds or waits on the lock.
    fn release_table_lock(&self, table_name: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(table_name);
        }
    }

    /// Read through the cache. Caller holds the table lock.
    fn load(&self, table_name: &str) -> Result<Arc<TableMetadata>> {
        if let Some(record) = self.cache.get(table_name) {
            return Ok(record);
        }
        let record = Arc::new(self.backend.read(table_name)?);
        self.cache.put(table_name, Arc::clone(&record));
        Ok(record)
    }

    /// Stamp, write and cache a validated record. Caller holds the table lock.
    fn persist(&self, mut record: TableMetadata) -> Result<Arc<TableMetadata>> {
        record.last_updated = Some(Utc::now());
        if let Err(e) = self.backend.write(&record) {
            self.cache.invalidate(&record.table_name);
            return Err(e);
        }

        let record = Arc::new(record);
        self.cache.put(&record.table_name, Arc::clone(&record));
        info!(
            "Stored metadata for table {} ({} fields)",
            record.table_name,
            record.fields.len()
        );
        Ok(record)
    }

    /// Read-modify-write of one table's record under its lock.
    fn modify(
        &self,
        table_name: &str,
        apply: impl FnOnce(&mut TableMetadata),
    ) -> Result<Arc<TableMetadata>> {
        validate_table_name(table_name)?;
        self.with_table_lock(table_name, || {
            let mut record = match self.load(table_name) {
                Ok(current) => TableMetadata::clone(&current),
                Err(e) if e.is_not_found() => TableMetadata::new(table_name),
                Err(e) => return Err(e),
            };
            apply(&mut record);
            record.validate()?;
            self.persist(record)
        })
    }
}

fn non_blank(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

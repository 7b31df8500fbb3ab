//! Export and import of metadata documents.
//!
//! An export document is a single JSON object:
//!
//! ```json
//! { "version": 1, "exported_at": "2024-01-01T00:00:00Z", "tables": { "users": { ... } } }
//! ```
//!
//! Import also accepts a `version`-less `{ "tables": { ... } }` document and a
//! bare `{ "users": { ... } }` object. Documents from a newer format version
//! are rejected.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::backend::{MetadataBackend, write_atomic};
use crate::error::{MetadataError, Result, StorageError};
use crate::record::TableMetadata;
use crate::store::MetadataStore;

/// Serialized form of an export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    /// Version of the document format.
    pub version: u32,

    /// When the export was taken.
    pub exported_at: DateTime<Utc>,

    /// Exported records keyed by table name.
    pub tables: BTreeMap<String, TableMetadata>,
}

impl ExportDocument {
    pub const CURRENT_VERSION: u32 = 1;

    /// Wrap a set of records in a document stamped now.
    pub fn new(tables: BTreeMap<String, TableMetadata>) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            exported_at: Utc::now(),
            tables,
        }
    }
}

/// Outcome of a best-effort import.
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Tables stored successfully, in processing order.
    pub imported: Vec<String>,

    /// Tables that could not be stored.
    pub failures: Vec<ImportFailure>,
}

impl ImportReport {
    /// Whether every entry was imported.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A table that failed to import, with the reason.
#[derive(Debug)]
pub struct ImportFailure {
    /// Table name (the document key).
    pub table: String,

    /// Why the table was not stored.
    pub error: MetadataError,
}

impl<B: MetadataBackend> MetadataStore<B> {
    /// Write an export document to `path`, replacing any existing file.
    ///
    /// Exports every table when `table_names` is `None`. Returns the number of
    /// exported tables.
    pub fn export_to_file(
        &self,
        path: impl AsRef<Path>,
        table_names: Option<&[String]>,
    ) -> Result<usize> {
        let path = path.as_ref();
        let tables = match table_names {
            Some(names) => self.export_tables(names)?,
            None => self.export_all_metadata()?,
        };
        let count = tables.len();

        let content = serde_json::to_vec_pretty(&ExportDocument::new(tables))?;
        write_atomic(path, &content)?;

        info!("Exported {count} tables to {}", path.display());
        Ok(count)
    }

    /// Import a document written by [`export_to_file`](Self::export_to_file).
    ///
    /// Each entry is decoded on its own, so a malformed entry is reported as a
    /// failure for that table without affecting the others.
    pub fn import_from_file(&self, path: impl AsRef<Path>) -> Result<ImportReport> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| StorageError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

        let entries = document_entries(path, &content)?;
        let mut records = Vec::with_capacity(entries.len());
        let mut malformed = Vec::new();
        for (table_name, value) in entries {
            match serde_json::from_value::<TableMetadata>(value) {
                Ok(record) => records.push((table_name, record)),
                Err(e) => {
                    warn!("Skipping malformed entry for table {table_name}: {e}");
                    malformed.push(ImportFailure {
                        error: MetadataError::validation(
                            &table_name,
                            format!("malformed record: {e}"),
                        ),
                        table: table_name,
                    });
                }
            }
        }

        let mut report = self.import_metadata(records);
        report.failures.extend(malformed);
        Ok(report)
    }
}

/// Pull the table -> record entries out of an import document.
///
/// A document with a numeric `version`, or with a `tables` object that is a
/// table map rather than a record, is an export document. Anything else is a
/// bare map, where `tables` and `version` may name ordinary tables.
fn document_entries(path: &Path, content: &str) -> Result<serde_json::Map<String, Value>> {
    let invalid = |reason: String| MetadataError::InvalidDocument {
        path: path.to_path_buf(),
        reason,
    };

    let value: Value = serde_json::from_str(content).map_err(|e| invalid(e.to_string()))?;
    let Value::Object(mut document) = value else {
        return Err(invalid("expected a JSON object".to_string()));
    };

    if let Some(Value::Number(version)) = document.get("version") {
        if version.as_u64() != Some(u64::from(ExportDocument::CURRENT_VERSION)) {
            return Err(invalid(format!(
                "unsupported document version {version} (expected {})",
                ExportDocument::CURRENT_VERSION
            )));
        }
        return match document.remove("tables") {
            Some(Value::Object(tables)) => Ok(tables),
            Some(_) => Err(invalid("'tables' must be an object".to_string())),
            None => Err(invalid("missing 'tables'".to_string())),
        };
    }

    match document.remove("tables") {
        Some(Value::Object(tables)) if !is_record(&tables) => Ok(tables),
        Some(other) => {
            document.insert("tables".to_string(), other);
            Ok(document)
        }
        None => Ok(document),
    }
}

/// A record object names its table with a string; a table map's values are
/// all objects.
fn is_record(object: &serde_json::Map<String, Value>) -> bool {
    matches!(object.get("table_name"), Some(Value::String(_)))
}

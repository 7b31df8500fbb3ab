//! Durable storage of table metadata records.
//!
//! Each table is stored as one pretty-printed JSON file named after the
//! percent-encoded table name. Writes go to a `.tmp` sibling first and are
//! renamed into place, so a reader never sees a half-written record.

use std::ffi::OsString;
use std::fs::{self, File, ReadDir};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{MetadataError, Result, StorageError};
use crate::record::TableMetadata;

/// Extension of persisted record files.
const RECORD_EXTENSION: &str = "json";

/// Storage backend for table metadata records.
pub trait MetadataBackend: Send + Sync {
    /// Persist a record, atomically replacing any previous one for the table.
    fn write(&self, record: &TableMetadata) -> Result<()>;

    /// Read the record for a table.
    ///
    /// Fails with [`MetadataError::NotFound`] when nothing is stored and
    /// [`MetadataError::CorruptData`] when the stored content is unusable.
    fn read(&self, table_name: &str) -> Result<TableMetadata>;

    /// Enumerate the names of stored tables, in no particular order.
    fn list_tables(&self) -> Result<Box<dyn Iterator<Item = Result<String>> + Send + '_>>;

    /// Remove the record for a table. Removing a missing record succeeds.
    fn delete(&self, table_name: &str) -> Result<()>;
}

/// File-per-table backend rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    /// Root directory for record files.
    root: PathBuf,
}

impl FileBackend {
    /// Create a backend at the given root directory.
    ///
    /// This will create the directory if it doesn't exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|source| StorageError::CreateDirectory {
            path: root.clone(),
            source,
        })?;

        info!("Table metadata storage at {}", root.display());
        Ok(Self { root })
    }

    /// Root directory of the backend.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the path for a table's record file.
    pub fn table_path(&self, table_name: &str) -> PathBuf {
        self.root
            .join(format!("{}.{RECORD_EXTENSION}", urlencoding::encode(table_name)))
    }

    /// Lazily iterate over the stored table names.
    pub fn table_names(&self) -> Result<TableNames> {
        let entries = fs::read_dir(&self.root).map_err(|source| StorageError::ListDirectory {
            path: self.root.clone(),
            source,
        })?;

        Ok(TableNames {
            dir: self.root.clone(),
            entries,
        })
    }
}

impl MetadataBackend for FileBackend {
    fn write(&self, record: &TableMetadata) -> Result<()> {
        let table = record.table_name.as_str();
        let content = serde_json::to_vec_pretty(record)?;

        fs::create_dir_all(&self.root).map_err(|source| {
            MetadataError::persistence(
                table,
                StorageError::CreateDirectory {
                    path: self.root.clone(),
                    source,
                },
            )
        })?;

        let path = self.table_path(table);
        write_atomic(&path, &content).map_err(|e| MetadataError::persistence(table, e))?;

        debug!("Saved metadata for table: {table}");
        Ok(())
    }

    fn read(&self, table_name: &str) -> Result<TableMetadata> {
        let path = self.table_path(table_name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(MetadataError::NotFound(table_name.to_string()));
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(MetadataError::corrupt(table_name, e.to_string()));
            }
            Err(source) => {
                return Err(MetadataError::persistence(
                    table_name,
                    StorageError::ReadFile { path, source },
                ));
            }
        };

        let record: TableMetadata = serde_json::from_str(&content)
            .map_err(|e| MetadataError::corrupt(table_name, e.to_string()))?;

        if record.table_name != table_name {
            return Err(MetadataError::corrupt(
                table_name,
                format!("file holds metadata for table '{}'", record.table_name),
            ));
        }
        record
            .validate()
            .map_err(|e| MetadataError::corrupt(table_name, e.to_string()))?;

        debug!("Loaded metadata for table: {table_name}");
        Ok(record)
    }

    fn list_tables(&self) -> Result<Box<dyn Iterator<Item = Result<String>> + Send + '_>> {
        Ok(Box::new(self.table_names()?))
    }

    fn delete(&self, table_name: &str) -> Result<()> {
        let path = self.table_path(table_name);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Deleted metadata for table: {table_name}");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No metadata to delete for table: {table_name}");
                Ok(())
            }
            Err(source) => Err(MetadataError::persistence(
                table_name,
                StorageError::DeleteFile { path, source },
            )),
        }
    }
}

/// Lazy iterator over the table names stored in a [`FileBackend`] directory.
///
/// Temporary files and anything without the record extension are skipped.
#[derive(Debug)]
pub struct TableNames {
    dir: PathBuf,
    entries: ReadDir,
}

impl Iterator for TableNames {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(source) => {
                    return Some(Err(StorageError::ListDirectory {
                        path: self.dir.clone(),
                        source,
                    }
                    .into()));
                }
            };

            if let Some(name) = table_name_from_path(&entry.path()) {
                return Some(Ok(name));
            }
        }
    }
}

/// Recover the table name from a record file path.
fn table_name_from_path(path: &Path) -> Option<String> {
    if path.extension().is_none_or(|ext| ext != RECORD_EXTENSION) {
        return None;
    }

    let stem = path.file_stem()?.to_str()?;
    match urlencoding::decode(stem) {
        Ok(name) if !name.is_empty() => Some(name.into_owned()),
        Ok(_) => None,
        Err(e) => {
            warn!("Skipping undecodable metadata file {}: {e}", path.display());
            None
        }
    }
}

/// Write `contents` to `path` via a temporary sibling and a rename.
///
/// The temporary file is flushed to disk before the rename; on failure it is
/// removed and the previous file at `path` is left untouched.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> std::result::Result<(), StorageError> {
    let mut temp_name = OsString::from(path.as_os_str());
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let written = File::create(&temp_path).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });
    if let Err(source) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(StorageError::WriteFile {
            path: temp_path,
            source,
        });
    }

    if let Err(source) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(StorageError::WriteFile {
            path: path.to_path_buf(),
            source,
        });
    }

    sync_parent_dir(path);
    Ok(())
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    let Some(parent) = path.parent() else {
        return;
    };
    if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
        debug!("Could not sync directory {}: {e}", parent.display());
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldDescriptor;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn users() -> TableMetadata {
        TableMetadata::new("users")
            .with_field(FieldDescriptor::new("id", "unique id").with_data_type("INTEGER"))
            .with_field(FieldDescriptor::new("email", "contact address"))
    }

    fn sorted_names(backend: &FileBackend) -> Vec<String> {
        let mut names = backend
            .list_tables()
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        names.sort();
        names
    }

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path()).unwrap();

        backend.write(&users()).unwrap();

        assert!(temp_dir.path().join("users.json").exists());
        assert!(!temp_dir.path().join("users.json.tmp").exists());
        assert_eq!(backend.read("users").unwrap(), users());
    }

    #[test]
    fn test_write_replaces_previous_record() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path()).unwrap();

        backend.write(&users()).unwrap();
        let replacement = TableMetadata::new("users").with_business_context("accounts");
        backend.write(&replacement).unwrap();

        assert_eq!(backend.read("users").unwrap(), replacement);
        assert_eq!(sorted_names(&backend), vec!["users"]);
    }

    #[test]
    fn test_new_creates_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("nested").join("metadata");

        let backend = FileBackend::new(&root).unwrap();

        assert!(root.is_dir());
        assert_eq!(backend.root(), root.as_path());
    }

    #[test]
    fn test_read_missing_table_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path()).unwrap();

        let err = backend.read("nonexistent").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_read_malformed_json_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path()).unwrap();
        fs::write(temp_dir.path().join("corrupted.json"), "{ invalid json content").unwrap();

        let err = backend.read("corrupted").unwrap_err();
        assert!(matches!(err, MetadataError::CorruptData { ref table, .. } if table == "corrupted"));
    }

    #[test]
    fn test_read_schema_mismatch_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path()).unwrap();
        fs::write(
            temp_dir.path().join("users.json"),
            r#"{"table_name": "users", "fields": "not a list"}"#,
        )
        .unwrap();

        assert!(matches!(
            backend.read("users").unwrap_err(),
            MetadataError::CorruptData { .. }
        ));
    }

    #[test]
    fn test_read_rejects_record_for_other_table() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path()).unwrap();
        backend.write(&users()).unwrap();
        fs::rename(
            temp_dir.path().join("users.json"),
            temp_dir.path().join("accounts.json"),
        )
        .unwrap();

        let err = backend.read("accounts").unwrap_err();
        assert!(err.to_string().contains("file holds metadata for table 'users'"));
    }

    #[test]
    fn test_read_rejects_duplicate_fields_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path()).unwrap();
        fs::write(
            temp_dir.path().join("users.json"),
            r#"{"table_name": "users", "fields": [
                {"name": "id", "description": "a"},
                {"name": "id", "description": "b"}
            ]}"#,
        )
        .unwrap();

        assert!(matches!(
            backend.read("users").unwrap_err(),
            MetadataError::CorruptData { .. }
        ));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path()).unwrap();
        backend.write(&users()).unwrap();

        backend.delete("users").unwrap();
        backend.delete("users").unwrap();

        assert!(!temp_dir.path().join("users.json").exists());
        assert!(backend.read("users").unwrap_err().is_not_found());
    }

    #[test]
    fn test_list_tables_skips_temporary_and_foreign_files() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path()).unwrap();
        for name in ["users", "products", "orders"] {
            backend.write(&TableMetadata::new(name)).unwrap();
        }
        fs::write(temp_dir.path().join("orders.json.tmp"), "{").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "not metadata").unwrap();

        assert_eq!(sorted_names(&backend), vec!["orders", "products", "users"]);
        // Enumeration can be restarted.
        assert_eq!(backend.list_tables().unwrap().count(), 3);
    }

    #[test]
    fn test_path_unsafe_table_names_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path()).unwrap();
        let name = "sales/2024 Q1:archive";

        backend.write(&TableMetadata::new(name)).unwrap();

        let path = backend.table_path(name);
        assert_eq!(path.parent(), Some(temp_dir.path()));
        assert_eq!(backend.read(name).unwrap().table_name, name);
        assert_eq!(sorted_names(&backend), vec![name.to_string()]);
    }

    #[test]
    fn test_table_names_are_case_sensitive_in_file_names() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path()).unwrap();

        assert_ne!(backend.table_path("Users"), backend.table_path("users"));
    }

    #[test]
    fn test_write_failure_is_persistence_error() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("metadata");
        let backend = FileBackend::new(&root).unwrap();
        fs::remove_dir_all(&root).unwrap();
        fs::write(&root, "a file where the directory used to be").unwrap();

        let err = backend.write(&users()).unwrap_err();
        assert!(matches!(err, MetadataError::Persistence { ref table, .. } if table == "users"));
    }

    #[test]
    fn test_list_tables_on_missing_root_fails() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("metadata");
        let backend = FileBackend::new(&root).unwrap();
        fs::remove_dir_all(&root).unwrap();

        assert!(matches!(
            backend.list_tables(),
            Err(MetadataError::Storage(StorageError::ListDirectory { .. }))
        ));
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("export.json");

        write_atomic(&path, b"{}").unwrap();
        write_atomic(&path, b"{\"tables\": {}}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"tables\": {}}");
        assert!(!temp_dir.path().join("export.json.tmp").exists());
    }
}

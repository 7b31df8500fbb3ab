//! # Table Metadata Store
//!
//! Persistent, cached storage for human-authored descriptions of database
//! tables: what each field holds and what the table means to the business.
//! Prompt templates read it to explain query results; a management CLI
//! edits it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Table Metadata Store                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  prompts / CLI ──► MetadataStore ──► MetadataCache (TTL)        │
//! │                          │                                      │
//! │                          ▼                                      │
//! │                   MetadataBackend ──► <table>.json per table    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tablemeta_store::{MetadataStore, StoreConfig, TableMetadata, FieldDescriptor};
//!
//! let store = MetadataStore::open(&StoreConfig::default())?;
//! store.store_metadata(
//!     TableMetadata::new("users").with_field(FieldDescriptor::new("id", "unique id")),
//! )?;
//! let users = store.get_metadata("users")?;
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod record;
pub mod render;
pub mod store;
pub mod transfer;

pub use backend::{FileBackend, MetadataBackend, TableNames};
pub use cache::{CacheStats, DEFAULT_CACHE_TTL, MetadataCache};
pub use config::StoreConfig;
pub use context::{extract_table_name_from_context, parse_field_descriptions};
pub use error::{MetadataError, Result, StorageError};
pub use record::{FieldDescriptor, TableMetadata};
pub use render::render_table_context;
pub use store::MetadataStore;
pub use transfer::{ExportDocument, ImportFailure, ImportReport};

//! Table metadata records.
//!
//! A [`TableMetadata`] describes one database table: its fields, what the
//! table is for, and example queries. Records are plain data; the
//! [`MetadataStore`](crate::MetadataStore) is the only component that persists
//! them or stamps `last_updated`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{MetadataError, Result};

/// Human-authored description of one table field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field (column) name. Unique within its table.
    pub name: String,

    /// What the field holds.
    pub description: String,

    /// Database type, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,

    /// Whether the column accepts NULL.
    #[serde(default = "default_nullable")]
    pub is_nullable: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_primary_key: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_foreign_key: bool,

    /// Table a foreign key points at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_table: Option<String>,

    /// Maximum length of character columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,

    /// Column default, as written in the DDL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,

    /// Extra constraints such as `UNIQUE` or `CHECK (...)`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,

    /// Business meaning beyond the plain description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_context: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl FieldDescriptor {
    /// Create a new nullable field descriptor with no constraints.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            data_type: None,
            is_nullable: true,
            is_primary_key: false,
            is_foreign_key: false,
            foreign_table: None,
            max_length: None,
            default_value: None,
            constraints: Vec::new(),
            business_context: None,
        }
    }

    /// Set the data type.
    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    /// Mark the column as part of the primary key. Primary keys are not nullable.
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_nullable = false;
        self
    }

    /// Mark the column as a foreign key into `table`.
    pub fn foreign_key(mut self, table: impl Into<String>) -> Self {
        self.is_foreign_key = true;
        self.foreign_table = Some(table.into());
        self
    }

    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Add a constraint.
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    /// Set the business context.
    pub fn with_business_context(mut self, context: impl Into<String>) -> Self {
        self.business_context = Some(context.into());
        self
    }
}

/// Stored description of a database table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Table name. Primary key, case-sensitive.
    pub table_name: String,

    /// Schema the table lives in. Descriptive only; records are keyed by
    /// `table_name` alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,

    /// Catalog table type, e.g. `T` for tables or `V` for views.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_type: Option<String>,

    /// Short description of the table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Field descriptors in display order.
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,

    /// What the table means to the business.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_context: Option<String>,

    /// Related tables mapped to how they join, e.g.
    /// `departments -> "department_id -> departments.id"`.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub relationships: IndexMap<String, String>,

    /// Index names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<String>,

    /// Approximate row count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,

    /// Example queries against the table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample_queries: Vec<String>,

    /// Known data quality caveats.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_quality_notes: Vec<String>,

    /// When the table was created in the source database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<DateTime<Utc>>,

    /// When the store last persisted this record.
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl TableMetadata {
    /// Create an empty record for a table.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            schema_name: None,
            table_type: None,
            description: None,
            fields: Vec::new(),
            business_context: None,
            relationships: IndexMap::new(),
            indexes: Vec::new(),
            row_count: None,
            sample_queries: Vec::new(),
            data_quality_notes: Vec::new(),
            created_date: None,
            last_updated: None,
        }
    }

    /// Append a field.
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Set the table description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the business context.
    pub fn with_business_context(mut self, context: impl Into<String>) -> Self {
        self.business_context = Some(context.into());
        self
    }

    /// Set the schema name.
    pub fn with_schema(mut self, schema_name: impl Into<String>) -> Self {
        self.schema_name = Some(schema_name.into());
        self
    }

    pub fn with_table_type(mut self, table_type: impl Into<String>) -> Self {
        self.table_type = Some(table_type.into());
        self
    }

    /// Record how this table relates to another one.
    pub fn with_relationship(
        mut self,
        table: impl Into<String>,
        join: impl Into<String>,
    ) -> Self {
        self.relationships.insert(table.into(), join.into());
        self
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.indexes.push(index.into());
        self
    }

    pub fn with_row_count(mut self, row_count: u64) -> Self {
        self.row_count = Some(row_count);
        self
    }

    pub fn with_data_quality_note(mut self, note: impl Into<String>) -> Self {
        self.data_quality_notes.push(note.into());
        self
    }

    pub fn with_created_date(mut self, created: DateTime<Utc>) -> Self {
        self.created_date = Some(created);
        self
    }

    /// Whether the record belongs to `schema_name`.
    pub fn in_schema(&self, schema_name: &str) -> bool {
        self.schema_name.as_deref() == Some(schema_name)
    }

    /// Add a sample query.
    pub fn with_sample_query(mut self, query: impl Into<String>) -> Self {
        self.sample_queries.push(query.into());
        self
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Replace the field with the same name, or append it.
    pub(crate) fn upsert_field(&mut self, field: FieldDescriptor) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(slot) => *slot = field,
            None => self.fields.push(field),
        }
    }

    /// Check the record invariants: a non-empty table name and non-empty,
    /// unique field names.
    pub fn validate(&self) -> Result<()> {
        validate_table_name(&self.table_name)?;

        let mut seen = HashSet::with_capacity(self.fields.len());
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(MetadataError::validation(
                    &self.table_name,
                    "field name must not be empty",
                ));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(MetadataError::validation(
                    &self.table_name,
                    format!("duplicate field name '{}'", field.name),
                ));
            }
        }

        Ok(())
    }
}

/// Reject empty or whitespace-only table names.
pub(crate) fn validate_table_name(table_name: &str) -> Result<()> {
    if table_name.trim().is_empty() {
        return Err(MetadataError::validation(
            table_name,
            "table name must not be empty",
        ));
    }
    Ok(())
}

//! Plain-text rendering of stored metadata for prompt templates.

use crate::record::{FieldDescriptor, TableMetadata};

/// Render a record as the context block inserted into data-explainer prompts.
pub fn render_table_context(record: &TableMetadata) -> String {
    let mut lines = vec![format!("Table: {}", record.table_name)];

    if let Some(schema) = &record.schema_name {
        lines.push(format!("Schema: {schema}"));
    }
    if let Some(table_type) = &record.table_type {
        lines.push(format!("Type: {table_type}"));
    }
    if let Some(description) = &record.description {
        lines.push(format!("Description: {description}"));
    }
    if let Some(context) = &record.business_context {
        lines.push(format!("Business context: {context}"));
    }
    if let Some(row_count) = record.row_count {
        lines.push(format!("Row count: {row_count}"));
    }
    if let Some(created) = &record.created_date {
        lines.push(format!("Created: {}", created.format("%Y-%m-%d")));
    }

    if !record.fields.is_empty() {
        lines.push("Fields:".to_string());
        for field in &record.fields {
            lines.push(render_field(field));
            if let Some(context) = &field.business_context {
                lines.push(format!("  Business context: {context}"));
            }
        }
    }

    if !record.relationships.is_empty() {
        lines.push("Relationships:".to_string());
        lines.extend(
            record
                .relationships
                .iter()
                .map(|(table, join)| format!("- {table}: {join}")),
        );
    }

    if !record.indexes.is_empty() {
        lines.push(format!("Indexes: {}", record.indexes.join(", ")));
    }

    if !record.sample_queries.is_empty() {
        lines.push("Sample queries:".to_string());
        lines.extend(record.sample_queries.iter().map(|q| format!("- {q}")));
    }

    if !record.data_quality_notes.is_empty() {
        lines.push("Data quality notes:".to_string());
        lines.extend(record.data_quality_notes.iter().map(|n| format!("- {n}")));
    }

    lines.join("\n")
}

fn render_field(field: &FieldDescriptor) -> String {
    let attributes = field_attributes(field);
    if attributes.is_empty() {
        format!("- {}: {}", field.name, field.description)
    } else {
        format!(
            "- {} ({}): {}",
            field.name,
            attributes.join(", "),
            field.description
        )
    }
}

/// Type and constraint annotations shown in parentheses after a field name.
fn field_attributes(field: &FieldDescriptor) -> Vec<String> {
    let mut attributes = Vec::new();

    match (&field.data_type, field.max_length) {
        (Some(data_type), Some(len)) => attributes.push(format!("{data_type}({len})")),
        (Some(data_type), None) => attributes.push(data_type.clone()),
        (None, Some(len)) => attributes.push(format!("max length {len}")),
        (None, None) => {}
    }
    if field.is_primary_key {
        attributes.push("primary key".to_string());
    }
    if field.is_foreign_key {
        attributes.push(match &field.foreign_table {
            Some(table) => format!("references {table}"),
            None => "foreign key".to_string(),
        });
    }
    if !field.is_nullable {
        attributes.push("not null".to_string());
    }
    if let Some(default) = &field.default_value {
        attributes.push(format!("default {default}"));
    }
    attributes.extend(field.constraints.iter().cloned());

    attributes
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_minimal() {
        assert_eq!(render_table_context(&TableMetadata::new("audit")), "Table: audit");
    }

    #[test]
    fn test_render_full_record() {
        let record = TableMetadata::new("users")
            .with_description("User accounts")
            .with_business_context("Used for login")
            .with_field(
                FieldDescriptor::new("id", "Unique identifier")
                    .with_data_type("INTEGER")
                    .with_business_context("Primary key"),
            )
            .with_field(FieldDescriptor::new("email", "Contact address"))
            .with_sample_query("SELECT * FROM users WHERE id = ?");

        assert_eq!(
            render_table_context(&record),
            "Table: users\n\
             Description: User accounts\n\
             Business context: Used for login\n\
             Fields:\n\
             - id (INTEGER): Unique identifier\n  \
             Business context: Primary key\n\
             - email: Contact address\n\
             Sample queries:\n\
             - SELECT * FROM users WHERE id = ?"
        );
    }

    #[test]
    fn test_render_field_attributes() {
        let record = TableMetadata::new("users")
            .with_field(
                FieldDescriptor::new("id", "Unique identifier")
                    .with_data_type("INTEGER")
                    .primary_key(),
            )
            .with_field(
                FieldDescriptor::new("username", "Login name")
                    .with_data_type("VARCHAR")
                    .with_max_length(50)
                    .not_null()
                    .with_constraint("UNIQUE"),
            )
            .with_field(
                FieldDescriptor::new("department_id", "Owning department")
                    .foreign_key("departments")
                    .with_default_value("0"),
            );

        assert_eq!(
            render_table_context(&record),
            "Table: users\n\
             Fields:\n\
             - id (INTEGER, primary key, not null): Unique identifier\n\
             - username (VARCHAR(50), not null, UNIQUE): Login name\n\
             - department_id (references departments, default 0): Owning department"
        );
    }

    #[test]
    fn test_render_table_attributes() {
        let created = chrono::DateTime::parse_from_rfc3339("2023-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let record = TableMetadata::new("employees")
            .with_schema("hr")
            .with_table_type("T")
            .with_row_count(1500)
            .with_created_date(created)
            .with_relationship("departments", "department_id -> departments.id")
            .with_index("idx_email")
            .with_index("idx_department_id")
            .with_data_quality_note("Email missing for 5% of rows");

        assert_eq!(
            render_table_context(&record),
            "Table: employees\n\
             Schema: hr\n\
             Type: T\n\
             Row count: 1500\n\
             Created: 2023-06-01\n\
             Relationships:\n\
             - departments: department_id -> departments.id\n\
             Indexes: idx_email, idx_department_id\n\
             Data quality notes:\n\
             - Email missing for 5% of rows"
        );
    }
}

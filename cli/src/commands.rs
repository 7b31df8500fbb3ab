//! Subcommand handlers.

use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use tablemeta_store::{MetadataStore, parse_field_descriptions, render_table_context};
use tracing::debug;

use crate::cli::{Command, StoreArgs};

const SAMPLE_CONTENT: &str = "TABLE: sample_table
id: Unique identifier for the record
name: Human-readable name or title
description: Detailed description of the item
created_at: Timestamp when record was created
updated_at: Timestamp when record was last modified
status: Current status (active, inactive, pending)
user_id: Foreign key reference to users table
category: Classification or grouping of the item
";

/// Run a store-backed subcommand, reading user input from `input` and
/// writing results to `out`.
pub fn execute<R: BufRead, W: Write>(
    command: &Command,
    store: &MetadataStore,
    mut input: R,
    out: &mut W,
) -> Result<()> {
    match command {
        Command::Store(args) => store_command(args, store, &mut input, out),
        Command::Show { table, schema } => {
            let record = match schema {
                Some(schema) => store.get_metadata_in_schema(table, schema),
                None => store.get_metadata(table),
            };
            match record {
                Ok(record) => writeln!(out, "{}", render_table_context(&record))?,
                Err(e) if e.is_not_found() => bail!("no metadata found for table '{table}'"),
                Err(e) => return Err(e.into()),
            }
            Ok(())
        }
        Command::List { schema } => {
            let tables = match schema {
                Some(schema) => store.list_stored_tables_in_schema(schema)?,
                None => store.list_stored_tables()?,
            };
            if tables.is_empty() {
                writeln!(out, "No tables with stored metadata found")?;
            } else {
                writeln!(out, "Tables with stored metadata ({}):", tables.len())?;
                for (i, table) in tables.iter().enumerate() {
                    writeln!(out, "  {}. {table}", i + 1)?;
                }
            }
            Ok(())
        }
        Command::Delete { table, schema, yes } => {
            if !yes {
                write!(out, "Delete metadata for table '{table}'? (y/N): ")?;
                out.flush()?;
                let mut answer = String::new();
                input.read_line(&mut answer)?;
                if !answer.trim().eq_ignore_ascii_case("y") {
                    writeln!(out, "Operation cancelled")?;
                    return Ok(());
                }
            }
            match schema {
                Some(schema) => {
                    if !store.delete_metadata_in_schema(table, schema)? {
                        bail!("no metadata found for table '{table}' in schema '{schema}'");
                    }
                }
                None => store.delete_metadata(table)?,
            }
            writeln!(out, "Deleted metadata for table '{table}'")?;
            Ok(())
        }
        Command::Context { table, text } => {
            store.update_business_context(table, text)?;
            writeln!(out, "Updated business context for table '{table}'")?;
            Ok(())
        }
        Command::Export { output, tables } => {
            let selected = (!tables.is_empty()).then_some(tables.as_slice());
            let count = store
                .export_to_file(output, selected)
                .with_context(|| format!("exporting to {}", output.display()))?;
            writeln!(
                out,
                "Exported metadata for {count} tables to '{}'",
                output.display()
            )?;
            Ok(())
        }
        Command::Import { input: path } => {
            let report = store
                .import_from_file(path)
                .with_context(|| format!("importing from {}", path.display()))?;
            writeln!(
                out,
                "Imported metadata for {} tables from '{}'",
                report.imported.len(),
                path.display()
            )?;
            for failure in &report.failures {
                writeln!(
                    out,
                    "Failed to import table '{}': {}",
                    failure.table, failure.error
                )?;
            }
            if !report.is_complete() {
                bail!("{} tables failed to import", report.failures.len());
            }
            Ok(())
        }
        Command::Sample { output } => write_sample(output, out),
    }
}

/// Write the sample descriptions file. Needs no store.
pub fn write_sample<W: Write>(output: &Path, out: &mut W) -> Result<()> {
    fs::write(output, SAMPLE_CONTENT)
        .with_context(|| format!("writing sample file {}", output.display()))?;
    writeln!(out, "Created sample file at '{}'", output.display())?;
    writeln!(
        out,
        "Edit it with your table and field descriptions, then run:\n  tablemeta store --file {}",
        output.display()
    )?;
    Ok(())
}

fn store_command<R: BufRead, W: Write>(
    args: &StoreArgs,
    store: &MetadataStore,
    input: &mut R,
    out: &mut W,
) -> Result<()> {
    let source = &args.source;
    let record = match (&source.file, &source.table) {
        (Some(path), _) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            store.store_from_context(&content)?
        }
        (None, Some(table)) => {
            let content = if args.interactive {
                prompt_descriptions(table, input, out)?
            } else {
                let mut content = String::new();
                input.read_to_string(&mut content)?;
                content
            };
            let descriptions = parse_field_descriptions(&content);
            if descriptions.is_empty() {
                bail!("no field descriptions provided");
            }
            debug!("Read {} descriptions from stdin", descriptions.len());
            store.bulk_update_from_descriptions(table, descriptions)?
        }
        (None, None) => bail!("either --file or --table is required"),
    };

    writeln!(
        out,
        "Stored metadata for table '{}' with {} fields",
        record.table_name,
        record.fields.len()
    )?;
    Ok(())
}

/// Read `field: description` lines one prompt at a time until an empty line
/// or end of input. Lines without a colon are rejected and re-prompted.
fn prompt_descriptions<R: BufRead, W: Write>(
    table: &str,
    input: &mut R,
    out: &mut W,
) -> Result<String> {
    writeln!(out, "Enter field descriptions for table '{table}'")?;
    writeln!(out, "Format: field_name: description")?;
    writeln!(out, "Press Enter on an empty line to finish")?;

    let mut content = String::new();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if line.contains(':') {
            content.push_str(line);
            content.push('\n');
        } else {
            writeln!(out, "Invalid format. Use: field_name: description")?;
        }
    }
    Ok(content)
}

//! Parsing of free-form field description text.
//!
//! Users describe a table in prompt context as:
//!
//! ```text
//! TABLE: orders
//! order_id: Unique identifier for each order
//! total: Order total (format: 0.00)
//! ```

use indexmap::IndexMap;

const TABLE_PREFIX: &str = "TABLE:";

/// Parse `field: description` lines into an ordered map.
///
/// Blank lines, `#` comments, `TABLE:` lines and lines without a colon are
/// skipped, as are lines with an empty name or description. Only the first
/// colon separates name from description. A repeated field keeps its first
/// position and takes the last description.
pub fn parse_field_descriptions(context: &str) -> IndexMap<String, String> {
    let mut descriptions = IndexMap::new();
    for line in context.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(TABLE_PREFIX) {
            continue;
        }
        let Some((name, description)) = line.split_once(':') else {
            continue;
        };
        let (name, description) = (name.trim(), description.trim());
        if name.is_empty() || description.is_empty() {
            continue;
        }
        descriptions.insert(name.to_string(), description.to_string());
    }
    descriptions
}

/// Table name from the first non-empty `TABLE:` line. The prefix is
/// case-sensitive.
pub fn extract_table_name_from_context(context: &str) -> Option<String> {
    context.lines().find_map(|line| {
        let name = line.trim().strip_prefix(TABLE_PREFIX)?.trim();
        (!name.is_empty()).then(|| name.to_string())
    })
}

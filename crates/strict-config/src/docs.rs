// crates/strict-config/src/docs.rs
// ============================================================================
// Module: Schema Docs Generator
// Description: Markdown reference generator for declared config keys.
// Purpose: Keep committed config docs in sync with the schema.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Renders a deterministic Markdown table of every declared key with its
//! default and description. The output can be written to disk or compared with
//! a committed copy to catch drift in CI.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write;
use std::fs;
use std::path::Path;

use crate::error::RegistryError;
use crate::schema::Schema;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Placeholder shown for keys without a default.
const NO_DEFAULT: &str = "n/a";

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Generates the Markdown reference for `schema`.
#[must_use]
pub fn schema_docs_markdown(schema: &Schema, title: &str) -> String {
    let mut out = String::new();
    out.push_str("<!-- Generated from the config schema; do not edit manually. -->\n\n");
    let _ = writeln!(&mut out, "# {title}\n");
    if schema.is_empty() {
        out.push_str("No configuration keys are declared.\n");
        return out;
    }
    out.push_str("| Key | Default | Description |\n");
    out.push_str("| --- | --- | --- |\n");
    for (key, entry) in schema.entries() {
        let default = entry
            .default
            .as_deref()
            .map_or_else(|| NO_DEFAULT.to_string(), |value| format!("`{}`", escape_table_cell(value)));
        let description = entry.description.as_deref().map(escape_table_cell).unwrap_or_default();
        let _ = writeln!(&mut out, "| `{key}` | {default} | {description} |");
    }
    out
}

/// Writes the generated reference to `path`.
///
/// # Errors
///
/// Returns [`RegistryError::Io`] when the file cannot be written.
pub fn write_schema_docs(schema: &Schema, title: &str, path: &Path) -> Result<(), RegistryError> {
    let content = schema_docs_markdown(schema, title);
    fs::write(path, content.as_bytes()).map_err(|err| RegistryError::Io(err.to_string()))
}

/// Verifies the reference at `path` matches the generated output.
///
/// # Errors
///
/// Returns [`RegistryError::Io`] when the file cannot be read and
/// [`RegistryError::DocsOutOfDate`] when its content differs.
pub fn verify_schema_docs(schema: &Schema, title: &str, path: &Path) -> Result<(), RegistryError> {
    let content = schema_docs_markdown(schema, title);
    let existing = fs::read_to_string(path).map_err(|err| RegistryError::Io(err.to_string()))?;
    if existing != content {
        return Err(RegistryError::DocsOutOfDate(path.display().to_string()));
    }
    Ok(())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Escapes characters that break Markdown table cells.
fn escape_table_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

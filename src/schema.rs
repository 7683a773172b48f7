//! Schema extraction and DDL parsing.

use crate::artifact::{ColumnDef, SchemaDefinition};
use crate::backend::DataBackend;
use crate::error::{Result, TextqlError};
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

/// Renders a connected table's structure as a training artifact.
pub struct SchemaExtractor {
    backend: Arc<dyn DataBackend>,
}

impl SchemaExtractor {
    pub fn new(backend: Arc<dyn DataBackend>) -> Self {
        Self { backend }
    }

    /// Build a schema definition from the backend's description of a table.
    /// Column order is kept exactly as reported.
    pub fn extract(&self, table: &str) -> Result<SchemaDefinition> {
        let columns = self.backend.describe(table)?;
        debug!("Extracted schema for '{}' ({} columns)", table, columns.len());
        Ok(SchemaDefinition {
            table: table.to_string(),
            columns,
        })
    }
}

lazy_static! {
    static ref CREATE_TABLE: Regex = Regex::new(
        r#"(?is)^\s*CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?["`]?([A-Za-z_][\w.]*)["`]?\s*\((.*)\)\s*;?\s*$"#
    )
    .unwrap();
}

const TABLE_CONSTRAINTS: &[&str] = &["PRIMARY", "FOREIGN", "UNIQUE", "CHECK", "CONSTRAINT"];

/// Parse a `CREATE TABLE` statement into a schema definition.
///
/// Handles the single-statement DDL this system renders and trains on;
/// table-level constraint clauses are skipped, anything else unparseable
/// is a training-input error.
pub fn parse_ddl(ddl: &str) -> Result<SchemaDefinition> {
    let captures = CREATE_TABLE.captures(ddl).ok_or_else(|| {
        TextqlError::Training(format!("not a CREATE TABLE statement: {}", ddl.trim()))
    })?;

    let table = captures[1].to_string();
    let body = captures[2].trim();

    let mut columns = Vec::new();
    for part in split_top_level(body) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let mut tokens = part.splitn(2, char::is_whitespace);
        let name = tokens
            .next()
            .unwrap_or("")
            .trim_matches(|c| c == '"' || c == '`');
        if TABLE_CONSTRAINTS
            .iter()
            .any(|kw| name.eq_ignore_ascii_case(kw))
        {
            continue;
        }

        let sql_type = tokens.next().map(str::trim).unwrap_or("");
        if name.is_empty() || sql_type.is_empty() {
            return Err(TextqlError::Training(format!(
                "unparseable column definition: {}",
                part
            )));
        }

        columns.push(ColumnDef {
            name: name.to_string(),
            sql_type: sql_type.to_string(),
        });
    }

    if columns.is_empty() {
        return Err(TextqlError::Training(format!(
            "no columns in CREATE TABLE statement for {}",
            table
        )));
    }

    Ok(SchemaDefinition { table, columns })
}

/// Split a column list on commas outside parentheses, so types like
/// `DECIMAL(10, 2)` stay intact.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, ch) in body.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

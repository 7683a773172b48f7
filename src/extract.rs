//! SQL extraction from raw generation responses.
//!
//! The generation backend returns unstructured text that is not guaranteed
//! to contain a clean fenced SQL block. Extraction is layered:
//!
//! 1. Exactly one ```sql fenced block -> its trimmed contents.
//! 2. No fenced block, but the trimmed response begins with a SQL statement
//!    keyword -> the entire trimmed response.
//! 3. Zero or multiple candidates -> a typed failure, never a guess.
//!    Executing a misselected fragment is worse than failing: the caller
//!    retries once with a stricter instruction, then gives up.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    static ref SQL_FENCE: Regex = Regex::new(r"(?is)```sql\s(.*?)```").unwrap();
    static ref STATEMENT_START: Regex = Regex::new(
        r"(?i)^(SELECT|WITH|INSERT|UPDATE|DELETE|CREATE|ALTER|EXPLAIN|PRAGMA)\b"
    )
    .unwrap();
}

/// Why no statement could be extracted from a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionFailure {
    /// The response contains no recognizable SQL statement.
    NoStatement,
    /// The response contains several candidate statements and picking one
    /// would be a guess.
    AmbiguousStatements(usize),
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionFailure::NoStatement => write!(f, "no SQL statement in response"),
            ExtractionFailure::AmbiguousStatements(n) => {
                write!(f, "{} candidate SQL statements in response", n)
            }
        }
    }
}

/// Extract a single executable SQL statement from a generation response.
pub fn extract_sql(response: &str) -> std::result::Result<String, ExtractionFailure> {
    let fenced: Vec<&str> = SQL_FENCE
        .captures_iter(response)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    match fenced.len() {
        1 => {
            let sql = fenced[0].trim();
            if sql.is_empty() {
                Err(ExtractionFailure::NoStatement)
            } else {
                Ok(sql.to_string())
            }
        }
        0 => {
            let trimmed = response.trim();
            if !trimmed.is_empty() && STATEMENT_START.is_match(trimmed) {
                Ok(trimmed.to_string())
            } else {
                Err(ExtractionFailure::NoStatement)
            }
        }
        n => Err(ExtractionFailure::AmbiguousStatements(n)),
    }
}

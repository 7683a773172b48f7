//! Data backend abstraction and the polars implementation.
//!
//! The analytical engine is a collaborator behind a narrow interface:
//! describe a table, execute a SQL string. Nothing else about the engine
//! leaks into the pipeline, which keeps the orchestrator testable against
//! stub backends.

use crate::artifact::ColumnDef;
use crate::error::{Result, TextqlError};
use polars::prelude::*;
use polars::sql::SQLContext;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;
use tracing::{debug, info};

/// Narrow interface onto the analytical engine.
pub trait DataBackend: Send + Sync {
    /// Report a table's columns in declaration order.
    fn describe(&self, table: &str) -> Result<Vec<ColumnDef>>;

    /// Run a SQL statement and return the result table.
    fn execute(&self, sql: &str) -> Result<DataFrame>;
}

/// In-process backend executing SQL over registered polars dataframes.
pub struct PolarsBackend {
    // BTreeMap keeps table listing deterministic.
    frames: RwLock<BTreeMap<String, DataFrame>>,
}

impl PolarsBackend {
    pub fn new() -> Self {
        Self {
            frames: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register an in-memory dataframe under a table name.
    pub fn register(&self, name: &str, frame: DataFrame) {
        debug!("Registering table '{}' ({} rows)", name, frame.height());
        self.frames.write().unwrap().insert(name.to_string(), frame);
    }

    /// Load a CSV file and register it under a table name.
    pub fn register_csv(&self, name: &str, path: impl AsRef<Path>) -> Result<()> {
        let frame = LazyCsvReader::new(path.as_ref())
            .with_has_header(true)
            .finish()?
            .collect()?;
        info!(
            "Loaded '{}' from {} ({} rows)",
            name,
            path.as_ref().display(),
            frame.height()
        );
        self.register(name, frame);
        Ok(())
    }

    /// Names of all registered tables.
    pub fn tables(&self) -> Vec<String> {
        self.frames.read().unwrap().keys().cloned().collect()
    }
}

impl Default for PolarsBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DataBackend for PolarsBackend {
    fn describe(&self, table: &str) -> Result<Vec<ColumnDef>> {
        let frames = self.frames.read().unwrap();
        let frame = frames
            .get(table)
            .ok_or_else(|| TextqlError::TableNotFound(table.to_string()))?;

        Ok(frame
            .schema()
            .iter_fields()
            .map(|field| ColumnDef {
                name: field.name().to_string(),
                sql_type: sql_type_name(field.data_type()).to_string(),
            })
            .collect())
    }

    fn execute(&self, sql: &str) -> Result<DataFrame> {
        let frames = self.frames.read().unwrap();
        let mut ctx = SQLContext::new();
        for (name, frame) in frames.iter() {
            ctx.register(name, frame.clone().lazy());
        }

        ctx.execute(sql)
            .and_then(|lf| lf.collect())
            .map_err(|e| TextqlError::Execution(e.to_string()))
    }
}

/// Map a polars dtype to the SQL type name used in rendered DDL.
fn sql_type_name(dtype: &DataType) -> &'static str {
    match dtype {
        DataType::Boolean => "BOOLEAN",
        DataType::Int8 | DataType::Int16 | DataType::Int32 => "INTEGER",
        DataType::Int64 => "BIGINT",
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 => "INTEGER",
        DataType::UInt64 => "BIGINT",
        DataType::Float32 => "FLOAT",
        DataType::Float64 => "DOUBLE",
        DataType::Date => "DATE",
        DataType::Datetime(_, _) => "TIMESTAMP",
        DataType::Time => "TIME",
        _ => "VARCHAR",
    }
}

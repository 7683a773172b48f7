//! Training artifacts stored in the corpus.
//!
//! Two kinds of artifact feed SQL generation: table schemas (rendered as
//! canonical DDL) and example queries (SQL, optionally paired with the
//! natural-language question it answers). Artifacts are immutable once
//! stored; replacing one is a remove followed by a fresh add so retrieval
//! always ranks against the current embedding.

use crate::error::{Result, TextqlError};
use serde::{Deserialize, Serialize};

/// Identifier assigned by the corpus store at insertion time.
pub type ArtifactId = String;

/// Artifact category, used to filter retrieval queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    Schema,
    Example,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Schema => "schema",
            ArtifactKind::Example => "example",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "schema" => Some(ArtifactKind::Schema),
            "example" => Some(ArtifactKind::Example),
            _ => None,
        }
    }
}

/// A single column declaration as reported by the data backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: String,
}

/// Table schema with columns in backend-reported order.
///
/// Column order is preserved exactly: it is meaningful for DDL rendering
/// and for consumers diffing schemas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub table: String,
    pub columns: Vec<ColumnDef>,
}

impl SchemaDefinition {
    /// Render the canonical single-line DDL string, e.g.
    /// `CREATE TABLE t (a BIGINT, b VARCHAR);`
    pub fn to_ddl(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.sql_type))
            .collect();
        format!("CREATE TABLE {} ({});", self.table, columns.join(", "))
    }
}

/// An example query, optionally paired with the question it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleQuery {
    pub question: Option<String>,
    pub sql: String,
}

/// One stored unit of training data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrainingArtifact {
    Schema(SchemaDefinition),
    Example(ExampleQuery),
}

impl TrainingArtifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            TrainingArtifact::Schema(_) => ArtifactKind::Schema,
            TrainingArtifact::Example(_) => ArtifactKind::Example,
        }
    }

    /// Canonical stored text. Identical content means identical artifact,
    /// which is how duplicate training is suppressed.
    pub fn content(&self) -> Result<String> {
        match self {
            TrainingArtifact::Schema(schema) => Ok(schema.to_ddl()),
            TrainingArtifact::Example(example) => Ok(serde_json::to_string(example)?),
        }
    }

    /// Rebuild an artifact from its stored canonical text.
    pub fn from_content(kind: ArtifactKind, content: &str) -> Result<Self> {
        match kind {
            ArtifactKind::Schema => {
                let schema = crate::schema::parse_ddl(content).map_err(|e| {
                    TextqlError::Storage(format!("corrupt schema artifact: {}", e))
                })?;
                Ok(TrainingArtifact::Schema(schema))
            }
            ArtifactKind::Example => {
                let example: ExampleQuery = serde_json::from_str(content).map_err(|e| {
                    TextqlError::Storage(format!("corrupt example artifact: {}", e))
                })?;
                Ok(TrainingArtifact::Example(example))
            }
        }
    }

    /// Text handed to the embedding backend at insertion time.
    pub fn embedding_text(&self) -> String {
        match self {
            TrainingArtifact::Schema(schema) => schema.to_ddl(),
            TrainingArtifact::Example(example) => match &example.question {
                Some(question) => format!("{}\n{}", question, example.sql),
                None => example.sql.clone(),
            },
        }
    }
}

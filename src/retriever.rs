//! Retrieval of question-relevant corpus entries.

use crate::artifact::ArtifactKind;
use crate::error::Result;
use crate::store::{CorpusStore, Scored};
use std::sync::Arc;
use tracing::debug;

/// Context retrieved for one question. Schemas and examples are ranked
/// independently so a question with no similar example still pulls in the
/// most relevant schema, and vice versa.
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    pub schemas: Vec<Scored>,
    pub examples: Vec<Scored>,
}

pub struct Retriever {
    store: Arc<CorpusStore>,
}

impl Retriever {
    pub fn new(store: Arc<CorpusStore>) -> Self {
        Self { store }
    }

    /// Top-k schema and example artifacts for a question. Returns fewer
    /// than requested when the corpus holds fewer matching artifacts.
    pub async fn retrieve(
        &self,
        question: &str,
        k_schema: usize,
        k_examples: usize,
    ) -> Result<Retrieval> {
        let schemas = self
            .store
            .query(question, Some(ArtifactKind::Schema), k_schema)
            .await?;
        let examples = self
            .store
            .query(question, Some(ArtifactKind::Example), k_examples)
            .await?;

        debug!(
            "Retrieved {} schemas, {} examples for question",
            schemas.len(),
            examples.len()
        );
        Ok(Retrieval { schemas, examples })
    }
}

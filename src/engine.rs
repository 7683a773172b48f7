//! Orchestration of the question-to-result pipeline.
//!
//! `ask` wires retrieval -> prompt assembly -> generation -> extraction ->
//! execution, with a bounded re-generation policy: when no SQL statement
//! can be extracted from a response, the question is re-generated once
//! with a stricter output instruction. A second extraction failure is
//! terminal for that question. Generation faults on the initial call are
//! never retried here; retry policy for transport faults belongs to the
//! caller.
//!
//! Every collaborator is injected at construction. Pipeline-stage errors
//! never escape `ask`; they land in the answer's empty slots with a
//! diagnostic, so one bad question cannot take down a serving process.

use crate::backend::DataBackend;
use crate::config::Config;
use crate::error::{Result, TextqlError};
use crate::extract::extract_sql;
use crate::llm::Generator;
use crate::prompt;
use crate::retriever::Retriever;
use crate::schema::{parse_ddl, SchemaExtractor};
use crate::store::CorpusStore;
use crate::artifact::{ArtifactId, ExampleQuery, TrainingArtifact};
use polars::prelude::DataFrame;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Training request: at least one field must be set.
#[derive(Debug, Clone, Default)]
pub struct TrainingInput {
    /// A CREATE TABLE statement to store as a schema artifact.
    pub ddl: Option<String>,
    /// A bare SQL query to store as a question-less example.
    pub sql: Option<String>,
    /// A (question, SQL) pair to store as an answered example.
    pub pair: Option<(String, String)>,
}

/// Outcome of one question. The failure modes are distinguishable:
/// no sql (nothing extractable), sql without rows (execution failed,
/// diagnostic attached), sql with rows (success).
#[derive(Debug)]
pub struct Answer {
    pub sql: Option<String>,
    pub rows: Option<DataFrame>,
    pub diagnostic: Option<String>,
}

pub struct Engine {
    store: Arc<CorpusStore>,
    retriever: Retriever,
    extractor: SchemaExtractor,
    generator: Arc<dyn Generator>,
    backend: Arc<dyn DataBackend>,
    k_schema: usize,
    k_examples: usize,
    extraction_retries: usize,
    execute_timeout: Duration,
}

impl Engine {
    pub fn new(
        store: Arc<CorpusStore>,
        generator: Arc<dyn Generator>,
        backend: Arc<dyn DataBackend>,
        config: &Config,
    ) -> Self {
        Self {
            retriever: Retriever::new(Arc::clone(&store)),
            extractor: SchemaExtractor::new(Arc::clone(&backend)),
            store,
            generator,
            backend,
            k_schema: config.k_schema,
            k_examples: config.k_examples,
            extraction_retries: config.extraction_retries,
            execute_timeout: config.execute_timeout,
        }
    }

    /// Answer a natural-language question with generated SQL and its
    /// result table.
    pub async fn ask(&self, question: &str) -> Answer {
        info!("Question: {}", question);

        let sql = match self.generate_sql(question).await {
            Ok(sql) => sql,
            Err(err) => {
                warn!("No SQL produced: {}", err);
                return Answer {
                    sql: None,
                    rows: None,
                    diagnostic: Some(err.to_string()),
                };
            }
        };

        info!("Generated SQL: {}", sql);
        match self.execute(&sql).await {
            Ok(rows) => Answer {
                sql: Some(sql),
                rows: Some(rows),
                diagnostic: None,
            },
            Err(err) => {
                warn!("Execution failed: {}", err);
                Answer {
                    sql: Some(sql),
                    rows: None,
                    diagnostic: Some(err.to_string()),
                }
            }
        }
    }

    /// Generate a SQL statement for a question without executing it.
    ///
    /// Applies the bounded retry: one extra generation pass with the
    /// strict instruction per configured retry (default 1), only after a
    /// failed extraction.
    pub async fn generate_sql(&self, question: &str) -> Result<String> {
        let retrieval = self
            .retriever
            .retrieve(question, self.k_schema, self.k_examples)
            .await?;
        let request = prompt::assemble(question, &retrieval);

        let response = self
            .generator
            .complete(&prompt::render_messages(&request))
            .await?;

        let mut failure = match extract_sql(&response) {
            Ok(sql) => return Ok(sql),
            Err(failure) => failure,
        };

        for attempt in 1..=self.extraction_retries {
            info!(
                "Extraction failed ({}), re-generating with strict instruction (attempt {})",
                failure, attempt
            );
            let strict_request = request.clone().strict();
            let response = self
                .generator
                .complete(&prompt::render_messages(&strict_request))
                .await?;
            match extract_sql(&response) {
                Ok(sql) => return Ok(sql),
                Err(f) => failure = f,
            }
        }

        Err(TextqlError::NoStatement(failure.to_string()))
    }

    async fn execute(&self, sql: &str) -> Result<DataFrame> {
        let backend = Arc::clone(&self.backend);
        let statement = sql.to_string();
        let task = tokio::task::spawn_blocking(move || backend.execute(&statement));

        match tokio::time::timeout(self.execute_timeout, task).await {
            Err(_) => Err(TextqlError::Execution(format!(
                "query timed out after {:?}",
                self.execute_timeout
            ))),
            Ok(Err(join_err)) => Err(TextqlError::Execution(format!(
                "execution task failed: {}",
                join_err
            ))),
            Ok(Ok(result)) => result,
        }
    }

    /// Store training artifacts. At least one of the inputs must be set;
    /// each produces one artifact in the corpus.
    pub async fn train(&self, input: TrainingInput) -> Result<Vec<ArtifactId>> {
        if input.ddl.is_none() && input.sql.is_none() && input.pair.is_none() {
            return Err(TextqlError::Training(
                "at least one of ddl, sql or a question/sql pair is required".to_string(),
            ));
        }

        let mut ids = Vec::new();

        if let Some(ddl) = input.ddl {
            let schema = parse_ddl(&ddl)?;
            info!("Training schema for table '{}'", schema.table);
            ids.push(self.store.add(&TrainingArtifact::Schema(schema)).await?);
        }

        if let Some(sql) = input.sql {
            info!("Training example query");
            ids.push(
                self.store
                    .add(&TrainingArtifact::Example(ExampleQuery {
                        question: None,
                        sql,
                    }))
                    .await?,
            );
        }

        if let Some((question, sql)) = input.pair {
            info!("Training question/SQL pair");
            ids.push(
                self.store
                    .add(&TrainingArtifact::Example(ExampleQuery {
                        question: Some(question),
                        sql,
                    }))
                    .await?,
            );
        }

        Ok(ids)
    }

    /// Extract a connected table's schema and store it as a training
    /// artifact.
    pub async fn train_table(&self, table: &str) -> Result<ArtifactId> {
        let schema = self.extractor.extract(table)?;
        info!("Training schema for table '{}'", table);
        self.store.add(&TrainingArtifact::Schema(schema)).await
    }
}

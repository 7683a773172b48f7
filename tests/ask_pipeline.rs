//! End-to-end pipeline tests with a scripted generator and a polars
//! backend, covering the retry-on-failed-extraction rule and the
//! distinguishable failure modes of `ask`.

use async_trait::async_trait;
use polars::prelude::*;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use textql::artifact::TrainingArtifact;
use textql::backend::PolarsBackend;
use textql::config::Config;
use textql::engine::{Engine, TrainingInput};
use textql::error::{Result, TextqlError};
use textql::llm::{ChatMessage, EmbeddingBackend, Generator};
use textql::store::CorpusStore;

/// Deterministic letter-frequency embedding; no network.
struct CharEmbedder;

#[async_trait]
impl EmbeddingBackend for CharEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut counts = vec![0.0f32; 26];
        for ch in text.to_ascii_lowercase().chars() {
            if ch.is_ascii_lowercase() {
                counts[(ch as usize) - ('a' as usize)] += 1.0;
            }
        }
        Ok(counts)
    }
}

/// Generator that replays scripted responses and records the prompts it
/// was called with.
struct ScriptedGenerator {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedGenerator {
    fn new(responses: &[&str]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn last_system_message(&self) -> String {
        let prompts = self.prompts.lock().unwrap();
        prompts.last().unwrap()[0].content.clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(TextqlError::EmptyResponse)
    }
}

fn test_config(dir: &tempfile::TempDir) -> Config {
    let mut config = Config::from_env();
    config.store_dir = dir.path().to_path_buf();
    config.k_schema = 3;
    config.k_examples = 3;
    config.extraction_retries = 1;
    config
}

fn backend_with_loans() -> Arc<PolarsBackend> {
    let backend = Arc::new(PolarsBackend::new());
    backend.register(
        "loans",
        df![
            "loan_id" => ["1001", "1002", "1003"],
            "principal_amount" => [100000.0, 50000.0, 75000.0],
        ]
        .unwrap(),
    );
    backend
}

async fn engine_with(
    dir: &tempfile::TempDir,
    generator: Arc<ScriptedGenerator>,
    backend: Arc<PolarsBackend>,
) -> Engine {
    let config = test_config(dir);
    let store = Arc::new(
        CorpusStore::open(config.store_dir.join("corpus.db"), Arc::new(CharEmbedder)).unwrap(),
    );
    let engine = Engine::new(store, generator, backend, &config);
    engine
        .train(TrainingInput {
            ddl: Some("CREATE TABLE loans (loan_id VARCHAR, principal_amount DOUBLE);".to_string()),
            sql: Some("SELECT * FROM loans LIMIT 5".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    engine
}

#[tokio::test]
async fn clean_fenced_response_is_executed() {
    let dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(ScriptedGenerator::new(&[
        "```sql\nSELECT loan_id FROM loans ORDER BY loan_id\n```",
    ]));
    let engine = engine_with(&dir, generator.clone(), backend_with_loans()).await;

    let answer = engine.ask("list the loan ids").await;
    assert_eq!(
        answer.sql.as_deref(),
        Some("SELECT loan_id FROM loans ORDER BY loan_id")
    );
    let rows = answer.rows.expect("expected a result table");
    assert_eq!(rows.height(), 3);
    assert!(answer.diagnostic.is_none());
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn prose_response_triggers_one_strict_retry() {
    let dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(ScriptedGenerator::new(&[
        "Sure! Here's the query:\n\nSELECT 1;",
        "```sql\nSELECT 1\n```",
    ]));
    let engine = engine_with(&dir, generator.clone(), backend_with_loans()).await;

    let answer = engine.ask("anything at all").await;
    assert_eq!(answer.sql.as_deref(), Some("SELECT 1"));
    let rows = answer.rows.expect("expected a result table");
    assert_eq!(rows.height(), 1);

    // Exactly two generation calls, the second with the strict rule.
    assert_eq!(generator.calls(), 2);
    assert!(generator
        .last_system_message()
        .contains("Output only the SQL statement"));
}

#[tokio::test]
async fn two_failed_extractions_yield_no_sql() {
    let dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(ScriptedGenerator::new(&[
        "I think you want the loans table.",
        "Still talking, no query here.",
    ]));
    let engine = engine_with(&dir, generator.clone(), backend_with_loans()).await;

    let answer = engine.ask("list loans").await;
    assert!(answer.sql.is_none());
    assert!(answer.rows.is_none());
    assert!(answer.diagnostic.is_some());
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn ambiguous_response_is_not_guessed() {
    let dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(ScriptedGenerator::new(&[
        "```sql\nSELECT 1\n```\nor\n```sql\nSELECT 2\n```",
        "```sql\nSELECT 2\n```",
    ]));
    let engine = engine_with(&dir, generator.clone(), backend_with_loans()).await;

    let answer = engine.ask("pick one").await;
    // The ambiguous first response is discarded; the retry's single
    // statement wins.
    assert_eq!(answer.sql.as_deref(), Some("SELECT 2"));
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn execution_failure_is_isolated_from_later_questions() {
    let dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(ScriptedGenerator::new(&[
        "```sql\nSELECT * FROM nonexistent_table\n```",
        "```sql\nSELECT loan_id FROM loans\n```",
    ]));
    let engine = engine_with(&dir, generator.clone(), backend_with_loans()).await;

    let failed = engine.ask("query a missing table").await;
    assert_eq!(
        failed.sql.as_deref(),
        Some("SELECT * FROM nonexistent_table")
    );
    assert!(failed.rows.is_none());
    assert!(failed.diagnostic.is_some());

    // A bad statement must not poison the next question.
    let ok = engine.ask("list the loan ids").await;
    assert_eq!(ok.sql.as_deref(), Some("SELECT loan_id FROM loans"));
    assert_eq!(ok.rows.expect("expected a result table").height(), 3);
}

#[tokio::test]
async fn generation_fault_on_initial_call_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    // No scripted responses: the first call already fails.
    let generator = Arc::new(ScriptedGenerator::new(&[]));
    let engine = engine_with(&dir, generator.clone(), backend_with_loans()).await;

    let answer = engine.ask("anything").await;
    assert!(answer.sql.is_none());
    assert!(answer.rows.is_none());
    assert!(answer.diagnostic.is_some());
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn retrieved_schema_reaches_the_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(ScriptedGenerator::new(&["```sql\nSELECT 1\n```"]));
    let engine = engine_with(&dir, generator.clone(), backend_with_loans()).await;

    engine.ask("principal amounts of loans").await;
    let system = generator.last_system_message();
    assert!(system.contains("CREATE TABLE loans (loan_id VARCHAR, principal_amount DOUBLE);"));
    assert!(system.contains("SELECT * FROM loans LIMIT 5"));
}

#[tokio::test]
async fn training_requires_at_least_one_input() {
    let dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(ScriptedGenerator::new(&[]));
    let engine = engine_with(&dir, generator, backend_with_loans()).await;

    let err = engine.train(TrainingInput::default()).await.unwrap_err();
    assert!(matches!(err, TextqlError::Training(_)));
}

#[tokio::test]
async fn extracted_table_schema_preserves_column_order() {
    let dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(ScriptedGenerator::new(&[]));
    let backend = backend_with_loans();
    let config = test_config(&dir);
    let store = Arc::new(
        CorpusStore::open(config.store_dir.join("corpus.db"), Arc::new(CharEmbedder)).unwrap(),
    );
    let engine = Engine::new(store.clone(), generator, backend, &config);

    engine.train_table("loans").await.unwrap();
    let hits = store.query("loans", None, 1).await.unwrap();
    match &hits[0].artifact {
        TrainingArtifact::Schema(schema) => {
            assert_eq!(
                schema.to_ddl(),
                "CREATE TABLE loans (loan_id VARCHAR, principal_amount DOUBLE);"
            );
        }
        other => panic!("expected schema artifact, got {:?}", other),
    }
}

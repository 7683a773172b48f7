//! Corpus store for training artifacts.
//!
//! Architecture: SQLite + in-memory cosine index
//! - SQLite: durable artifact rows (embedding stored as a little-endian
//!   f32 BLOB), so training survives process restarts
//! - VectorIndex: rebuilt from the rows at open time, serves similarity
//!   queries without touching the database
//!
//! Embeddings are computed once, at insertion time, with the injected
//! embedding backend; queries embed the question with the same backend.
//! Artifacts are immutable: re-adding identical content returns the
//! existing id, and an update is `remove` followed by `add`.

use crate::artifact::{ArtifactId, ArtifactKind, TrainingArtifact};
use crate::error::{Result, TextqlError};
use crate::llm::EmbeddingBackend;
use crate::store::vector::{Embedding, IndexEntry, VectorIndex};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// An artifact with its retrieval score.
#[derive(Debug, Clone)]
pub struct Scored {
    pub id: ArtifactId,
    pub artifact: TrainingArtifact,
    pub score: f32,
}

pub struct CorpusStore {
    db: Mutex<Connection>,
    index: RwLock<VectorIndex>,
    embedder: Arc<dyn EmbeddingBackend>,
}

impl CorpusStore {
    /// Open (or create) the store at the given SQLite file path.
    pub fn open(path: impl AsRef<Path>, embedder: Arc<dyn EmbeddingBackend>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Connection::open(path)
            .map_err(|e| TextqlError::Storage(format!("Failed to open corpus store: {}", e)))?;

        let store = Self {
            db: Mutex::new(db),
            index: RwLock::new(VectorIndex::new()),
            embedder,
        };

        store.init_schema()?;
        store.load_index()?;
        info!(
            "Corpus store ready at {} ({} artifacts)",
            path.display(),
            store.len()
        );
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            r#"
            CREATE TABLE IF NOT EXISTS artifacts (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(kind, content)
            )
            "#,
            [],
        )
        .map_err(|e| TextqlError::Storage(format!("Failed to create artifacts table: {}", e)))?;
        Ok(())
    }

    fn load_index(&self) -> Result<()> {
        let db = self.db.lock().unwrap();
        let mut stmt = db
            .prepare("SELECT id, kind, embedding FROM artifacts ORDER BY rowid")
            .map_err(|e| TextqlError::Storage(format!("Failed to read artifacts: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let kind: String = row.get(1)?;
                let blob: Vec<u8> = row.get(2)?;
                Ok((id, kind, blob))
            })
            .map_err(|e| TextqlError::Storage(format!("Failed to read artifacts: {}", e)))?;

        let mut index = self.index.write().unwrap();
        for row in rows {
            let (id, kind, blob) =
                row.map_err(|e| TextqlError::Storage(format!("Failed to read artifact row: {}", e)))?;
            let kind = ArtifactKind::parse(&kind)
                .ok_or_else(|| TextqlError::Storage(format!("Unknown artifact kind: {}", kind)))?;
            index.push(IndexEntry {
                id,
                kind,
                embedding: decode_embedding(&blob),
            });
        }
        Ok(())
    }

    /// Insert an artifact, embedding it with the store's embedding backend.
    ///
    /// Re-adding identical content is a no-op that returns the existing id,
    /// so duplicate training never shifts retrieval ranking.
    pub async fn add(&self, artifact: &TrainingArtifact) -> Result<ArtifactId> {
        let kind = artifact.kind();
        let content = artifact.content()?;

        if let Some(existing) = self.find_by_content(kind, &content)? {
            debug!("Duplicate {} artifact, keeping {}", kind.as_str(), existing);
            return Ok(existing);
        }

        let embedding = self.embedder.embed(&artifact.embedding_text()).await?;
        let id = Uuid::new_v4().to_string();

        {
            let db = self.db.lock().unwrap();
            db.execute(
                "INSERT INTO artifacts (id, kind, content, embedding, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id,
                    kind.as_str(),
                    content,
                    encode_embedding(&embedding),
                    Utc::now().to_rfc3339()
                ],
            )
            .map_err(|e| TextqlError::Storage(format!("Failed to insert artifact: {}", e)))?;
        }

        self.index.write().unwrap().push(IndexEntry {
            id: id.clone(),
            kind,
            embedding,
        });

        debug!("Stored {} artifact {}", kind.as_str(), id);
        Ok(id)
    }

    /// Rank stored artifacts against a query text, most similar first.
    /// An empty store yields an empty result, not an error.
    pub async fn query(
        &self,
        text: &str,
        kind: Option<ArtifactKind>,
        k: usize,
    ) -> Result<Vec<Scored>> {
        if k == 0 || self.index.read().unwrap().is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding: Embedding = self.embedder.embed(text).await?;
        let hits = self.index.read().unwrap().search(&query_embedding, kind, k);

        let mut results = Vec::with_capacity(hits.len());
        for (id, score) in hits {
            let artifact = self.get(&id)?;
            results.push(Scored {
                id,
                artifact,
                score,
            });
        }
        Ok(results)
    }

    /// Remove an artifact from the store and the index.
    pub fn remove(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute("DELETE FROM artifacts WHERE id = ?1", params![id])
            .map_err(|e| TextqlError::Storage(format!("Failed to delete artifact: {}", e)))?;
        drop(db);

        self.index.write().unwrap().remove(id);
        Ok(())
    }

    /// Number of stored artifacts.
    pub fn len(&self) -> usize {
        self.index.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().unwrap().is_empty()
    }

    fn get(&self, id: &str) -> Result<TrainingArtifact> {
        let db = self.db.lock().unwrap();
        let (kind, content): (String, String) = db
            .query_row(
                "SELECT kind, content FROM artifacts WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| TextqlError::Storage(format!("Failed to load artifact {}: {}", id, e)))?;

        let kind = ArtifactKind::parse(&kind)
            .ok_or_else(|| TextqlError::Storage(format!("Unknown artifact kind: {}", kind)))?;
        TrainingArtifact::from_content(kind, &content)
    }

    fn find_by_content(&self, kind: ArtifactKind, content: &str) -> Result<Option<ArtifactId>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id FROM artifacts WHERE kind = ?1 AND content = ?2",
            params![kind.as_str(), content],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| TextqlError::Storage(format!("Failed to look up artifact: {}", e)))
    }
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(blob: &[u8]) -> Embedding {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

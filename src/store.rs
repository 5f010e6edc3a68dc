//! Persistent vector knowledge base.
//!
//! The knowledge base lives in one directory:
//!
//! ```text
//! <store.path>/
//! ├── CURRENT                      # name of the live generation
//! └── generations/
//!     └── 20261019T101500.123456789Z-<uuid>.sqlite
//! ```
//!
//! Each generation is a complete, immutable SQLite file holding chunks,
//! their vectors and the identity of the embedding backend that produced
//! them. [`KnowledgeBase::rebuild`] writes a new generation next to the live
//! one, then replaces `CURRENT` with a rename. Readers always see either
//! the old knowledge base or the new one, and a failed rebuild leaves the
//! old one in place.
//!
//! Rebuilds and clears are serialized by an in-process lock. Readers hold a
//! shared guard on the generation set while they use a generation; the
//! pointer swap and pruning take it exclusively. After a swap the previous
//! generation is kept and only generations older than it are deleted, so a
//! reader in another process that resolved `CURRENT` just before the swap
//! can still open its file. A reader whose generation vanished anyway
//! re-reads `CURRENT` once and retries.

use chrono::Utc;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};

use crate::db;
use crate::embedding::{
    blob_to_vec, cosine_similarity, embed_query, vec_to_blob, BackendIdentity, EmbeddingProvider,
};
use crate::error::{QaError, StoreError};
use crate::migrate;
use crate::models::{Chunk, SearchHit};

const CURRENT_FILE: &str = "CURRENT";
const GENERATIONS_DIR: &str = "generations";
const METRIC: &str = "cosine";

type Result<T> = std::result::Result<T, StoreError>;

/// Summary of the live knowledge base.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeBaseStatus {
    pub generation: String,
    pub chunk_count: usize,
    pub provider: String,
    pub model: String,
    pub dims: usize,
    pub metric: String,
    pub built_at: String,
}

/// Handle to the knowledge base directory.
pub struct KnowledgeBase {
    root: PathBuf,
    write_lock: Mutex<()>,
    generations: RwLock<()>,
}

impl KnowledgeBase {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
            generations: RwLock::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a built knowledge base is present.
    pub async fn exists(&self) -> Result<bool> {
        Ok(self.current_generation().await?.is_some())
    }

    /// Replace the whole knowledge base with `chunks` and their `vectors`.
    ///
    /// `vectors[i]` must be the embedding of `chunks[i]` and every vector
    /// must have `identity.dims` components. Returns the new generation name.
    pub async fn rebuild(
        &self,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
        identity: &BackendIdentity,
    ) -> Result<String> {
        if chunks.len() != vectors.len() {
            return Err(StoreError::InvalidInput(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        if let Some(pos) = vectors.iter().position(|v| v.len() != identity.dims) {
            return Err(StoreError::InvalidInput(format!(
                "vector {} has {} dims, expected {}",
                pos,
                vectors[pos].len(),
                identity.dims
            )));
        }

        let _guard = self.write_lock.lock().await;

        let generations = self.root.join(GENERATIONS_DIR);
        tokio::fs::create_dir_all(&generations).await?;

        let name = format!(
            "{}-{}.sqlite",
            Utc::now().format("%Y%m%dT%H%M%S%.9fZ"),
            uuid::Uuid::new_v4()
        );
        let path = generations.join(&name);

        if let Err(e) = write_generation(&path, chunks, vectors, identity).await {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e);
        }

        {
            let _exclusive = self.generations.write().await;
            let previous = self.current_generation_name().await?;
            self.swap_current(&name).await?;
            if let Some(previous) = previous {
                let oldest_kept = previous.as_str().min(name.as_str());
                self.prune_generations(Some(oldest_kept)).await;
            }
        }

        tracing::info!(
            generation = %name,
            chunks = chunks.len(),
            backend = %identity,
            "knowledge base rebuilt"
        );
        Ok(name)
    }

    /// Remove the knowledge base. Returns whether one existed.
    pub async fn clear(&self) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let _exclusive = self.generations.write().await;

        let existed = self.current_generation().await?.is_some();
        match tokio::fs::remove_file(self.root.join(CURRENT_FILE)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.prune_generations(None).await;

        if existed {
            tracing::info!(path = %self.root.display(), "knowledge base cleared");
        }
        Ok(existed)
    }

    /// Embed `query` and return the `k` most similar chunks, best first.
    ///
    /// An absent knowledge base yields no hits without calling the
    /// embedding backend. A knowledge base built by a different backend is
    /// an error.
    pub async fn search(
        &self,
        provider: &dyn EmbeddingProvider,
        query: &str,
        k: usize,
    ) -> std::result::Result<Vec<SearchHit>, QaError> {
        let _shared = self.generations.read().await;
        let Some((_, pool)) = self.open_current().await? else {
            tracing::debug!("search on absent knowledge base");
            return Ok(Vec::new());
        };
        if k == 0 {
            pool.close().await;
            return Ok(Vec::new());
        }

        let result = async {
            check_identity(&pool, &provider.identity()).await?;
            let query_vec = embed_query(provider, query).await?;
            let hits = rank(&pool, &query_vec, k).await?;
            Ok::<_, QaError>(hits)
        }
        .await;
        pool.close().await;

        result
    }

    /// Return the `k` chunks most similar to an already embedded query.
    pub async fn search_by_vector(
        &self,
        identity: &BackendIdentity,
        query_vec: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        let _shared = self.generations.read().await;
        let Some((_, pool)) = self.open_current().await? else {
            return Ok(Vec::new());
        };

        let result = async {
            check_identity(&pool, identity).await?;
            rank(&pool, query_vec, k).await
        }
        .await;
        pool.close().await;

        result
    }

    pub async fn status(&self) -> Result<Option<KnowledgeBaseStatus>> {
        let _shared = self.generations.read().await;
        let Some((path, pool)) = self.open_current().await? else {
            return Ok(None);
        };

        let result = read_status(&pool, &path).await;
        pool.close().await;

        result.map(Some)
    }

    /// Open a read-only pool on the live generation.
    ///
    /// If the file disappears between resolving `CURRENT` and opening it
    /// (another process swapped and pruned), `CURRENT` is read once more.
    async fn open_current(&self) -> Result<Option<(PathBuf, SqlitePool)>> {
        let Some(path) = self.current_generation().await? else {
            return Ok(None);
        };
        match db::connect(&path, false).await {
            Ok(pool) => Ok(Some((path, pool))),
            Err(first) => match self.current_generation().await? {
                Some(retry) if retry != path => {
                    tracing::debug!(generation = %retry.display(), "generation swapped while opening, retrying");
                    let pool = db::connect(&retry, false).await?;
                    Ok(Some((retry, pool)))
                }
                Some(_) => Err(first),
                None => Ok(None),
            },
        }
    }

    /// Name stored in `CURRENT`, without checking that the file exists.
    async fn current_generation_name(&self) -> Result<Option<String>> {
        let name = match tokio::fs::read_to_string(self.root.join(CURRENT_FILE)).await {
            Ok(name) => name.trim().to_string(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return Err(StoreError::Corrupt(format!(
                "invalid generation name in {}: {:?}",
                CURRENT_FILE, name
            )));
        }
        Ok(Some(name))
    }

    /// Path of the live generation, if `CURRENT` names an existing file.
    async fn current_generation(&self) -> Result<Option<PathBuf>> {
        let Some(name) = self.current_generation_name().await? else {
            return Ok(None);
        };

        let path = self.root.join(GENERATIONS_DIR).join(&name);
        if tokio::fs::try_exists(&path).await? {
            Ok(Some(path))
        } else {
            tracing::warn!(generation = %name, "CURRENT points at a missing generation");
            Ok(None)
        }
    }

    async fn swap_current(&self, name: &str) -> Result<()> {
        let tmp = self.root.join(format!("{}.tmp", CURRENT_FILE));
        tokio::fs::write(&tmp, name).await?;
        tokio::fs::rename(&tmp, self.root.join(CURRENT_FILE)).await?;
        Ok(())
    }

    /// Delete generation files whose name sorts before `oldest_kept`, or
    /// every generation when it is `None`. Names start with the build
    /// timestamp, so this never touches the live generation or anything
    /// newer. Failures are logged.
    async fn prune_generations(&self, oldest_kept: Option<&str>) {
        let dir = self.root.join(GENERATIONS_DIR);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(_) => return,
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if oldest_kept.is_some_and(|k| file_name.as_ref() >= k) {
                continue;
            }
            if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                tracing::warn!(file = %file_name, error = %e, "failed to remove old generation");
            }
        }
    }
}

async fn write_generation(
    path: &Path,
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
    identity: &BackendIdentity,
) -> Result<()> {
    let pool = db::connect(path, true).await?;
    let result = async {
        migrate::run_migrations(&pool).await?;

        let mut tx = pool.begin().await?;
        let meta = [
            ("provider", identity.provider.clone()),
            ("model", identity.model.clone()),
            ("dims", identity.dims.to_string()),
            ("metric", METRIC.to_string()),
            ("built_at", Utc::now().to_rfc3339()),
            ("chunk_count", chunks.len().to_string()),
        ];
        for (key, value) in meta {
            sqlx::query("INSERT INTO meta (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        for (position, (chunk, vector)) in chunks.iter().zip(vectors).enumerate() {
            let metadata_json = serde_json::Value::Object(chunk.metadata.clone()).to_string();
            sqlx::query(
                "INSERT INTO chunks (position, id, source, chunk_index, char_offset, text, hash, metadata_json, embedding)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(position as i64)
            .bind(&chunk.id)
            .bind(&chunk.source)
            .bind(chunk.chunk_index)
            .bind(chunk.char_offset)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(&metadata_json)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok::<(), StoreError>(())
    }
    .await;
    pool.close().await;

    result
}

async fn read_meta(pool: &SqlitePool, key: &str) -> Result<String> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM meta WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    row.map(|(v,)| v)
        .ok_or_else(|| StoreError::Corrupt(format!("missing meta key '{}'", key)))
}

async fn read_identity(pool: &SqlitePool) -> Result<BackendIdentity> {
    let dims = read_meta(pool, "dims").await?;
    Ok(BackendIdentity {
        provider: read_meta(pool, "provider").await?,
        model: read_meta(pool, "model").await?,
        dims: dims
            .parse()
            .map_err(|_| StoreError::Corrupt(format!("invalid dims '{}'", dims)))?,
    })
}

async fn check_identity(pool: &SqlitePool, current: &BackendIdentity) -> Result<()> {
    let built = read_identity(pool).await?;
    if &built != current {
        return Err(StoreError::BackendMismatch {
            built: built.to_string(),
            current: current.to_string(),
        });
    }
    Ok(())
}

async fn rank(pool: &SqlitePool, query_vec: &[f32], k: usize) -> Result<Vec<SearchHit>> {
    if k == 0 {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(
        "SELECT id, source, chunk_index, char_offset, text, hash, metadata_json, embedding
         FROM chunks ORDER BY position",
    )
    .fetch_all(pool)
    .await?;

    let mut hits = Vec::with_capacity(rows.len());
    for row in rows {
        let blob: Vec<u8> = row.get("embedding");
        let score = cosine_similarity(query_vec, &blob_to_vec(&blob));

        let metadata_json: String = row.get("metadata_json");
        let metadata = match serde_json::from_str(&metadata_json) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };

        hits.push(SearchHit {
            chunk: Chunk {
                id: row.get("id"),
                source: row.get("source"),
                chunk_index: row.get("chunk_index"),
                char_offset: row.get("char_offset"),
                text: row.get("text"),
                hash: row.get("hash"),
                metadata,
            },
            score,
        });
    }

    // Stable sort: equal scores keep ingestion order.
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(k);

    Ok(hits)
}

async fn read_status(pool: &SqlitePool, path: &Path) -> Result<KnowledgeBaseStatus> {
    let identity = read_identity(pool).await?;
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chunks")
        .fetch_one(pool)
        .await?;

    Ok(KnowledgeBaseStatus {
        generation: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        chunk_count: count as usize,
        provider: identity.provider,
        model: identity.model,
        dims: identity.dims,
        metric: read_meta(pool, "metric").await?,
        built_at: read_meta(pool, "built_at").await?,
    })
}

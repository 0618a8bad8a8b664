//! SQLite-based vector store implementation.
//!
//! Uses SQLite with cosine similarity computed in Rust. Video metadata is
//! stored per fragment as a JSON column so fragments stay self-contained.

use super::{rank_by_similarity, IndexedVideo, StoredFragment, VectorStore};
use crate::error::{LecternError, Result};
use crate::fragment::{Fragment, ScoredResult, VideoMetadata};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS fragments (
        id TEXT PRIMARY KEY,
        video_id TEXT NOT NULL,
        content TEXT NOT NULL,
        start_seconds REAL NOT NULL,
        end_seconds REAL NOT NULL,
        metadata_json TEXT NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_fragments_video_id ON fragments(video_id);
    CREATE INDEX IF NOT EXISTS idx_fragments_indexed_at ON fragments(indexed_at);
"#;

const SELECT_COLUMNS: &str = r#"
    SELECT id, video_id, content, start_seconds, end_seconds,
           metadata_json, embedding, indexed_at
    FROM fragments
"#;

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Create a new SQLite vector store.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LecternError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn parse_timestamp(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_stored(row: &Row<'_>) -> rusqlite::Result<StoredFragment> {
        let id: String = row.get(0)?;
        let metadata_json: String = row.get(5)?;
        let embedding_bytes: Vec<u8> = row.get(6)?;
        let indexed_at_str: String = row.get(7)?;

        let video: VideoMetadata = serde_json::from_str(&metadata_json).unwrap_or_else(|e| {
            warn!("Unreadable metadata for fragment {}: {}", id, e);
            VideoMetadata::default()
        });

        let fragment = Fragment::new(
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get(3)?,
            row.get(4)?,
            video,
        )
        .with_id(id.clone());

        Ok(StoredFragment {
            id,
            fragment,
            embedding: Self::bytes_to_embedding(&embedding_bytes),
            indexed_at: Self::parse_timestamp(&indexed_at_str),
        })
    }

    fn load_all(conn: &Connection) -> Result<Vec<StoredFragment>> {
        let mut stmt =
            conn.prepare(&format!("{} ORDER BY video_id, start_seconds", SELECT_COLUMNS))?;
        let rows = stmt.query_map([], Self::row_to_stored)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, fragments))]
    async fn upsert_batch(&self, fragments: &[StoredFragment]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for stored in fragments {
            let fragment = &stored.fragment;
            tx.execute(
                r#"
                INSERT OR REPLACE INTO fragments
                (id, video_id, content, start_seconds, end_seconds,
                 metadata_json, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    stored.id,
                    fragment.video_id,
                    fragment.text,
                    fragment.start,
                    fragment.end,
                    serde_json::to_string(&fragment.video)?,
                    Self::embedding_to_bytes(&stored.embedding),
                    stored.indexed_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        info!("Batch upserted {} fragments", fragments.len());
        Ok(fragments.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<ScoredResult>> {
        let conn = self.lock()?;
        let stored = Self::load_all(&conn)?;
        let results = rank_by_similarity(stored.iter(), query_embedding, limit);

        debug!("Found {} matching fragments", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn delete_by_video_id(&self, video_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM fragments WHERE video_id = ?1",
            params![video_id],
        )?;

        info!("Deleted {} fragments for video {}", deleted, video_id);
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn list_videos(&self) -> Result<Vec<IndexedVideo>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT f.video_id,
                   (SELECT json_extract(latest.metadata_json, '$.title')
                    FROM fragments latest
                    WHERE latest.video_id = f.video_id
                    ORDER BY latest.indexed_at DESC, latest.id
                    LIMIT 1) AS title,
                   COUNT(*) AS fragment_count,
                   MAX(MAX(f.end_seconds), MAX(json_extract(f.metadata_json, '$.duration')))
                       AS duration,
                   MAX(f.indexed_at) AS indexed_at
            FROM fragments f
            GROUP BY f.video_id
            ORDER BY indexed_at DESC
            "#,
        )?;

        let videos = stmt.query_map([], |row| {
            let indexed_at_str: String = row.get(4)?;
            Ok(IndexedVideo {
                video_id: row.get(0)?,
                title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                fragment_count: row.get(2)?,
                duration_seconds: row.get::<_, Option<f64>>(3)?.unwrap_or_default(),
                indexed_at: Self::parse_timestamp(&indexed_at_str),
            })
        })?;

        Ok(videos.filter_map(|v| v.ok()).collect())
    }

    #[instrument(skip(self))]
    async fn all_fragments(&self) -> Result<Vec<Fragment>> {
        let conn = self.lock()?;
        let fragments: Vec<Fragment> = Self::load_all(&conn)?
            .into_iter()
            .map(|stored| stored.fragment)
            .collect();

        debug!("Loaded {} fragments", fragments.len());
        Ok(fragments)
    }

    async fn document_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM fragments", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

//! Consultation history: the persistence collaborator behind `/api/history`.
//!
//! Entries are scoped to an opaque user identity issued by the auth layer.
//! Two stores implement [`HistoryStore`]: Postgres for deployments and an
//! in-memory one used when no `DATABASE_URL` is configured.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::RwLock;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{AnalysisResult, Language};

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A saved consultation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub user_id: String,
    pub symptoms: String,
    pub language: Language,
    pub response: AnalysisResult,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEntry {
    pub symptoms: String,
    pub language: Language,
    pub response: AnalysisResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub entries: Vec<HistoryEntry>,
    pub total: i64,
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn save(&self, user_id: &str, entry: NewEntry) -> Result<HistoryEntry, HistoryError>;

    /// Newest first.
    async fn list(&self, user_id: &str, limit: i64, offset: i64) -> Result<Page, HistoryError>;

    /// `false` when no entry with that id belongs to the user.
    async fn delete(&self, user_id: &str, id: Uuid) -> Result<bool, HistoryError>;
}

// ── In-memory ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryHistoryStore {
    entries: RwLock<Vec<HistoryEntry>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn save(&self, user_id: &str, entry: NewEntry) -> Result<HistoryEntry, HistoryError> {
        let saved = HistoryEntry {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            symptoms: entry.symptoms,
            language: entry.language,
            response: entry.response,
            created_at: Utc::now(),
        };
        self.entries.write().await.push(saved.clone());
        Ok(saved)
    }

    async fn list(&self, user_id: &str, limit: i64, offset: i64) -> Result<Page, HistoryError> {
        let entries = self.entries.read().await;
        let mine: Vec<&HistoryEntry> = entries.iter().filter(|e| e.user_id == user_id).collect();
        let total = mine.len() as i64;

        // Insertion order is chronological; newest first means walking backwards.
        let page = mine
            .into_iter()
            .rev()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();

        Ok(Page { entries: page, total })
    }

    async fn delete(&self, user_id: &str, id: Uuid) -> Result<bool, HistoryError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| !(e.id == id && e.user_id == user_id));
        Ok(entries.len() != before)
    }
}

// ── Postgres ────────────────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: Uuid,
    user_id: String,
    symptoms: String,
    language: String,
    response: sqlx::types::Json<AnalysisResult>,
    created_at: DateTime<Utc>,
}

impl From<HistoryRow> for HistoryEntry {
    fn from(row: HistoryRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            symptoms: row.symptoms,
            language: Language::from_code(&row.language),
            response: row.response.0,
            created_at: row.created_at,
        }
    }
}

pub struct PgHistoryStore {
    db: PgPool,
}

impl PgHistoryStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn save(&self, user_id: &str, entry: NewEntry) -> Result<HistoryEntry, HistoryError> {
        let row = sqlx::query_as::<_, HistoryRow>(
            "INSERT INTO chat_sessions (id, user_id, symptoms, language, response) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, user_id, symptoms, language, response, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&entry.symptoms)
        .bind(entry.language.code())
        .bind(sqlx::types::Json(&entry.response))
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    async fn list(&self, user_id: &str, limit: i64, offset: i64) -> Result<Page, HistoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_sessions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;

        let rows = sqlx::query_as::<_, HistoryRow>(
            "SELECT id, user_id, symptoms, language, response, created_at FROM chat_sessions \
             WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(Page {
            entries: rows.into_iter().map(HistoryEntry::from).collect(),
            total,
        })
    }

    async fn delete(&self, user_id: &str, id: Uuid) -> Result<bool, HistoryError> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

//! Livestream repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::database::models::LivestreamDbModel;
use crate::database::retry::retry_on_sqlite_busy;
use crate::database::time::{now_ms, opt_to_ms};
use crate::domain::{LivestreamRecord, LivestreamUpdate, NewLivestream};
use crate::{Error, Result};

/// Record store for livestreams.
///
/// Implementations must enforce uniqueness of `external_video_id`: a second
/// `create` for the same id fails with [`Error::Conflict`].
#[async_trait]
pub trait LivestreamRepository: Send + Sync {
    /// Look up a record by the provider's video id.
    async fn find_by_external_id(
        &self,
        external_video_id: &str,
    ) -> Result<Option<LivestreamRecord>>;

    /// Insert a new active record.
    async fn create(&self, new: &NewLivestream) -> Result<LivestreamRecord>;

    /// Apply a partial update.
    ///
    /// Returns `None` when no record has this id, or when
    /// `patch.expect_active` is set and the record's current state differs.
    async fn update(&self, id: &str, patch: &LivestreamUpdate) -> Result<Option<LivestreamRecord>>;

    /// All records currently marked active, most recently started first.
    async fn list_active(&self) -> Result<Vec<LivestreamRecord>>;

    /// Mark an inactive record active. `None` if missing or already active.
    async fn activate(&self, id: &str, at: DateTime<Utc>) -> Result<Option<LivestreamRecord>> {
        self.update(id, &LivestreamUpdate::activate(at)).await
    }

    /// Mark an active record inactive. `None` if missing or already inactive.
    async fn deactivate(&self, id: &str, at: DateTime<Utc>) -> Result<Option<LivestreamRecord>> {
        self.update(id, &LivestreamUpdate::deactivate(at)).await
    }
}

/// SQLx implementation of [`LivestreamRepository`].
pub struct SqlxLivestreamRepository {
    pool: SqlitePool,
}

impl SqlxLivestreamRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<LivestreamRecord>> {
        let row = sqlx::query_as::<_, LivestreamDbModel>("SELECT * FROM livestreams WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }
}

#[async_trait]
impl LivestreamRepository for SqlxLivestreamRepository {
    async fn find_by_external_id(
        &self,
        external_video_id: &str,
    ) -> Result<Option<LivestreamRecord>> {
        let row = sqlx::query_as::<_, LivestreamDbModel>(
            "SELECT * FROM livestreams WHERE external_video_id = ?",
        )
        .bind(external_video_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn create(&self, new: &NewLivestream) -> Result<LivestreamRecord> {
        let row = LivestreamDbModel::from_new(new);

        let result = retry_on_sqlite_busy("create_livestream", || async {
            sqlx::query(
                r#"
                INSERT INTO livestreams (
                    id, external_video_id, title, is_active, is_private,
                    group_id, class_id, started_at, ended_at, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&row.id)
            .bind(&row.external_video_id)
            .bind(&row.title)
            .bind(row.is_active)
            .bind(row.is_private)
            .bind(&row.group_id)
            .bind(&row.class_id)
            .bind(row.started_at)
            .bind(row.ended_at)
            .bind(row.created_at)
            .bind(row.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await;

        match result {
            Ok(()) => Ok(row.into()),
            Err(Error::DatabaseSqlx(sqlx::Error::Database(db_err)))
                if db_err.is_unique_violation() =>
            {
                Err(Error::conflict("Livestream", &new.external_video_id))
            }
            Err(e) => Err(e),
        }
    }

    async fn update(
        &self,
        id: &str,
        update: &LivestreamUpdate,
    ) -> Result<Option<LivestreamRecord>> {
        if update.is_empty() && update.expect_active.is_none() {
            return self.find_by_id(id).await;
        }

        let set_ended = update.ended_at.is_some();
        let ended_at = update.ended_at.and_then(opt_to_ms);
        let started_at = opt_to_ms(update.started_at);

        let affected = retry_on_sqlite_busy("update_livestream", || async {
            let result = sqlx::query(
                r#"
                UPDATE livestreams SET
                    title = COALESCE(?, title),
                    is_active = COALESCE(?, is_active),
                    started_at = COALESCE(?, started_at),
                    ended_at = CASE WHEN ? THEN ? ELSE ended_at END,
                    updated_at = ?
                WHERE id = ? AND (? IS NULL OR is_active = ?)
                "#,
            )
            .bind(&update.title)
            .bind(update.is_active)
            .bind(started_at)
            .bind(set_ended)
            .bind(ended_at)
            .bind(now_ms())
            .bind(id)
            .bind(update.expect_active)
            .bind(update.expect_active)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await?;

        if affected == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    async fn list_active(&self) -> Result<Vec<LivestreamRecord>> {
        let rows = sqlx::query_as::<_, LivestreamDbModel>(
            "SELECT * FROM livestreams WHERE is_active = 1 ORDER BY started_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

//! In-memory livestream store.
//!
//! Used by tests and by local runs without a database. Counts applied writes
//! so callers can assert that a reconciliation did or did not touch the store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::LivestreamRepository;
use crate::domain::{LivestreamRecord, LivestreamUpdate, NewLivestream};
use crate::{Error, Result};

#[derive(Default)]
pub struct InMemoryLivestreamRepository {
    records: RwLock<HashMap<String, LivestreamRecord>>,
    failing: RwLock<HashSet<String>>,
    creates: AtomicUsize,
    updates: AtomicUsize,
}

impl InMemoryLivestreamRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing the write counters.
    pub async fn insert(&self, record: LivestreamRecord) {
        self.records.write().await.insert(record.id.clone(), record);
    }

    /// Make every write touching `external_video_id` fail until cleared.
    pub async fn fail_writes_for(&self, external_video_id: impl Into<String>) {
        self.failing.write().await.insert(external_video_id.into());
    }

    pub async fn clear_failures(&self) {
        self.failing.write().await.clear();
    }

    pub async fn all(&self) -> Vec<LivestreamRecord> {
        let mut all: Vec<_> = self.records.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.external_video_id.cmp(&b.external_video_id));
        all
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Total applied writes.
    pub fn write_count(&self) -> usize {
        self.create_count() + self.update_count()
    }

    async fn check_failure(&self, external_video_id: &str) -> Result<()> {
        if self.failing.read().await.contains(external_video_id) {
            return Err(Error::store(format!("injected failure for {external_video_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl LivestreamRepository for InMemoryLivestreamRepository {
    async fn find_by_external_id(
        &self,
        external_video_id: &str,
    ) -> Result<Option<LivestreamRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| r.external_video_id == external_video_id)
            .cloned())
    }

    async fn create(&self, new: &NewLivestream) -> Result<LivestreamRecord> {
        self.check_failure(&new.external_video_id).await?;

        let mut records = self.records.write().await;
        if records
            .values()
            .any(|r| r.external_video_id == new.external_video_id)
        {
            return Err(Error::conflict("Livestream", &new.external_video_id));
        }

        let record = LivestreamRecord {
            id: uuid::Uuid::new_v4().to_string(),
            external_video_id: new.external_video_id.clone(),
            title: new.title.clone(),
            is_active: true,
            is_private: new.is_private,
            group_id: new.group_id.clone(),
            class_id: new.class_id.clone(),
            started_at: Some(new.started_at),
            ended_at: None,
        };
        records.insert(record.id.clone(), record.clone());
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }

    async fn update(
        &self,
        id: &str,
        update: &LivestreamUpdate,
    ) -> Result<Option<LivestreamRecord>> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(id) else {
            return Ok(None);
        };
        self.check_failure(&record.external_video_id).await?;
        if update
            .expect_active
            .is_some_and(|expected| expected != record.is_active)
        {
            return Ok(None);
        }

        if let Some(title) = &update.title {
            record.title = title.clone();
        }
        if let Some(active) = update.is_active {
            record.is_active = active;
        }
        if let Some(started) = update.started_at {
            record.started_at = Some(started);
        }
        if let Some(ended) = update.ended_at {
            record.ended_at = ended;
        }
        if !update.is_empty() {
            self.updates.fetch_add(1, Ordering::SeqCst);
        }
        Ok(Some(record.clone()))
    }

    async fn list_active(&self) -> Result<Vec<LivestreamRecord>> {
        let mut active: Vec<_> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.is_active)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(active)
    }
}

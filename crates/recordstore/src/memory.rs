//! In-memory store (tests, demos, and database-less runs)

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::RwLock;

use crate::{DateSpan, Generation, NewRecord, Record, RecordStore, Result, StoreError};

#[derive(Default)]
struct Inner {
    generation: Option<Generation>,
    next_id: i64,
    records: Vec<Record>,
    successful_inserts: usize,
    fail_after: Option<usize>,
}

impl Inner {
    fn check_current(&self, generation: Generation) -> Result<()> {
        match self.generation {
            Some(cur) if cur == generation => Ok(()),
            Some(cur) => Err(StoreError::StaleGeneration {
                requested: generation,
                current: cur,
            }),
            None => Err(StoreError::UnknownGeneration(generation)),
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `insert_batch` after the first `n` successful ones fail.
    pub async fn fail_inserts_after(&self, n: usize) {
        let mut inner = self.inner.write().await;
        inner.fail_after = Some(inner.successful_inserts + n);
    }

    /// Total records held, regardless of date.
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of all stored records in insertion order.
    pub async fn records(&self) -> Vec<Record> {
        self.inner.read().await.records.clone()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn reset(&self) -> Result<Generation> {
        let mut inner = self.inner.write().await;
        inner.records.clear();
        let next = inner.generation.map(|g| g.0 + 1).unwrap_or(1);
        inner.generation = Some(Generation(next));
        Ok(Generation(next))
    }

    async fn current_generation(&self) -> Result<Option<Generation>> {
        Ok(self.inner.read().await.generation)
    }

    async fn insert_batch(&self, generation: Generation, records: &[NewRecord]) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.check_current(generation)?;

        if let Some(limit) = inner.fail_after {
            if inner.successful_inserts >= limit {
                return Err(StoreError::Backend("injected insert failure".to_string()));
            }
        }

        inner.records.reserve(records.len());
        for r in records {
            inner.next_id += 1;
            let id = inner.next_id;
            inner.records.push(Record {
                id,
                timestamp: r.timestamp,
                label: r.label,
                features: r.features.clone(),
            });
        }
        inner.successful_inserts += 1;
        Ok(())
    }

    async fn count_between(&self, generation: Generation, span: DateSpan) -> Result<u64> {
        let inner = self.inner.read().await;
        inner.check_current(generation)?;
        Ok(inner
            .records
            .iter()
            .filter(|r| span.contains(&r.timestamp))
            .count() as u64)
    }

    async fn timestamp_bounds(
        &self,
        generation: Generation,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime)>> {
        let inner = self.inner.read().await;
        inner.check_current(generation)?;
        let min = inner.records.iter().map(|r| r.timestamp).min();
        let max = inner.records.iter().map(|r| r.timestamp).max();
        Ok(min.zip(max))
    }

    async fn fetch_window(
        &self,
        generation: Generation,
        span: DateSpan,
        limit: usize,
    ) -> Result<Vec<Record>> {
        let inner = self.inner.read().await;
        inner.check_current(generation)?;
        let mut out: Vec<Record> = inner
            .records
            .iter()
            .filter(|r| span.contains(&r.timestamp))
            .cloned()
            .collect();
        out.sort_by_key(|r| (r.timestamp, r.id));
        out.truncate(limit);
        Ok(out)
    }
}

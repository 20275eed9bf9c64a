//! Storage trait

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::{DateSpan, Generation, NewRecord, Record, Result};

/// Write/query contract of the record table.
///
/// Every query is pinned to a generation so that readers never mix rows from
/// two uploads, and writers holding a superseded generation are refused.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Delete every record and open a new, current generation.
    async fn reset(&self) -> Result<Generation>;

    /// The live generation, if any dataset was ever uploaded.
    async fn current_generation(&self) -> Result<Option<Generation>>;

    /// Bulk insert. Ids are assigned by the store in slice order.
    async fn insert_batch(&self, generation: Generation, records: &[NewRecord]) -> Result<()>;

    /// Number of records whose calendar date falls inside `span` (inclusive).
    async fn count_between(&self, generation: Generation, span: DateSpan) -> Result<u64>;

    /// Earliest and latest timestamp, `None` when the generation is empty.
    async fn timestamp_bounds(
        &self,
        generation: Generation,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime)>>;

    /// Records inside `span` ordered by timestamp, at most `limit` of them.
    async fn fetch_window(
        &self,
        generation: Generation,
        span: DateSpan,
        limit: usize,
    ) -> Result<Vec<Record>>;
}

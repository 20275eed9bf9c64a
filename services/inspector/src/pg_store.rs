use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use recordstore::{DateSpan, Generation, NewRecord, Record, RecordStore, StoreError};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

/// Postgres caps bind parameters per statement at 65535; four per row.
const ROWS_PER_STATEMENT: usize = 10_000;

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Half-open timestamp bounds covering the calendar days of `span`.
fn ts_bounds(span: DateSpan) -> (NaiveDateTime, NaiveDateTime) {
    let from = span.start.and_time(chrono::NaiveTime::MIN);
    let until = span.end.and_time(chrono::NaiveTime::MIN) + Duration::days(1);
    (from, until)
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: i64,
    synthetic_timestamp: NaiveDateTime,
    response: i32,
    features: Json<BTreeMap<String, f64>>,
}

impl From<RecordRow> for Record {
    fn from(r: RecordRow) -> Self {
        Record {
            id: r.id,
            timestamp: r.synthetic_timestamp,
            label: r.response,
            features: r.features.0,
        }
    }
}

#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn latest(&self) -> recordstore::Result<Option<Generation>> {
        let id: Option<i64> = sqlx::query_scalar(r#"SELECT MAX(id) FROM dataset_generations"#)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        Ok(id.map(Generation))
    }

    async fn ensure_current(&self, generation: Generation) -> recordstore::Result<()> {
        match self.latest().await? {
            Some(cur) if cur == generation => Ok(()),
            Some(cur) => Err(StoreError::StaleGeneration {
                requested: generation,
                current: cur,
            }),
            None => Err(StoreError::UnknownGeneration(generation)),
        }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn reset(&self) -> recordstore::Result<Generation> {
        let mut tx: Transaction<Postgres> = self.pool.begin().await.map_err(backend)?;

        // Conflicts with the FOR SHARE taken by in-flight batch inserts.
        sqlx::query(r#"LOCK TABLE dataset_generations IN EXCLUSIVE MODE"#)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        sqlx::query(r#"DELETE FROM dataset_records"#)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        let id: i64 =
            sqlx::query_scalar(r#"INSERT INTO dataset_generations DEFAULT VALUES RETURNING id"#)
                .fetch_one(&mut *tx)
                .await
                .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        Ok(Generation(id))
    }

    async fn current_generation(&self) -> recordstore::Result<Option<Generation>> {
        self.latest().await
    }

    async fn insert_batch(
        &self,
        generation: Generation,
        records: &[NewRecord],
    ) -> recordstore::Result<()> {
        let mut tx: Transaction<Postgres> = self.pool.begin().await.map_err(backend)?;

        let current: Option<i64> = sqlx::query_scalar(
            r#"SELECT id FROM dataset_generations ORDER BY id DESC LIMIT 1 FOR SHARE"#,
        )
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?;

        match current.map(Generation) {
            Some(cur) if cur == generation => {}
            Some(cur) => {
                return Err(StoreError::StaleGeneration {
                    requested: generation,
                    current: cur,
                })
            }
            None => return Err(StoreError::UnknownGeneration(generation)),
        }

        for chunk in records.chunks(ROWS_PER_STATEMENT) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO dataset_records (generation, synthetic_timestamp, response, features) ",
            );
            qb.push_values(chunk, |mut row, r| {
                row.push_bind(generation.0)
                    .push_bind(r.timestamp)
                    .push_bind(r.label)
                    .push_bind(Json(&r.features));
            });
            qb.build().execute(&mut *tx).await.map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn count_between(
        &self,
        generation: Generation,
        span: DateSpan,
    ) -> recordstore::Result<u64> {
        self.ensure_current(generation).await?;
        let (from, until) = ts_bounds(span);

        let n: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)::bigint
            FROM dataset_records
            WHERE generation = $1
              AND synthetic_timestamp >= $2
              AND synthetic_timestamp < $3
            "#,
        )
        .bind(generation.0)
        .bind(from)
        .bind(until)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        Ok(n.max(0) as u64)
    }

    async fn timestamp_bounds(
        &self,
        generation: Generation,
    ) -> recordstore::Result<Option<(NaiveDateTime, NaiveDateTime)>> {
        self.ensure_current(generation).await?;

        let (min, max): (Option<NaiveDateTime>, Option<NaiveDateTime>) = sqlx::query_as(
            r#"
            SELECT MIN(synthetic_timestamp), MAX(synthetic_timestamp)
            FROM dataset_records
            WHERE generation = $1
            "#,
        )
        .bind(generation.0)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        Ok(min.zip(max))
    }

    async fn fetch_window(
        &self,
        generation: Generation,
        span: DateSpan,
        limit: usize,
    ) -> recordstore::Result<Vec<Record>> {
        self.ensure_current(generation).await?;
        let (from, until) = ts_bounds(span);

        let rows: Vec<RecordRow> = sqlx::query_as(
            r#"
            SELECT id, synthetic_timestamp, response, features
            FROM dataset_records
            WHERE generation = $1
              AND synthetic_timestamp >= $2
              AND synthetic_timestamp < $3
            ORDER BY synthetic_timestamp ASC, id ASC
            LIMIT $4
            "#,
        )
        .bind(generation.0)
        .bind(from)
        .bind(until)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows.into_iter().map(Record::from).collect())
    }
}

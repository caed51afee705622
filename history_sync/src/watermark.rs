//! Per-dataset ingest watermarks.
//!
//! Each dataset stores one contiguous span `[covered_from, watermark)` known
//! to be durably written. `history-sync --resume` restarts a pass at the
//! watermark when the requested start falls inside that span.

use async_trait::async_trait;
use chrono::Utc;
use diesel::{SqliteConnection, prelude::*, upsert::excluded};
use history_ingestor::io::{CoveredSpan, ProgressError, ProgressTracker};

use crate::{
    db::connection::SharedConnection,
    models::WatermarkRow,
    schema::ingest_watermark::{self, dsl as iw},
    tz,
};

#[derive(thiserror::Error, Debug)]
/// Errors reading or writing watermarks.
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("stored watermark {value:?} for {dataset} is not a timestamp")]
    CorruptWatermark { dataset: String, value: String },

    #[error("sqlite connection mutex poisoned")]
    Poisoned,

    #[error("watermark task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Stored span for `dataset`, if one was ever recorded.
pub fn load(conn: &mut SqliteConnection, dataset: &str) -> RepoResult<Option<CoveredSpan>> {
    let row: Option<WatermarkRow> = iw::ingest_watermark
        .find(dataset)
        .select(WatermarkRow::as_select())
        .first(conn)
        .optional()?;

    row.map(|row| {
        let corrupt = |value: &str| RepoError::CorruptWatermark {
            dataset: row.dataset.clone(),
            value: value.to_string(),
        };
        let from = tz::parse_ts_to_utc(&row.covered_from).map_err(|_| corrupt(&row.covered_from))?;
        let until = tz::parse_ts_to_utc(&row.watermark).map_err(|_| corrupt(&row.watermark))?;
        CoveredSpan::new(from, until).ok_or_else(|| corrupt(&row.watermark))
    })
    .transpose()
}

/// Replaces the span for `dataset` and clears its last error.
pub fn store(conn: &mut SqliteConnection, dataset: &str, span: CoveredSpan) -> RepoResult<()> {
    let now = tz::to_rfc3339_millis(Utc::now());
    diesel::insert_into(ingest_watermark::table)
        .values((
            iw::dataset.eq(dataset),
            iw::covered_from.eq(tz::to_rfc3339_millis(span.from)),
            iw::watermark.eq(tz::to_rfc3339_millis(span.until)),
            iw::updated_at.eq(&now),
        ))
        .on_conflict(iw::dataset)
        .do_update()
        .set((
            iw::covered_from.eq(excluded(iw::covered_from)),
            iw::watermark.eq(excluded(iw::watermark)),
            iw::last_error.eq(None::<String>),
            iw::updated_at.eq(excluded(iw::updated_at)),
        ))
        .execute(conn)?;
    Ok(())
}

/// Notes why the last pass over `dataset` was incomplete. The watermark itself is untouched.
pub fn store_error(conn: &mut SqliteConnection, dataset: &str, message: &str) -> RepoResult<()> {
    diesel::update(iw::ingest_watermark.find(dataset))
        .set((
            iw::last_error.eq(Some(message)),
            iw::updated_at.eq(tz::to_rfc3339_millis(Utc::now())),
        ))
        .execute(conn)?;
    Ok(())
}

/// [`ProgressTracker`] over the `ingest_watermark` table.
#[derive(Clone)]
pub struct WatermarkRepo {
    conn: SharedConnection,
}

impl WatermarkRepo {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, dataset: &str) -> RepoResult<Option<CoveredSpan>> {
        let dataset = dataset.to_string();
        self.with_conn(move |conn| load(conn, &dataset)).await
    }

    pub async fn set(&self, dataset: &str, span: CoveredSpan) -> RepoResult<()> {
        let dataset = dataset.to_string();
        self.with_conn(move |conn| store(conn, &dataset, span)).await
    }

    pub async fn record_error(&self, dataset: &str, message: &str) -> RepoResult<()> {
        let (dataset, message) = (dataset.to_string(), message.to_string());
        self.with_conn(move |conn| store_error(conn, &dataset, &message))
            .await
    }

    async fn with_conn<T, F>(&self, f: F) -> RepoResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> RepoResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| RepoError::Poisoned)?;
            f(&mut conn)
        })
        .await?
    }
}

fn progress_error(e: RepoError) -> ProgressError {
    ProgressError {
        message: e.to_string(),
    }
}

#[async_trait]
impl ProgressTracker for WatermarkRepo {
    async fn covered_span(&self, dataset: &str) -> Result<Option<CoveredSpan>, ProgressError> {
        self.get(dataset).await.map_err(progress_error)
    }

    async fn record_progress(&self, dataset: &str, span: CoveredSpan) -> Result<(), ProgressError> {
        self.set(dataset, span).await.map_err(progress_error)
    }
}

//! [`DataSink`] backed by the SQLite history tables.

use async_trait::async_trait;
use diesel::{SqliteConnection, prelude::*};
use history_ingestor::{
    io::{DataSink, SinkError, sink::WriteSnafu},
    models::MarketRecord,
};
use tracing::debug;

use crate::{
    db::connection::SharedConnection,
    models::{NewKlineRow, NewTradeRow},
    schema::{aggregated_trade_data, kline_data},
};

/// Inserts records, silently skipping ones already stored under the same
/// natural key (`symbol, interval, open_time` for klines,
/// `symbol, aggregated_trade_id` for trades). Re-running a pass is harmless.
#[derive(Clone)]
pub struct DieselSink {
    conn: SharedConnection,
}

impl DieselSink {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

/// Writes all rows in one immediate transaction; returns how many were new.
pub fn insert_rows(
    conn: &mut SqliteConnection,
    klines: &[NewKlineRow],
    trades: &[NewTradeRow],
) -> QueryResult<usize> {
    conn.immediate_transaction(|conn| {
        let mut inserted = 0;
        for row in klines {
            inserted += diesel::insert_or_ignore_into(kline_data::table)
                .values(row)
                .execute(conn)?;
        }
        for row in trades {
            inserted += diesel::insert_or_ignore_into(aggregated_trade_data::table)
                .values(row)
                .execute(conn)?;
        }
        Ok(inserted)
    })
}

#[async_trait]
impl DataSink for DieselSink {
    async fn bulk_write(&self, records: &[MarketRecord]) -> Result<usize, SinkError> {
        let mut klines = Vec::new();
        let mut trades = Vec::new();
        for record in records {
            match record {
                MarketRecord::Kline(k) => klines.push(NewKlineRow::from(k)),
                MarketRecord::AggregatedTrade(t) => trades.push(NewTradeRow::from(t)),
            }
        }

        let conn = self.conn.clone();
        let inserted = tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| {
                WriteSnafu {
                    message: "sqlite connection mutex poisoned",
                }
                .build()
            })?;
            insert_rows(&mut conn, &klines, &trades).map_err(|e| {
                WriteSnafu {
                    message: e.to_string(),
                }
                .build()
            })
        })
        .await
        .map_err(|e| {
            WriteSnafu {
                message: format!("write task failed: {e}"),
            }
            .build()
        })??;

        debug!(
            records = records.len(),
            inserted,
            skipped = records.len().saturating_sub(inserted),
            "bulk write committed"
        );
        Ok(inserted)
    }
}

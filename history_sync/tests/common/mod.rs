#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use history_ingestor::models::{AggregatedTrade, Kline, KlineInterval, MarketRecord};
use history_sync::db::{connection, migrate};
use std::path::PathBuf;
use tempfile::TempDir;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}

pub struct TestDb {
    _dir: TempDir,    // keep alive for the life of the test
    pub path: String, // <tmpdir>/test.db
}

pub fn setup_db() -> (TestDb, SqliteConnection) {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("test.db");
    let path = p.to_string_lossy().to_string();

    migrate::run_all(&path).expect("migrations");

    let conn = connection::connect_sqlite(&path).expect("connect");
    (TestDb { _dir: dir, path }, conn)
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal");

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}

pub fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
}

pub fn kline(symbol: &str, open_time: DateTime<Utc>) -> MarketRecord {
    MarketRecord::Kline(Kline {
        symbol: symbol.to_string(),
        interval: KlineInterval::OneMinute,
        open_time,
        close_time: open_time + chrono::Duration::milliseconds(59_999),
        open: 2281.87,
        high: 2282.0,
        low: 2281.86,
        close: 2281.99,
        volume: 3.9288,
        quote_asset_volume: 8965.517601,
        number_of_trades: 12,
        taker_buy_base_volume: 2.1128,
        taker_buy_quote_volume: 4821.35014,
    })
}

pub fn trade(symbol: &str, id: i64, trade_time: DateTime<Utc>) -> MarketRecord {
    MarketRecord::AggregatedTrade(AggregatedTrade {
        symbol: symbol.to_string(),
        aggregated_trade_id: id,
        price: 2281.87,
        quantity: 0.052,
        first_trade_id: id * 10,
        last_trade_id: id * 10 + 2,
        trade_time,
        buyer_market_maker: id % 2 == 0,
        best_price_match: true,
        kline_open_time: history_ingestor::models::record::minute_floor(trade_time),
    })
}

mod common;

use std::sync::{Arc, Mutex};

use common::{at, kline, setup_db, trade};
use diesel::prelude::*;
use history_ingestor::io::DataSink;
use history_sync::{
    DieselSink,
    query::{klines_between, trades_for_kline},
    schema::{aggregated_trade_data, kline_data},
};

fn counts(conn: &mut SqliteConnection) -> (i64, i64) {
    let k = kline_data::table.count().get_result(conn).unwrap();
    let t = aggregated_trade_data::table.count().get_result(conn).unwrap();
    (k, t)
}

#[tokio::test]
async fn bulk_write_stores_both_record_kinds() {
    let (_db, conn) = setup_db();
    let shared = Arc::new(Mutex::new(conn));
    let sink = DieselSink::new(shared.clone());

    let records = vec![
        kline("ETHUSDT", at(0, 0, 0)),
        kline("ETHUSDT", at(0, 1, 0)),
        trade("ETHUSDT", 1, at(0, 0, 12)),
        trade("ETHUSDT", 2, at(0, 0, 59)),
        trade("ETHUSDT", 3, at(0, 1, 0)),
    ];
    assert_eq!(sink.bulk_write(&records).await.unwrap(), 5);

    let mut conn = shared.lock().unwrap();
    assert_eq!(counts(&mut conn), (2, 3));

    let stored = klines_between(&mut conn, "ETHUSDT", "1m", at(0, 0, 0), at(0, 2, 0)).unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].open_time, "2024-01-01T00:00:00.000Z");
    assert_eq!(stored[0].close_time, "2024-01-01T00:00:59.999Z");
    assert_eq!(stored[0].number_of_trades, 12);
    assert_eq!(stored[0].close_price, 2281.99);
}

#[tokio::test]
async fn rewriting_the_same_records_inserts_nothing() {
    let (_db, conn) = setup_db();
    let shared = Arc::new(Mutex::new(conn));
    let sink = DieselSink::new(shared.clone());

    let first = vec![kline("ETHUSDT", at(0, 0, 0)), trade("ETHUSDT", 7, at(0, 0, 1))];
    assert_eq!(sink.bulk_write(&first).await.unwrap(), 2);
    assert_eq!(sink.bulk_write(&first).await.unwrap(), 0);

    // overlapping batch: only the new kline lands
    let second = vec![
        kline("ETHUSDT", at(0, 0, 0)),
        kline("ETHUSDT", at(0, 1, 0)),
        trade("ETHUSDT", 7, at(0, 0, 1)),
    ];
    assert_eq!(sink.bulk_write(&second).await.unwrap(), 1);

    let mut conn = shared.lock().unwrap();
    assert_eq!(counts(&mut conn), (2, 1));
}

#[tokio::test]
async fn same_trade_id_on_another_symbol_is_a_different_row() {
    let (_db, conn) = setup_db();
    let shared = Arc::new(Mutex::new(conn));
    let sink = DieselSink::new(shared.clone());

    let records = vec![trade("ETHUSDT", 1, at(0, 0, 1)), trade("BTCUSDT", 1, at(0, 0, 1))];
    assert_eq!(sink.bulk_write(&records).await.unwrap(), 2);
}

#[tokio::test]
async fn trades_link_to_their_minute_kline() {
    let (_db, conn) = setup_db();
    let shared = Arc::new(Mutex::new(conn));
    let sink = DieselSink::new(shared.clone());

    let records = vec![
        kline("ETHUSDT", at(0, 0, 0)),
        trade("ETHUSDT", 3, at(0, 0, 59)),
        trade("ETHUSDT", 1, at(0, 0, 0)),
        trade("ETHUSDT", 4, at(0, 1, 0)),
        trade("BTCUSDT", 2, at(0, 0, 30)),
    ];
    sink.bulk_write(&records).await.unwrap();

    let mut conn = shared.lock().unwrap();
    let linked = trades_for_kline(&mut conn, "ETHUSDT", at(0, 0, 0)).unwrap();
    let ids: Vec<i64> = linked.iter().map(|t| t.aggregated_trade_id).collect();
    assert_eq!(ids, [1, 3]);
    assert!(linked.iter().all(|t| t.kline_open_time == "2024-01-01T00:00:00.000Z"));
    assert!(!linked[0].buyer_market_maker);
}

#[tokio::test]
async fn empty_batch_is_fine() {
    let (_db, conn) = setup_db();
    let sink = DieselSink::new(Arc::new(Mutex::new(conn)));
    assert_eq!(sink.bulk_write(&[]).await.unwrap(), 0);
}

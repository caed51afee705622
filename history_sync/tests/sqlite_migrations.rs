mod common;
use common::{assert_sqlite_pragmas, setup_db};

use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_query;
use diesel::sql_types::Integer;
use history_sync::db::connection::connect_sqlite;

#[derive(QueryableByName)]
struct TblCnt {
    #[diesel(sql_type = Integer)]
    cnt: i32,
}

#[test]
fn migrations_apply_and_pragmas_are_set() {
    let (db, mut conn) = setup_db();
    assert_sqlite_pragmas(&mut conn);

    let tbls: TblCnt = sql_query(
        "SELECT COUNT(*) AS cnt
            FROM sqlite_master
            WHERE type='table'
            AND name IN ('kline_data','aggregated_trade_data','ingest_watermark');",
    )
    .get_result(&mut conn)
    .unwrap();
    assert_eq!(tbls.cnt, 3, "expected three tables to be present");

    // PRAGMAs are per connection except WAL, which sticks to the file
    let mut second = connect_sqlite(&format!("sqlite://{}", db.path)).expect("connect second");
    assert_sqlite_pragmas(&mut second);
}

#[test]
fn natural_keys_are_unique() {
    let (_db, mut conn) = setup_db();

    let insert = "INSERT INTO kline_data (
            symbol, interval, open_time, close_time, open_price, high_price, low_price,
            close_price, volume, quote_asset_volume, number_of_trades,
            taker_buy_base_volume, taker_buy_quote_volume
        ) VALUES (
            'ETHUSDT', '1s', '2024-01-01T00:00:00.000Z', '2024-01-01T00:00:00.999Z',
            1, 1, 1, 1, 1, 1, 1, 1, 1
        );";
    sql_query(insert).execute(&mut conn).unwrap();

    match sql_query(insert).execute(&mut conn) {
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {}
        other => panic!("expected unique violation, got {other:?}"),
    }
}

#[test]
fn sqlite_begin_immediate_locking_smoke() {
    let (db, mut conn_a) = setup_db();
    let mut conn_b = connect_sqlite(&db.path).expect("connect second");
    // don't wait out the full busy timeout
    sql_query("PRAGMA busy_timeout=50;").execute(&mut conn_b).unwrap();

    sql_query("BEGIN IMMEDIATE;")
        .execute(&mut conn_a)
        .expect("begin immediate on first connection");

    let err = sql_query("BEGIN IMMEDIATE;").execute(&mut conn_b);
    match err {
        Err(DieselError::DatabaseError(_, info)) => {
            assert!(info.message().contains("database is locked"));
        }
        other => panic!("expected second BEGIN IMMEDIATE to fail, got {other:?}"),
    }

    sql_query("ROLLBACK;").execute(&mut conn_a).unwrap();
    sql_query("BEGIN IMMEDIATE;")
        .execute(&mut conn_b)
        .expect("begin immediate after release");
    sql_query("ROLLBACK;").execute(&mut conn_b).unwrap();
}

//! SQLite persistence and the `history-sync` command line for historical
//! Binance market data fetched by `history_ingestor`.
//!
//! - [`db`]: connections and embedded migrations.
//! - [`sink::DieselSink`]: the scheduler's data sink, idempotent by natural key.
//! - [`watermark::WatermarkRepo`]: per-dataset progress, used to resume passes.
//! - [`query`]: read helpers, e.g. the trades behind one 1m kline.

pub mod db;
pub mod models;
pub mod query;
pub mod schema;
pub mod sink;
pub mod tz;
pub mod watermark;

pub use sink::DieselSink;
pub use watermark::WatermarkRepo;

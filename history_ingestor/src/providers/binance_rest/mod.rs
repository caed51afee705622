//! Binance spot REST endpoints (`klines`, `aggTrades`).

pub mod params;
pub mod parser;
pub mod provider;
pub mod response;

pub use provider::{BASE_URL, BinanceRestApi};

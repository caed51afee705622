//! Proxy-rotated ingestion of historical Binance market data.
//!
//! A pass partitions a time range into fixed-width windows, groups them into
//! chunks, and fetches each chunk concurrently through a rotating pool of
//! provisioned HTTP proxies. Parsed records are buffered and handed to a
//! [`io::DataSink`] per chunk or once per pass.

pub mod config;
pub mod errors;
pub mod io;
pub mod models;
pub mod plan;
pub mod providers;
pub mod provision;
pub mod proxy;
pub mod scheduler;

pub use config::{AppConfig, FlushPolicy, IngestSettings, ProvisionCadence, SchedulerConfig};
pub use errors::IngestError;
pub use scheduler::{FailedWindow, IngestionScheduler, PassSummary};

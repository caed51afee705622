#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    num::{NonZeroU32, NonZeroUsize},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use history_ingestor::{
    FlushPolicy, IngestionScheduler, ProvisionCadence, SchedulerConfig,
    io::{CoveredSpan, DataSink, ProgressError, ProgressTracker, SinkError, sink::WriteSnafu},
    models::{MarketRecord, ProxyEndpoint, ProxyHost, Resource, TimeWindow},
    providers::{FetchError, MarketDataApi, RawResponse},
    provision::{StaticInventory, StaticProvisioner},
};
use tokio_util::sync::CancellationToken;

pub fn ts(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
}

/// One-minute windows, tiny sleeps, two requests per proxy.
pub fn config(chunk_size: usize, flush_policy: FlushPolicy) -> SchedulerConfig {
    SchedulerConfig {
        window_width: chrono::Duration::seconds(60),
        max_chunk_size: NonZeroUsize::new(chunk_size).unwrap(),
        requests_per_proxy: NonZeroU32::new(2).unwrap(),
        rotation_cycles: NonZeroU32::new(1).unwrap(),
        max_retry_attempts: NonZeroU32::new(3).unwrap(),
        retry_backoff: Duration::from_millis(1),
        pool_cooldown: Duration::from_millis(1),
        chunk_delay: Duration::ZERO,
        flush_policy,
        provision_cadence: ProvisionCadence::PerChunk,
        max_requests_per_second_per_proxy: None,
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Transient,
    Malformed,
}

/// Answers every call with a single record stamped at the window start, unless
/// a reply was scripted for that window.
#[derive(Default)]
pub struct ScriptedApi {
    script: Mutex<HashMap<i64, VecDeque<Reply>>>,
    always_transient: Mutex<Vec<i64>>,
    calls: Mutex<HashMap<i64, usize>>,
    proxies: Mutex<Vec<String>>,
}

impl ScriptedApi {
    pub fn script(&self, window_start: DateTime<Utc>, replies: impl IntoIterator<Item = Reply>) {
        self.script
            .lock()
            .unwrap()
            .entry(window_start.timestamp_millis())
            .or_default()
            .extend(replies);
    }

    pub fn always_fail(&self, window_start: DateTime<Utc>) {
        self.always_transient
            .lock()
            .unwrap()
            .push(window_start.timestamp_millis());
    }

    pub fn calls_for(&self, window_start: DateTime<Utc>) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&window_start.timestamp_millis())
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn proxies_used(&self) -> Vec<String> {
        self.proxies.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketDataApi for ScriptedApi {
    async fn fetch(
        &self,
        resource: &Resource,
        window: &TimeWindow,
        proxy: &ProxyEndpoint,
    ) -> Result<RawResponse, FetchError> {
        let start = window.start().timestamp_millis();
        *self.calls.lock().unwrap().entry(start).or_default() += 1;
        self.proxies.lock().unwrap().push(proxy.host.clone());

        if self.always_transient.lock().unwrap().contains(&start) {
            return Err(transient(proxy));
        }
        let scripted = self
            .script
            .lock()
            .unwrap()
            .get_mut(&start)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(Reply::Transient) => Err(transient(proxy)),
            Some(Reply::Malformed) => Ok(RawResponse::ok(r#"{"unexpected":"object"}"#)),
            None => Ok(RawResponse::ok(match resource {
                Resource::Klines { .. } => format!(
                    r#"[[{start},"1.0","2.0","0.5","1.5","10.0",{close},"15.0",3,"4.0","6.0","0"]]"#,
                    close = start + 999
                ),
                Resource::AggTrades { .. } => format!(
                    r#"[{{"a":{start},"p":"1.5","q":"0.2","f":1,"l":2,"T":{start},"m":true,"M":true}}]"#
                ),
            })),
        }
    }
}

/// Holds one 1s kline at every whole second and `trades_per_second` trades
/// stamped on every whole second, and answers like the exchange: rows inside
/// the requested bounds, oldest first, at most `limit` of them.
pub struct PagedApi {
    trades_per_second: i64,
    calls: AtomicUsize,
}

impl PagedApi {
    pub fn new(trades_per_second: i64) -> Self {
        Self {
            trades_per_second,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataApi for PagedApi {
    async fn fetch(
        &self,
        resource: &Resource,
        window: &TimeWindow,
        _proxy: &ProxyEndpoint,
    ) -> Result<RawResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (from_ms, to_ms) = window.request_bounds_ms();
        let seconds = (from_ms + 999) / 1000..=to_ms / 1000;
        let limit = usize::from(resource.limit());

        let rows: Vec<String> = match resource {
            Resource::Klines { .. } => seconds
                .map(|s| {
                    let open = s * 1000;
                    format!(
                        r#"[{open},"1.0","2.0","0.5","1.5","10.0",{close},"15.0",3,"4.0","6.0","0"]"#,
                        close = open + 999
                    )
                })
                .take(limit)
                .collect(),
            Resource::AggTrades { .. } => seconds
                .flat_map(|s| (0..self.trades_per_second).map(move |k| (s * 1000, s * 1000 + k)))
                .map(|(ms, id)| {
                    format!(r#"{{"a":{id},"p":"1.5","q":"0.2","f":1,"l":2,"T":{ms},"m":true,"M":true}}"#)
                })
                .take(limit)
                .collect(),
        };
        Ok(RawResponse::ok(format!("[{}]", rows.join(","))))
    }
}

fn transient(proxy: &ProxyEndpoint) -> FetchError {
    FetchError::Transient {
        proxy: proxy.to_string(),
        message: "connection reset".to_string(),
    }
}

/// Keeps every batch it is handed. Can be told to fail, or to cancel a token
/// on its first write.
#[derive(Default)]
pub struct MemorySink {
    batches: Mutex<Vec<Vec<MarketRecord>>>,
    failing: AtomicBool,
    writes: AtomicUsize,
    cancel_on_write: Mutex<Option<CancellationToken>>,
}

impl MemorySink {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn cancel_on_first_write(&self, token: CancellationToken) {
        *self.cancel_on_write.lock().unwrap() = Some(token);
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub fn attempts(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn open_times(&self) -> Vec<DateTime<Utc>> {
        let mut times: Vec<_> = self
            .batches
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(MarketRecord::event_time)
            .collect();
        times.sort();
        times
    }
}

#[async_trait]
impl DataSink for MemorySink {
    async fn bulk_write(&self, records: &[MarketRecord]) -> Result<usize, SinkError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return WriteSnafu {
                message: "database is locked",
            }
            .fail();
        }
        if let Some(token) = self.cancel_on_write.lock().unwrap().take() {
            token.cancel();
        }
        self.batches.lock().unwrap().push(records.to_vec());
        Ok(records.len())
    }
}

#[derive(Default)]
pub struct MemoryProgress {
    spans: Mutex<HashMap<String, Vec<CoveredSpan>>>,
}

impl MemoryProgress {
    /// Span ends in the order they were recorded.
    pub fn history(&self, dataset: &str) -> Vec<DateTime<Utc>> {
        self.spans(dataset).iter().map(|s| s.until).collect()
    }

    pub fn spans(&self, dataset: &str) -> Vec<CoveredSpan> {
        self.spans
            .lock()
            .unwrap()
            .get(dataset)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProgressTracker for MemoryProgress {
    async fn covered_span(&self, dataset: &str) -> Result<Option<CoveredSpan>, ProgressError> {
        Ok(self.spans(dataset).last().copied())
    }

    async fn record_progress(&self, dataset: &str, span: CoveredSpan) -> Result<(), ProgressError> {
        self.spans
            .lock()
            .unwrap()
            .entry(dataset.to_string())
            .or_default()
            .push(span);
        Ok(())
    }
}

pub struct Harness {
    pub api: Arc<ScriptedApi>,
    pub sink: Arc<MemorySink>,
    pub progress: Arc<MemoryProgress>,
    pub scheduler: IngestionScheduler,
}

pub fn harness(config: SchedulerConfig, hosts: &[&str]) -> Harness {
    let api = Arc::new(ScriptedApi::default());
    let (sink, progress, scheduler) = build(config, hosts, api.clone());
    Harness {
        api,
        sink,
        progress,
        scheduler,
    }
}

/// A scheduler over `api` with memory sink and progress.
pub fn build(
    config: SchedulerConfig,
    hosts: &[&str],
    api: Arc<dyn MarketDataApi>,
) -> (Arc<MemorySink>, Arc<MemoryProgress>, IngestionScheduler) {
    let sink = Arc::new(MemorySink::default());
    let progress = Arc::new(MemoryProgress::default());
    let inventory = StaticInventory::new(hosts.iter().map(|h| ProxyHost::new(*h)));

    let scheduler = IngestionScheduler::new(
        config,
        api,
        Arc::new(StaticProvisioner::new(8888, None)),
        Arc::new(inventory),
        sink.clone(),
    )
    .with_progress(progress.clone());

    (sink, progress, scheduler)
}

//! The ingestion pass: plan windows, fan fetches out per chunk, flush.
//!
//! One pass runs on one task. The fetch futures of a chunk are multiplexed with
//! `FuturesUnordered`, so the accumulation buffer is only touched by this loop
//! and needs no lock; the proxy rotation is the one piece of shared state.
//! Records land in the buffer in completion order, not window order.

mod fetch;
pub mod summary;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use snafu::ensure;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::{FlushPolicy, ProvisionCadence, SchedulerConfig},
    errors::{IngestError, NoProxiesSnafu},
    io::{CoveredSpan, DataSink, ProgressTracker},
    models::{MarketRecord, Resource},
    plan::{chunk, partition},
    providers::MarketDataApi,
    provision::{HostInventory, ProxyProvisioner},
    proxy::{ProxyPool, ProxyRotation},
};

use fetch::{FetchContext, WindowOutcome, fetch_window};
pub use summary::{FailedWindow, PassSummary};

pub struct IngestionScheduler {
    config: SchedulerConfig,
    api: Arc<dyn MarketDataApi>,
    provisioner: Arc<dyn ProxyProvisioner>,
    inventory: Arc<dyn HostInventory>,
    sink: Arc<dyn DataSink>,
    progress: Option<Arc<dyn ProgressTracker>>,
    rotation: ProxyRotation,
    buffer: Vec<MarketRecord>,
}

impl IngestionScheduler {
    pub fn new(
        config: SchedulerConfig,
        api: Arc<dyn MarketDataApi>,
        provisioner: Arc<dyn ProxyProvisioner>,
        inventory: Arc<dyn HostInventory>,
        sink: Arc<dyn DataSink>,
    ) -> Self {
        let pool = ProxyPool::new(Vec::new(), config.requests_per_proxy)
            .with_cycles(config.rotation_cycles);
        let mut rotation = ProxyRotation::new(pool, config.pool_cooldown);
        if let Some(rate) = config.max_requests_per_second_per_proxy {
            rotation = rotation.with_per_proxy_rate(rate);
        }

        Self {
            config,
            api,
            provisioner,
            inventory,
            sink,
            progress: None,
            rotation,
            buffer: Vec::new(),
        }
    }

    /// Records a watermark after every successful flush.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressTracker>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Exhaustion cooldowns sat through since this scheduler was built.
    pub fn pool_cooldowns(&self) -> u64 {
        self.rotation.cooldowns()
    }

    /// Records fetched but not yet confirmed written.
    pub fn pending_records(&self) -> &[MarketRecord] {
        &self.buffer
    }

    /// Where a pass for `resource` should start: the end of the stored span
    /// when `start` falls inside it, otherwise `start` itself.
    pub async fn resume_point(
        &self,
        resource: &Resource,
        start: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, IngestError> {
        let Some(progress) = &self.progress else {
            return Ok(start);
        };
        let span = progress.covered_span(&resource.dataset_key()).await?;
        Ok(match span {
            Some(span) if span.contains(start) => span.until,
            _ => start,
        })
    }

    /// Runs one pass over `[start, end]`.
    ///
    /// Failed windows are reported in the summary rather than aborting the
    /// pass. Planning, provisioning and persistence errors do abort it; on a
    /// persistence error the buffer is kept and [`IngestionScheduler::flush`]
    /// can be retried.
    ///
    /// `cancel` is checked before every chunk; a chunk that has started always
    /// runs to completion.
    pub async fn run(
        &mut self,
        resource: &Resource,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<PassSummary, IngestError> {
        let windows = partition(start, end, self.config.window_width)?;
        let chunk_size = self.config.max_chunk_size.get();
        let chunks = chunk(windows, chunk_size)?;
        let dataset = resource.dataset_key();

        let mut summary = PassSummary::new(chunks.iter().map(Vec::len).sum());
        info!(
            dataset = %dataset,
            start = %start,
            end = %end,
            windows = summary.windows_total,
            chunks = chunks.len(),
            "starting pass"
        );

        for (index, windows) in chunks.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                summary.resume_from = Some(windows[0].start());
                warn!(dataset = %dataset, chunk = index, "pass cancelled before chunk");
                break;
            }

            if index == 0 || self.config.provision_cadence == ProvisionCadence::PerChunk {
                self.refresh_proxies().await?;
            } else {
                self.rotation.reset().await;
            }

            if index > 0 && !self.config.chunk_delay.is_zero() {
                tokio::time::sleep(self.config.chunk_delay).await;
            }

            info!(
                dataset = %dataset,
                chunk = index,
                windows = windows.len(),
                from = %windows[0].start(),
                "fetching chunk"
            );

            let failed_before = summary.windows_failed.len();
            {
                let ctx = FetchContext {
                    api: self.api.as_ref(),
                    rotation: &self.rotation,
                    resource,
                    max_attempts: self.config.max_retry_attempts,
                    backoff: self.config.retry_backoff,
                };
                let mut in_flight: FuturesUnordered<_> = windows
                    .iter()
                    .enumerate()
                    .map(|(i, window)| fetch_window(&ctx, index * chunk_size + i, *window))
                    .collect();

                while let Some(outcome) = in_flight.next().await {
                    match outcome {
                        WindowOutcome::Fetched { records } => {
                            summary.windows_succeeded += 1;
                            self.buffer.extend(records);
                        }
                        WindowOutcome::Failed(failure) => summary.windows_failed.push(failure),
                    }
                }
            }

            info!(
                dataset = %dataset,
                chunk = index,
                failed = summary.windows_failed.len() - failed_before,
                buffered = self.buffer.len(),
                "chunk done"
            );

            if self.config.flush_policy == FlushPolicy::PerChunk {
                summary.records_written += self.flush().await?;
                let chunk_end = windows[windows.len() - 1].end();
                self.record_progress(&dataset, &summary, start, chunk_end).await?;
            }
        }

        if self.config.flush_policy == FlushPolicy::EndOfRun {
            summary.records_written += self.flush().await?;
            let reached = summary.resume_from.unwrap_or(end);
            self.record_progress(&dataset, &summary, start, reached).await?;
        }

        info!(
            dataset = %dataset,
            succeeded = summary.windows_succeeded,
            failed = summary.windows_failed.len(),
            records = summary.records_written,
            cancelled = summary.cancelled,
            "pass finished"
        );
        Ok(summary)
    }

    /// Hands the buffer to the sink and clears it once the write is confirmed.
    pub async fn flush(&mut self) -> Result<usize, IngestError> {
        if self.buffer.is_empty() {
            return Ok(0);
        }
        let written = self.sink.bulk_write(&self.buffer).await?;
        info!(records = self.buffer.len(), written, "flushed records");
        self.buffer.clear();
        Ok(written)
    }

    async fn refresh_proxies(&self) -> Result<(), IngestError> {
        let hosts = self.inventory.list_hosts().await?;
        let ready = self.provisioner.ensure_proxies_ready(&hosts).await?;
        ensure!(!ready.is_empty(), NoProxiesSnafu { hosts: hosts.len() });
        info!(proxies = ready.len(), "proxy pool refreshed");
        self.rotation.refresh(ready).await;
        Ok(())
    }

    /// Extends the stored span with `[start, reached)`, cut at the earliest
    /// failed window so a resumed pass picks failures up again.
    ///
    /// A pass separated from the stored span by a gap leaves it untouched;
    /// recording it would let a resume skip the gap.
    async fn record_progress(
        &self,
        dataset: &str,
        summary: &PassSummary,
        start: DateTime<Utc>,
        reached: DateTime<Utc>,
    ) -> Result<(), IngestError> {
        let Some(progress) = &self.progress else {
            return Ok(());
        };
        let boundary = summary
            .earliest_failure()
            .map_or(reached, |failed| failed.min(reached));
        let Some(written) = CoveredSpan::new(start, boundary) else {
            return Ok(());
        };

        let span = match progress.covered_span(dataset).await? {
            None => written,
            Some(stored) => match written.union(&stored) {
                Some(merged) => merged,
                None => {
                    debug!(
                        dataset = %dataset,
                        stored_from = %stored.from,
                        stored_until = %stored.until,
                        pass_start = %start,
                        "pass is not contiguous with the stored span, leaving it"
                    );
                    return Ok(());
                }
            },
        };
        progress.record_progress(dataset, span).await?;
        Ok(())
    }
}

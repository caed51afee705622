use std::{
    num::NonZeroU32,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    models::ProxyEndpoint,
    proxy::pool::{ExhaustedPool, ProxyPool},
};

/// Shared handle every fetch task draws proxies from.
///
/// All pool mutation goes through one async mutex. When the pool runs dry the
/// acquiring task sleeps the cooldown *while holding the lock*, so every other
/// task queues behind the same rest period instead of hammering a tired proxy.
#[derive(Clone)]
pub struct ProxyRotation {
    pool: Arc<Mutex<ProxyPool>>,
    cooldown: Duration,
    limiter: Option<Arc<DefaultKeyedRateLimiter<String>>>,
    cooldowns: Arc<AtomicU64>,
}

impl ProxyRotation {
    pub fn new(pool: ProxyPool, cooldown: Duration) -> Self {
        Self {
            pool: Arc::new(Mutex::new(pool)),
            cooldown,
            limiter: None,
            cooldowns: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Caps how many requests per second any single proxy host receives.
    pub fn with_per_proxy_rate(mut self, per_second: NonZeroU32) -> Self {
        self.limiter = Some(Arc::new(RateLimiter::keyed(Quota::per_second(per_second))));
        self
    }

    /// Returns the next proxy, cooling down and resetting the pool if it is exhausted.
    ///
    /// Only fails when the pool holds no endpoints at all.
    pub async fn acquire(&self) -> Result<ProxyEndpoint, ExhaustedPool> {
        let proxy = {
            let mut pool = self.pool.lock().await;
            match pool.next() {
                Ok(proxy) => proxy,
                Err(exhausted) if pool.is_empty() => return Err(exhausted),
                Err(exhausted) => {
                    warn!(
                        proxies = exhausted.proxies,
                        cooldown_secs = self.cooldown.as_secs_f64(),
                        "proxy pool exhausted, cooling down"
                    );
                    tokio::time::sleep(self.cooldown).await;
                    pool.reset();
                    self.cooldowns.fetch_add(1, Ordering::Relaxed);
                    pool.next()?
                }
            }
        };

        if let Some(limiter) = &self.limiter {
            limiter.until_key_ready(&proxy.host).await;
        }
        debug!(proxy = %proxy, "proxy acquired");
        Ok(proxy)
    }

    /// Replaces the endpoint list (after a provisioning refresh) and resets the cursor.
    pub async fn refresh(&self, endpoints: Vec<ProxyEndpoint>) {
        self.pool.lock().await.replace(endpoints);
        // hosts that have gone quiet look like new ones; drop their state
        if let Some(limiter) = &self.limiter {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }

    pub async fn reset(&self) {
        self.pool.lock().await.reset();
    }

    pub async fn len(&self) -> usize {
        self.pool.lock().await.len()
    }

    /// How many exhaustion cooldowns this handle has sat through.
    pub fn cooldowns(&self) -> u64 {
        self.cooldowns.load(Ordering::Relaxed)
    }
}

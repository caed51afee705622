//! Deterministic round-robin over a list of proxy endpoints.
//!
//! Each proxy serves `requests_per_proxy` calls before the cursor moves on.
//! Walking off the end of the list counts one completed cycle; while the
//! cycle budget lasts the cursor wraps to the front, after that the pool is
//! exhausted and every call fails until [`ProxyPool::reset`].

use std::num::NonZeroU32;

use nonzero_ext::nonzero;
use thiserror::Error;

use crate::models::ProxyEndpoint;

/// The pool has no proxy left to hand out. Recoverable by cooldown + reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("proxy pool exhausted after {cycles} cycle(s) over {proxies} proxies")]
pub struct ExhaustedPool {
    pub proxies: usize,
    pub cycles: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Serving the proxy under the cursor.
    Active,
    /// The last call used up a proxy's budget and the cursor just moved.
    Rotating,
    /// Cycle budget spent, or no proxies at all.
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct ProxyPool {
    endpoints: Vec<ProxyEndpoint>,
    requests_per_proxy: NonZeroU32,
    cycles: NonZeroU32,
    cursor: usize,
    served: u32,
    completed_cycles: u32,
    rotated: bool,
    exhausted: bool,
}

impl ProxyPool {
    /// Creates a pool that walks the list once before exhausting.
    pub fn new(endpoints: Vec<ProxyEndpoint>, requests_per_proxy: NonZeroU32) -> Self {
        Self {
            endpoints,
            requests_per_proxy,
            cycles: nonzero!(1u32),
            cursor: 0,
            served: 0,
            completed_cycles: 0,
            rotated: false,
            exhausted: false,
        }
    }

    /// Number of full passes over the list allowed before exhaustion.
    pub fn with_cycles(mut self, cycles: NonZeroU32) -> Self {
        self.cycles = cycles;
        self
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn endpoints(&self) -> &[ProxyEndpoint] {
        &self.endpoints
    }

    pub fn state(&self) -> PoolState {
        if self.exhausted || self.endpoints.is_empty() {
            PoolState::Exhausted
        } else if self.rotated {
            PoolState::Rotating
        } else {
            PoolState::Active
        }
    }

    /// Hands out the proxy under the cursor and counts the request against it.
    pub fn next(&mut self) -> Result<ProxyEndpoint, ExhaustedPool> {
        if self.state() == PoolState::Exhausted {
            return Err(ExhaustedPool {
                proxies: self.endpoints.len(),
                cycles: self.completed_cycles,
            });
        }

        let proxy = self.endpoints[self.cursor].clone();
        self.served += 1;
        self.rotated = false;
        if self.served >= self.requests_per_proxy.get() {
            self.served = 0;
            self.advance();
        }
        Ok(proxy)
    }

    /// Starts over from the first proxy with a fresh cycle budget.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.served = 0;
        self.completed_cycles = 0;
        self.rotated = false;
        self.exhausted = false;
    }

    /// Swaps in a refreshed endpoint list and resets.
    pub fn replace(&mut self, endpoints: Vec<ProxyEndpoint>) {
        self.endpoints = endpoints;
        self.reset();
    }

    fn advance(&mut self) {
        self.rotated = true;
        if self.cursor + 1 < self.endpoints.len() {
            self.cursor += 1;
            return;
        }

        self.completed_cycles += 1;
        if self.completed_cycles >= self.cycles.get() {
            // cursor stays on the last index; nothing reads it until reset
            self.exhausted = true;
        } else {
            self.cursor = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(hosts: &[&str]) -> Vec<ProxyEndpoint> {
        hosts.iter().map(|h| ProxyEndpoint::new(*h, 8888)).collect()
    }

    fn hosts(results: &[Result<ProxyEndpoint, ExhaustedPool>]) -> Vec<String> {
        results
            .iter()
            .map(|r| match r {
                Ok(p) => p.host.clone(),
                Err(_) => "EXHAUSTED".to_string(),
            })
            .collect()
    }

    #[test]
    fn each_proxy_serves_its_threshold_then_pool_exhausts() {
        let mut pool = ProxyPool::new(endpoints(&["a", "b"]), nonzero!(3u32));
        let got: Vec<_> = (0..7).map(|_| pool.next()).collect();
        assert_eq!(hosts(&got), ["a", "a", "a", "b", "b", "b", "EXHAUSTED"]);
        assert_eq!(pool.state(), PoolState::Exhausted);
    }

    #[test]
    fn two_cycles_over_two_proxies() {
        let mut pool =
            ProxyPool::new(endpoints(&["a", "b"]), nonzero!(1u32)).with_cycles(nonzero!(2u32));
        let got: Vec<_> = (0..5).map(|_| pool.next()).collect();
        assert_eq!(hosts(&got), ["a", "b", "a", "b", "EXHAUSTED"]);
        assert_eq!(
            got[4],
            Err(ExhaustedPool {
                proxies: 2,
                cycles: 2
            })
        );
    }

    #[test]
    fn reset_restarts_rotation() {
        let mut pool = ProxyPool::new(endpoints(&["a", "b"]), nonzero!(1u32));
        pool.next().unwrap();
        pool.next().unwrap();
        assert!(pool.next().is_err());

        pool.reset();
        assert_eq!(pool.state(), PoolState::Active);
        assert_eq!(pool.next().unwrap().host, "a");
    }

    #[test]
    fn state_reports_rotation() {
        let mut pool = ProxyPool::new(endpoints(&["a", "b", "c"]), nonzero!(2u32));
        assert_eq!(pool.state(), PoolState::Active);
        pool.next().unwrap();
        assert_eq!(pool.state(), PoolState::Active);
        pool.next().unwrap();
        assert_eq!(pool.state(), PoolState::Rotating);
        assert_eq!(pool.next().unwrap().host, "b");
        assert_eq!(pool.state(), PoolState::Active);
    }

    #[test]
    fn empty_pool_is_always_exhausted() {
        let mut pool = ProxyPool::new(Vec::new(), nonzero!(1u32));
        assert_eq!(pool.state(), PoolState::Exhausted);
        assert!(pool.next().is_err());
        pool.reset();
        assert!(pool.next().is_err());
    }

    #[test]
    fn replace_swaps_list_and_resets() {
        let mut pool = ProxyPool::new(endpoints(&["a"]), nonzero!(1u32));
        pool.next().unwrap();
        assert!(pool.next().is_err());

        pool.replace(endpoints(&["x", "y"]));
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.next().unwrap().host, "x");
        assert_eq!(pool.next().unwrap().host, "y");
    }
}

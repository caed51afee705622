//! Proxy rotation: the pool state machine and the shared handle fetch tasks use.

pub mod pool;
pub mod rotation;

pub use pool::{ExhaustedPool, PoolState, ProxyPool};
pub use rotation::ProxyRotation;

pub mod interval;
pub mod proxy;
pub mod record;
pub mod resource;
pub mod window;

pub use interval::KlineInterval;
pub use proxy::{ProxyEndpoint, ProxyHost};
pub use record::{AggregatedTrade, Kline, MarketRecord};
pub use resource::Resource;
pub use window::TimeWindow;

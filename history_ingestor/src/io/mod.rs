pub mod progress;
pub mod sink;

pub use progress::{CoveredSpan, ProgressError, ProgressTracker};
pub use sink::{DataSink, SinkError};

use snafu::{Backtrace, Snafu};

use crate::{
    config::ConfigError, io::ProgressError, io::SinkError, plan::PartitionError,
    provision::ProvisionError,
};

/// Reasons a pass stops early. Per-window fetch failures are not among them;
/// those end up in the pass summary.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum IngestError {
    #[snafu(display("cannot plan pass: {source}"), context(false))]
    Partition { source: PartitionError },

    #[snafu(display("invalid configuration: {source}"), context(false))]
    Config { source: ConfigError },

    #[snafu(display("proxy provisioning failed: {source}"), context(false))]
    Provision { source: ProvisionError },

    #[snafu(display("none of {hosts} proxy hosts is ready"))]
    NoProxies { hosts: usize, backtrace: Backtrace },

    #[snafu(display("persisting records failed: {source}"), context(false))]
    Persistence { source: SinkError },

    #[snafu(display("cannot record progress: {source}"), context(false))]
    Progress { source: ProgressError },
}

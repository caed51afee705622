//! Configuration loaded from a TOML file with environment overrides.
//!
//! Each job (`klines`, `trades`) starts from its preset; the matching TOML
//! table only needs the fields that differ. Secrets never live in the file:
//! the file names environment variables (`api_key_env`, `credential_env`)
//! that hold them.
//!
//! ```toml
//! [klines]
//! max_chunk_size = 720
//!
//! [trades]
//! flush_policy = "end_of_run"
//!
//! [api]
//! timeout_secs = 10
//!
//! [proxy]
//! port = 8888
//! hosts = [{ host = "10.0.0.5" }, { host = "10.0.0.6", ssh_user = "ubuntu" }]
//! ```

use std::{
    num::{NonZeroU32, NonZeroUsize},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use shared_utils::env::{EnvVarError, parse_env_var_or};
use snafu::{ResultExt, Snafu};

use crate::models::{ProxyHost, Resource, proxy::DEFAULT_PROXY_PORT};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    #[snafu(display("cannot read config {}: {source}", path.display()))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot parse config {}: {source}", path.display()))]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[snafu(display("invalid configuration: {message}"))]
    Invalid { message: String },

    #[snafu(display("environment override failed: {source}"), context(false))]
    Env { source: EnvVarError },
}

/// When accumulated records are handed to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushPolicy {
    /// Persist and clear after every chunk. Bounded memory.
    PerChunk,
    /// One bulk write after the last chunk.
    EndOfRun,
}

/// How often the proxy host list is re-provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionCadence {
    PerChunk,
    PerPass,
}

/// Engine settings as written in TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestSettings {
    pub window_width_secs: u64,
    pub max_chunk_size: usize,
    pub requests_per_proxy: u32,
    pub rotation_cycles: u32,
    pub max_retry_attempts: u32,
    pub retry_backoff_secs: u64,
    pub pool_cooldown_secs: u64,
    pub chunk_delay_secs: u64,
    pub flush_policy: FlushPolicy,
    pub provision_cadence: ProvisionCadence,
    pub max_requests_per_second_per_proxy: Option<u32>,
}

impl IngestSettings {
    /// 16-minute kline windows, three requests per proxy, one write at the end.
    pub fn klines_preset() -> Self {
        Self {
            window_width_secs: 16 * 60,
            max_chunk_size: 1440,
            requests_per_proxy: 3,
            rotation_cycles: 1,
            max_retry_attempts: 5,
            retry_backoff_secs: 20,
            pool_cooldown_secs: 20,
            chunk_delay_secs: 0,
            flush_policy: FlushPolicy::EndOfRun,
            provision_cadence: ProvisionCadence::PerChunk,
            max_requests_per_second_per_proxy: None,
        }
    }

    /// One-minute trade windows (fetched as two halves), one request per proxy,
    /// persisted per chunk with a rest between chunks.
    pub fn trades_preset() -> Self {
        Self {
            window_width_secs: 60,
            requests_per_proxy: 1,
            chunk_delay_secs: 20,
            flush_policy: FlushPolicy::PerChunk,
            ..Self::klines_preset()
        }
    }

    /// Applies `HISTORY_MAX_CHUNK_SIZE` and `HISTORY_MAX_RETRY_ATTEMPTS`, if set.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        self.max_chunk_size = parse_env_var_or("HISTORY_MAX_CHUNK_SIZE", self.max_chunk_size)?;
        self.max_retry_attempts =
            parse_env_var_or("HISTORY_MAX_RETRY_ATTEMPTS", self.max_retry_attempts)?;
        Ok(self)
    }

    /// Checks ranges and converts to the typed form the scheduler runs on.
    pub fn validate(&self) -> Result<SchedulerConfig, ConfigError> {
        let window_width_secs = i64::try_from(self.window_width_secs)
            .ok()
            .filter(|w| *w > 0)
            .ok_or_else(|| invalid("window_width_secs must be a positive number of seconds"))?;

        Ok(SchedulerConfig {
            window_width: chrono::Duration::seconds(window_width_secs),
            max_chunk_size: NonZeroUsize::new(self.max_chunk_size)
                .ok_or_else(|| invalid("max_chunk_size must be at least 1"))?,
            requests_per_proxy: NonZeroU32::new(self.requests_per_proxy)
                .ok_or_else(|| invalid("requests_per_proxy must be at least 1"))?,
            rotation_cycles: NonZeroU32::new(self.rotation_cycles)
                .ok_or_else(|| invalid("rotation_cycles must be at least 1"))?,
            max_retry_attempts: NonZeroU32::new(self.max_retry_attempts)
                .ok_or_else(|| invalid("max_retry_attempts must be at least 1"))?,
            retry_backoff: Duration::from_secs(self.retry_backoff_secs),
            pool_cooldown: Duration::from_secs(self.pool_cooldown_secs),
            chunk_delay: Duration::from_secs(self.chunk_delay_secs),
            flush_policy: self.flush_policy,
            provision_cadence: self.provision_cadence,
            max_requests_per_second_per_proxy: match self.max_requests_per_second_per_proxy {
                None => None,
                Some(n) => Some(NonZeroU32::new(n).ok_or_else(|| {
                    invalid("max_requests_per_second_per_proxy must be at least 1")
                })?),
            },
        })
    }

    /// [`IngestSettings::validate`], plus a check that one call per window
    /// can return every kline of that window.
    ///
    /// Trade counts are unknowable up front; full trade pages are paged
    /// through at fetch time instead.
    pub fn validate_for(&self, resource: &Resource) -> Result<SchedulerConfig, ConfigError> {
        let config = self.validate()?;
        let Resource::Klines {
            interval, limit, ..
        } = resource
        else {
            return Ok(config);
        };
        let Some(candle) = interval.duration() else {
            return Ok(config);
        };

        let width_ms = config.window_width.num_milliseconds();
        let candle_ms = candle.num_milliseconds();
        let candles = (width_ms + candle_ms - 1) / candle_ms;
        if candles > i64::from(*limit) {
            return InvalidSnafu {
                message: format!(
                    "window_width_secs {} holds {candles} {interval} klines, more than the {limit} one call returns",
                    self.window_width_secs
                ),
            }
            .fail();
        }
        Ok(config)
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid {
        message: message.to_string(),
    }
}

/// Validated engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub window_width: chrono::Duration,
    pub max_chunk_size: NonZeroUsize,
    pub requests_per_proxy: NonZeroU32,
    pub rotation_cycles: NonZeroU32,
    /// Total attempts per window, the first one included.
    pub max_retry_attempts: NonZeroU32,
    pub retry_backoff: Duration,
    pub pool_cooldown: Duration,
    pub chunk_delay: Duration,
    pub flush_policy: FlushPolicy,
    pub provision_cadence: ProvisionCadence,
    pub max_requests_per_second_per_proxy: Option<NonZeroU32>,
}

/// Per-job overrides on top of a preset. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestOverrides {
    pub window_width_secs: Option<u64>,
    pub max_chunk_size: Option<usize>,
    pub requests_per_proxy: Option<u32>,
    pub rotation_cycles: Option<u32>,
    pub max_retry_attempts: Option<u32>,
    pub retry_backoff_secs: Option<u64>,
    pub pool_cooldown_secs: Option<u64>,
    pub chunk_delay_secs: Option<u64>,
    pub flush_policy: Option<FlushPolicy>,
    pub provision_cadence: Option<ProvisionCadence>,
    pub max_requests_per_second_per_proxy: Option<u32>,
}

impl IngestOverrides {
    pub fn apply(&self, base: IngestSettings) -> IngestSettings {
        IngestSettings {
            window_width_secs: self.window_width_secs.unwrap_or(base.window_width_secs),
            max_chunk_size: self.max_chunk_size.unwrap_or(base.max_chunk_size),
            requests_per_proxy: self.requests_per_proxy.unwrap_or(base.requests_per_proxy),
            rotation_cycles: self.rotation_cycles.unwrap_or(base.rotation_cycles),
            max_retry_attempts: self.max_retry_attempts.unwrap_or(base.max_retry_attempts),
            retry_backoff_secs: self.retry_backoff_secs.unwrap_or(base.retry_backoff_secs),
            pool_cooldown_secs: self.pool_cooldown_secs.unwrap_or(base.pool_cooldown_secs),
            chunk_delay_secs: self.chunk_delay_secs.unwrap_or(base.chunk_delay_secs),
            flush_policy: self.flush_policy.unwrap_or(base.flush_policy),
            provision_cadence: self.provision_cadence.unwrap_or(base.provision_cadence),
            max_requests_per_second_per_proxy: self
                .max_requests_per_second_per_proxy
                .or(base.max_requests_per_second_per_proxy),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Environment variable holding the API key, if one should be sent.
    pub api_key_env: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: crate::providers::binance_rest::BASE_URL.to_string(),
            timeout_secs: 30,
            api_key_env: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub port: u16,
    /// Environment variable holding `user:password` for every proxy.
    pub credential_env: Option<String>,
    pub hosts: Vec<ProxyHost>,
    /// Present when hosts should be (re)started over SSH before use.
    pub ssh: Option<SshSettings>,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PROXY_PORT,
            credential_env: None,
            hosts: Vec::new(),
            ssh: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    pub port: u16,
    pub attempts: u32,
    pub retry_delay_secs: u64,
    pub connect_timeout_secs: u64,
    /// Used for hosts that don't name their own user / key.
    pub default_user: Option<String>,
    pub default_key_path: Option<PathBuf>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            port: 22,
            attempts: 3,
            retry_delay_secs: 30,
            connect_timeout_secs: 10,
            default_user: None,
            default_key_path: None,
        }
    }
}

/// The whole config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub klines: IngestOverrides,
    pub trades: IngestOverrides,
    pub api: ApiSettings,
    pub proxy: ProxySettings,
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).context(ReadSnafu { path })?;
        toml::from_str(&text).context(ParseSnafu { path })
    }

    pub fn klines_settings(&self) -> Result<IngestSettings, ConfigError> {
        self.klines
            .apply(IngestSettings::klines_preset())
            .with_env_overrides()
    }

    pub fn trades_settings(&self) -> Result<IngestSettings, ConfigError> {
        self.trades
            .apply(IngestSettings::trades_preset())
            .with_env_overrides()
    }
}

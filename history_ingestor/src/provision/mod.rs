//! Making proxy hosts ready before a chunk is fanned out.
//!
//! [`HostInventory`] answers "which machines should be proxies right now" and is
//! asked again on every refresh; [`ProxyProvisioner`] turns those machines into
//! endpoints that are known to be serving.

pub mod ssh;

use async_trait::async_trait;
use indexmap::IndexMap;
use snafu::Snafu;

use crate::models::{ProxyEndpoint, ProxyHost};

pub use ssh::{RemoteOutput, RemoteShell, SshProvisioner, SshShell};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProvisionError {
    #[snafu(display("`{command}` on {host} exited with {status:?}: {stderr}"))]
    Command {
        host: String,
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[snafu(display("cannot start ssh for {host}: {source}"))]
    Spawn {
        host: String,
        source: std::io::Error,
    },

    #[snafu(display("all {hosts} proxy hosts failed to provision"))]
    AllHostsFailed { hosts: usize },

    #[snafu(display("cannot list proxy hosts: {message}"))]
    Inventory { message: String },
}

#[async_trait]
pub trait HostInventory: Send + Sync {
    async fn list_hosts(&self) -> Result<Vec<ProxyHost>, ProvisionError>;
}

#[async_trait]
pub trait ProxyProvisioner: Send + Sync {
    /// Ensures every host runs the proxy service and returns the endpoints that do.
    ///
    /// Hosts that cannot be made ready are left out; an error is returned only
    /// when none of a non-empty host list could be.
    async fn ensure_proxies_ready(
        &self,
        hosts: &[ProxyHost],
    ) -> Result<Vec<ProxyEndpoint>, ProvisionError>;
}

/// A fixed host list, typically from the config file. Duplicate hosts are dropped.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    hosts: Vec<ProxyHost>,
}

impl StaticInventory {
    pub fn new(hosts: impl IntoIterator<Item = ProxyHost>) -> Self {
        let mut unique: IndexMap<String, ProxyHost> = IndexMap::new();
        for mut host in hosts {
            host.host = host.host.trim().to_string();
            if !host.host.is_empty() {
                unique.entry(host.host.clone()).or_insert(host);
            }
        }
        Self {
            hosts: unique.into_values().collect(),
        }
    }
}

#[async_trait]
impl HostInventory for StaticInventory {
    async fn list_hosts(&self) -> Result<Vec<ProxyHost>, ProvisionError> {
        Ok(self.hosts.clone())
    }
}

/// Trusts that the hosts already serve on `port`.
#[derive(Debug, Clone)]
pub struct StaticProvisioner {
    port: u16,
    credential_ref: Option<String>,
}

impl StaticProvisioner {
    pub fn new(port: u16, credential_ref: Option<String>) -> Self {
        Self {
            port,
            credential_ref,
        }
    }
}

pub(crate) fn endpoint_for(host: &ProxyHost, port: u16, credential_ref: &Option<String>) -> ProxyEndpoint {
    ProxyEndpoint {
        host: host.host.clone(),
        port,
        credential_ref: credential_ref.clone(),
    }
}

#[async_trait]
impl ProxyProvisioner for StaticProvisioner {
    async fn ensure_proxies_ready(
        &self,
        hosts: &[ProxyHost],
    ) -> Result<Vec<ProxyEndpoint>, ProvisionError> {
        Ok(hosts
            .iter()
            .map(|h| endpoint_for(h, self.port, &self.credential_ref))
            .collect())
    }
}

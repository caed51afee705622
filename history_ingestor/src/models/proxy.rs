use std::{
    fmt,
    hash::{Hash, Hasher},
    path::PathBuf,
};

use serde::{Deserialize, Serialize};

/// Default port the proxy service listens on.
pub const DEFAULT_PROXY_PORT: u16 = 8888;

/// An outbound HTTP proxy that fetches are routed through.
///
/// Identity is the host: two endpoints on the same host compare equal even if
/// their port or credentials differ.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,

    /// Name of the environment variable holding `user:password`, if the proxy
    /// requires authentication. Never the secret itself.
    #[serde(default)]
    pub credential_ref: Option<String>,
}

impl ProxyEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            credential_ref: None,
        }
    }

    pub fn with_credential_ref(mut self, env_name: impl Into<String>) -> Self {
        self.credential_ref = Some(env_name.into());
        self
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl PartialEq for ProxyEndpoint {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host
    }
}

impl Hash for ProxyEndpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host.hash(state);
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A candidate machine that should run the proxy service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyHost {
    pub host: String,

    /// Remote login used by the SSH provisioner.
    #[serde(default)]
    pub ssh_user: Option<String>,

    /// Private key used by the SSH provisioner.
    #[serde(default)]
    pub ssh_key_path: Option<PathBuf>,
}

impl ProxyHost {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ssh_user: None,
            ssh_key_path: None,
        }
    }
}

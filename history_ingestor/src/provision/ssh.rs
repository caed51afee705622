//! Provisioning proxy hosts over SSH.
//!
//! For every host: check that tinyproxy is installed, install and open it up
//! if not, then restart it. A host gets a bounded number of attempts; hosts
//! that never come up are dropped from the ready set.

use std::{num::NonZeroU32, path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::future::join_all;
use nonzero_ext::nonzero;
use snafu::ResultExt;
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::{
    config::SshSettings,
    models::{ProxyEndpoint, ProxyHost},
    provision::{
        AllHostsFailedSnafu, ProvisionError, ProxyProvisioner, SpawnSnafu, endpoint_for,
    },
};

pub const CHECK_INSTALLED: &str = "which tinyproxy";
pub const INSTALL_STEPS: [&str; 3] = [
    "sudo apt-get update -y",
    "sudo apt-get install -y tinyproxy",
    r#"echo "Allow 0.0.0.0/0" | sudo tee -a /etc/tinyproxy/tinyproxy.conf"#,
];
pub const RESTART: &str = "sudo systemctl restart tinyproxy";

/// ssh itself exits with 255 when it could not connect or authenticate.
const SSH_CONNECTION_FAILURE: i32 = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOutput {
    /// Exit code; `None` if the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RemoteOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs one command on a remote host.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    async fn run(&self, host: &ProxyHost, command: &str) -> Result<RemoteOutput, ProvisionError>;
}

/// [`RemoteShell`] backed by the system `ssh` client in batch mode.
#[derive(Debug, Clone)]
pub struct SshShell {
    port: u16,
    connect_timeout_secs: u64,
    default_user: Option<String>,
    default_key_path: Option<PathBuf>,
}

impl SshShell {
    pub fn new(settings: &SshSettings) -> Self {
        Self {
            port: settings.port,
            connect_timeout_secs: settings.connect_timeout_secs,
            default_user: settings.default_user.clone(),
            default_key_path: settings.default_key_path.clone(),
        }
    }

    fn command(&self, host: &ProxyHost, remote_command: &str) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.arg("-p")
            .arg(self.port.to_string())
            .args(["-o", "BatchMode=yes"])
            // first contact with a fresh host records its key instead of failing
            .args(["-o", "StrictHostKeyChecking=accept-new"])
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.connect_timeout_secs));

        if let Some(key) = host.ssh_key_path.as_ref().or(self.default_key_path.as_ref()) {
            cmd.arg("-i").arg(key);
        }

        let target = match host.ssh_user.as_ref().or(self.default_user.as_ref()) {
            Some(user) => format!("{user}@{}", host.host),
            None => host.host.clone(),
        };
        cmd.arg(target).arg(remote_command).kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn run(&self, host: &ProxyHost, command: &str) -> Result<RemoteOutput, ProvisionError> {
        let output = self
            .command(host, command)
            .output()
            .await
            .context(SpawnSnafu { host: &host.host })?;
        Ok(RemoteOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

pub struct SshProvisioner {
    shell: Arc<dyn RemoteShell>,
    attempts: NonZeroU32,
    retry_delay: Duration,
    proxy_port: u16,
    credential_ref: Option<String>,
}

impl SshProvisioner {
    pub fn new(settings: &SshSettings, proxy_port: u16, credential_ref: Option<String>) -> Self {
        Self {
            shell: Arc::new(SshShell::new(settings)),
            attempts: NonZeroU32::new(settings.attempts).unwrap_or(nonzero!(1u32)),
            retry_delay: Duration::from_secs(settings.retry_delay_secs),
            proxy_port,
            credential_ref,
        }
    }

    /// Replaces the transport, e.g. with a recording shell in tests.
    pub fn with_shell(mut self, shell: Arc<dyn RemoteShell>) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn run_checked(&self, host: &ProxyHost, command: &str) -> Result<(), ProvisionError> {
        let out = self.shell.run(host, command).await?;
        if out.success() {
            Ok(())
        } else {
            Err(command_failed(host, command, out))
        }
    }

    async fn prepare_once(&self, host: &ProxyHost) -> Result<(), ProvisionError> {
        let check = self.shell.run(host, CHECK_INSTALLED).await?;
        if check.status == Some(SSH_CONNECTION_FAILURE) {
            return Err(command_failed(host, CHECK_INSTALLED, check));
        }

        if !check.success() {
            info!(host = %host.host, "tinyproxy missing, installing");
            for step in INSTALL_STEPS {
                self.run_checked(host, step).await?;
            }
        }
        self.run_checked(host, RESTART).await
    }

    async fn prepare(&self, host: &ProxyHost) -> Result<ProxyEndpoint, ProvisionError> {
        let mut attempt = 1;
        loop {
            match self.prepare_once(host).await {
                Ok(()) => return Ok(endpoint_for(host, self.proxy_port, &self.credential_ref)),
                Err(e) if attempt < self.attempts.get() => {
                    warn!(
                        host = %host.host,
                        attempt,
                        error = %e,
                        "proxy host not ready, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn command_failed(host: &ProxyHost, command: &str, out: RemoteOutput) -> ProvisionError {
    ProvisionError::Command {
        host: host.host.clone(),
        command: command.to_string(),
        status: out.status,
        stderr: out.stderr.trim().to_string(),
    }
}

#[async_trait]
impl ProxyProvisioner for SshProvisioner {
    async fn ensure_proxies_ready(
        &self,
        hosts: &[ProxyHost],
    ) -> Result<Vec<ProxyEndpoint>, ProvisionError> {
        let results = join_all(hosts.iter().map(|h| self.prepare(h))).await;

        let mut ready = Vec::with_capacity(hosts.len());
        for (host, result) in hosts.iter().zip(results) {
            match result {
                Ok(endpoint) => ready.push(endpoint),
                Err(e) => error!(host = %host.host, error = %e, "dropping proxy host"),
            }
        }

        if ready.is_empty() && !hosts.is_empty() {
            return AllHostsFailedSnafu { hosts: hosts.len() }.fail();
        }
        info!(ready = ready.len(), total = hosts.len(), "proxy hosts ready");
        Ok(ready)
    }
}

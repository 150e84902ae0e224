//! SSH local-forward tunnel.
//!
//! Binds `127.0.0.1:0`, and forwards every accepted socket over a
//! `direct-tcpip` channel to the database host as seen from the SSH server.
//! The accept loop is owned by [`SshTunnel`] and aborted when it closes or
//! drops.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::Disconnect;
use russh_keys::key;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::config::{SshAuth, SshConfig};
use super::error::ConnectionError;

struct TunnelClient;

#[async_trait]
impl client::Handler for TunnelClient {
    type Error = russh::Error;

    // Host keys are not pinned; the credentials carry no known-hosts material.
    async fn check_server_key(
        &mut self,
        _server_public_key: &key::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

pub struct SshTunnel {
    local_addr: SocketAddr,
    session: Arc<Handle<TunnelClient>>,
    accept_task: JoinHandle<()>,
}

impl std::fmt::Debug for SshTunnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTunnel")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

async fn authenticate(
    ssh: &SshConfig,
    remote_host: &str,
) -> Result<Handle<TunnelClient>, ConnectionError> {
    let config = Arc::new(client::Config::default());
    let mut session = client::connect(config, (ssh.host.as_str(), ssh.port), TunnelClient)
        .await
        .map_err(|e| {
            ConnectionError::ssh(format!(
                "cannot reach SSH server {}:{}: {}",
                ssh.host, ssh.port, e
            ))
        })?;

    let accepted = match &ssh.auth {
        SshAuth::Password(password) => session
            .authenticate_password(ssh.user.as_str(), password.expose())
            .await
            .map_err(|e| ConnectionError::ssh(format!("SSH password authentication failed: {}", e)))?,
        SshAuth::PrivateKey { key, passphrase } => {
            let key_pair = russh_keys::decode_secret_key(
                key.expose(),
                passphrase.as_ref().map(|p| p.expose()),
            )
            .map_err(|e| ConnectionError::ssh(format!("cannot decode SSH private key: {}", e)))?;
            session
                .authenticate_publickey(ssh.user.as_str(), Arc::new(key_pair))
                .await
                .map_err(|e| ConnectionError::ssh(format!("SSH key authentication failed: {}", e)))?
        }
    };

    if !accepted {
        return Err(ConnectionError::ssh(format!(
            "SSH server {} rejected {} authentication for user '{}'",
            ssh.host,
            ssh.auth.method(),
            ssh.user
        )));
    }

    debug!(
        ssh_host = %ssh.host,
        remote_host = %remote_host,
        remote_port = ssh.mysql_port,
        "SSH session authenticated"
    );
    Ok(session)
}

impl SshTunnel {
    /// Authenticate to the SSH server and start forwarding to `remote_host:ssh.mysql_port`.
    pub async fn open(ssh: &SshConfig, remote_host: &str) -> Result<Self, ConnectionError> {
        let session = timeout(ssh.timeout, authenticate(ssh, remote_host))
            .await
            .map_err(|_| {
                ConnectionError::ssh(format!(
                    "SSH setup with {}:{} timed out after {}ms",
                    ssh.host,
                    ssh.port,
                    ssh.timeout.as_millis()
                ))
            })??;
        let session = Arc::new(session);

        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(|e| ConnectionError::ssh(format!("cannot bind local tunnel port: {}", e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ConnectionError::ssh(format!("cannot read local tunnel port: {}", e)))?;

        let accept_task = tokio::spawn(forward_loop(
            listener,
            Arc::clone(&session),
            remote_host.to_string(),
            ssh.mysql_port,
        ));

        info!(
            ssh_host = %ssh.host,
            local_port = local_addr.port(),
            "SSH tunnel established"
        );

        Ok(Self {
            local_addr,
            session,
            accept_task,
        })
    }

    pub fn local_port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Stop accepting, then disconnect the SSH session.
    pub async fn close(self) {
        self.accept_task.abort();
        if let Err(e) = self
            .session
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            debug!(error = %e, "SSH disconnect failed");
        }
    }
}

impl Drop for SshTunnel {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn forward_loop(
    listener: TcpListener,
    session: Arc<Handle<TunnelClient>>,
    remote_host: String,
    remote_port: u16,
) {
    loop {
        let (mut socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "tunnel accept failed");
                return;
            }
        };

        let channel = match session
            .channel_open_direct_tcpip(
                remote_host.as_str(),
                u32::from(remote_port),
                peer.ip().to_string(),
                u32::from(peer.port()),
            )
            .await
        {
            Ok(channel) => channel,
            Err(e) => {
                warn!(error = %e, remote_host = %remote_host, "direct-tcpip channel refused");
                continue;
            }
        };

        tokio::spawn(async move {
            let mut stream = channel.into_stream();
            if let Err(e) = tokio::io::copy_bidirectional(&mut socket, &mut stream).await {
                debug!(error = %e, "tunnel stream closed");
            }
        });
    }
}

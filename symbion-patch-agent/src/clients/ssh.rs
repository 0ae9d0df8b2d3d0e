//! SSH command execution on guest hosts
//!
//! libssh2 is blocking, so every session runs inside `spawn_blocking`.
//! Host keys are accepted without verification: freshly booted guests are
//! reached by FQDN and their keys are not tracked by the agent.

use async_trait::async_trait;
use ssh2::Session;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{CommandOutput, RemoteExecutor};
use crate::error::RemoteError;

/// Upper bound for a single remote command (package upgrades can be slow)
const REMOTE_COMMAND_TIMEOUT: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct SshConfig {
    pub user: String,
    pub key_file: PathBuf,
    pub port: u16,
    pub connect_timeout: Duration,
}

/// `RemoteExecutor` backed by libssh2 with public-key authentication
#[derive(Clone)]
pub struct SshExecutor {
    config: Arc<SshConfig>,
}

impl SshExecutor {
    pub fn new(config: SshConfig) -> Self {
        Self { config: Arc::new(config) }
    }

    /// Handshake and authentication are bounded by `connect_timeout`
    fn connect(config: &SshConfig, host: &str) -> Result<Connection, RemoteError> {
        let connect_err = |reason: String| RemoteError::Connect { host: host.to_string(), reason };

        let address = (host, config.port)
            .to_socket_addrs()
            .map_err(|e| connect_err(format!("failed to resolve: {}", e)))?
            .next()
            .ok_or_else(|| connect_err("no address resolved".to_string()))?;

        let stream = TcpStream::connect_timeout(&address, config.connect_timeout)
            .map_err(|e| connect_err(format!("TCP connect failed: {}", e)))?;
        set_socket_timeout(&stream, config.connect_timeout)
            .map_err(|e| connect_err(format!("failed to configure socket: {}", e)))?;
        let control = stream
            .try_clone()
            .map_err(|e| connect_err(format!("failed to configure socket: {}", e)))?;

        let mut session = Session::new().map_err(|e| connect_err(e.to_string()))?;
        session.set_timeout(millis(config.connect_timeout));
        session.set_tcp_stream(stream);
        session
            .handshake()
            .map_err(|e| connect_err(format!("handshake failed: {}", e)))?;
        session
            .userauth_pubkey_file(&config.user, None, &config.key_file, None)
            .map_err(|e| connect_err(format!("public key authentication failed: {}", e)))?;

        if !session.authenticated() {
            return Err(connect_err("session not authenticated".to_string()));
        }
        Ok(Connection { session, stream: control })
    }

    fn run_blocking(
        config: &SshConfig,
        host: &str,
        command: &str,
    ) -> Result<CommandOutput, RemoteError> {
        let Connection { session, stream } = Self::connect(config, host)?;
        let channel_err = |reason: String| RemoteError::Channel { host: host.to_string(), reason };

        session.set_timeout(millis(REMOTE_COMMAND_TIMEOUT));
        set_socket_timeout(&stream, REMOTE_COMMAND_TIMEOUT)
            .map_err(|e| channel_err(format!("failed to configure socket: {}", e)))?;

        let mut channel = session
            .channel_session()
            .map_err(|e| channel_err(format!("failed to open channel: {}", e)))?;
        channel
            .exec(command)
            .map_err(|e| channel_err(format!("failed to execute command: {}", e)))?;

        let mut stdout = Vec::new();
        channel
            .read_to_end(&mut stdout)
            .map_err(|e| channel_err(format!("failed to read stdout: {}", e)))?;
        let mut stderr = Vec::new();
        channel
            .stderr()
            .read_to_end(&mut stderr)
            .map_err(|e| channel_err(format!("failed to read stderr: {}", e)))?;

        channel
            .wait_close()
            .map_err(|e| channel_err(format!("failed to close channel: {}", e)))?;
        let exit_status = channel
            .exit_status()
            .map_err(|e| channel_err(format!("failed to read exit status: {}", e)))?;

        let _ = session.disconnect(None, "command complete", None);

        Ok(CommandOutput {
            exit_status,
            stdout: decode_output(&stdout),
            stderr: decode_output(&stderr),
        })
    }
}

struct Connection {
    session: Session,
    // second handle on the session socket, used to adjust its timeouts
    stream: TcpStream,
}

fn set_socket_timeout(stream: &TcpStream, timeout: Duration) -> std::io::Result<()> {
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))
}

/// libssh2 timeout in milliseconds, saturating
fn millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

/// Package manager output is not guaranteed to be UTF-8
fn decode_output(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn probe(&self, host: &str) -> Result<(), RemoteError> {
        let config = self.config.clone();
        let target = host.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), RemoteError> {
            let connection = Self::connect(&config, &target)?;
            let _ = connection.session.disconnect(None, "probe", None);
            Ok(())
        })
        .await
        .map_err(|e| RemoteError::Connect {
            host: host.to_string(),
            reason: e.to_string(),
        })?
    }

    async fn run(&self, host: &str, command: &str) -> Result<CommandOutput, RemoteError> {
        info!("Executing on {}: {}", host, command);
        let config = self.config.clone();
        let target = host.to_string();
        let command = command.to_string();
        let output =
            tokio::task::spawn_blocking(move || Self::run_blocking(&config, &target, &command))
                .await
                .map_err(|e| RemoteError::Channel {
                    host: host.to_string(),
                    reason: e.to_string(),
                })??;

        debug!(
            "Command on {} exited with {} ({} bytes stdout, {} bytes stderr)",
            host,
            output.exit_status,
            output.stdout.len(),
            output.stderr.len()
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_output_replaces_invalid_utf8() {
        let bytes = b"Upgraded:\n  caf\xe9-1.0\nComplete!\n";
        let decoded = decode_output(bytes);
        assert!(decoded.starts_with("Upgraded:\n"));
        assert!(decoded.contains('\u{FFFD}'));
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_secs(30)), 30_000);
        assert_eq!(millis(Duration::from_secs(u64::MAX)), u32::MAX);
    }

    #[tokio::test]
    async fn test_silent_server_is_bounded_by_connect_timeout() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        // accept and never send a banner
        let _server = std::thread::spawn(move || {
            let held: Vec<_> = listener.incoming().take(1).collect();
            std::thread::sleep(Duration::from_secs(10));
            drop(held);
        });

        let executor = SshExecutor::new(SshConfig {
            user: "patch".to_string(),
            key_file: PathBuf::from("/nonexistent/id_ed25519"),
            port,
            connect_timeout: Duration::from_secs(1),
        });
        let result =
            tokio::time::timeout(Duration::from_secs(8), executor.probe("127.0.0.1")).await;
        assert!(matches!(result, Ok(Err(RemoteError::Connect { .. }))));
    }
}

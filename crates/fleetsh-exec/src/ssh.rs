//! SSH command execution using russh crate

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use russh::keys::ssh_key;
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key};
use russh::{ChannelMsg, Disconnect, Sig, client};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::chunk::Utf8Chunker;
use crate::command::Command;
use crate::connection::ConnectionInfo;
use crate::error::ExecError;
use crate::traits::RemoteExecutor;

/// SSH client handler for russh
#[derive(Debug)]
struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Accept all server keys (like StrictHostKeyChecking=no)
        Ok(true)
    }
}

/// SSH command executor
///
/// Owns one SSH session to one host, opened on first use. Commands run one
/// at a time on that session.
pub struct SshExecutor {
    /// Connection configuration
    conn_info: ConnectionInfo,
    /// SSH session (initialized on first use)
    session: Mutex<Option<client::Handle<SshClientHandler>>>,
}

impl std::fmt::Debug for SshExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshExecutor")
            .field("conn_info", &self.conn_info)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl SshExecutor {
    /// Create a new SSH executor
    ///
    /// No connection is made until the first command runs.
    ///
    /// # Errors
    /// Returns `ExecError::ConfigError` when neither a key nor a password is
    /// given, and `ExecError::SshKeyError` when a key file does not exist
    pub fn new(conn_info: ConnectionInfo) -> Result<Self, ExecError> {
        if conn_info.keys.is_empty() && conn_info.password.is_none() {
            return Err(ExecError::ConfigError(format!(
                "no key or password configured for {}",
                conn_info.host
            )));
        }

        if let Some(missing) = conn_info.keys.iter().find(|k| !k.exists()) {
            return Err(ExecError::SshKeyError(format!(
                "key file not found: {}",
                missing.display()
            )));
        }

        Ok(Self {
            conn_info,
            session: Mutex::new(None),
        })
    }

    /// Get connection info
    pub fn connection_info(&self) -> &ConnectionInfo {
        &self.conn_info
    }

    /// Connect and authenticate, reusing an open session
    #[instrument(skip(self), fields(host = %self.conn_info.host))]
    async fn connect(&self) -> Result<(), ExecError> {
        let mut session_lock = self.session.lock().await;

        if session_lock.is_some() {
            return Ok(());
        }

        info!(
            host = %self.conn_info.host,
            port = self.conn_info.port,
            user = %self.conn_info.user,
            "connecting to SSH"
        );

        let config = Arc::new(client::Config::default());

        let mut session = client::connect(
            config,
            (&self.conn_info.host[..], self.conn_info.port),
            SshClientHandler,
        )
        .await
        .map_err(|e| ExecError::ConnectionFailed(e.to_string()))?;

        if !self.authenticate(&mut session).await? {
            return Err(ExecError::AuthenticationFailed(format!(
                "all methods rejected for {}@{}",
                self.conn_info.user, self.conn_info.host
            )));
        }

        info!(host = %self.conn_info.host, "SSH connected and authenticated");

        *session_lock = Some(session);
        Ok(())
    }

    /// Try each key in order, then the password
    async fn authenticate(
        &self,
        session: &mut client::Handle<SshClientHandler>,
    ) -> Result<bool, ExecError> {
        for key_path in &self.conn_info.keys {
            let key_pair = load_secret_key(key_path, None)
                .map_err(|e| ExecError::SshKeyError(e.to_string()))?;

            let hash_alg = session
                .best_supported_rsa_hash()
                .await
                .ok()
                .flatten()
                .flatten();

            let auth_res = session
                .authenticate_publickey(
                    &self.conn_info.user,
                    PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg),
                )
                .await
                .map_err(|e| ExecError::AuthenticationFailed(e.to_string()))?;

            if auth_res.success() {
                return Ok(true);
            }
            warn!(key = %key_path.display(), "public key rejected");
        }

        if let Some(password) = &self.conn_info.password {
            let auth_res = session
                .authenticate_password(&self.conn_info.user, password)
                .await
                .map_err(|e| ExecError::AuthenticationFailed(e.to_string()))?;
            return Ok(auth_res.success());
        }

        Ok(false)
    }

    /// Execute command on the open session, streaming into `command`
    #[instrument(skip_all, fields(host = %self.conn_info.host))]
    async fn execute_remote(&self, command: &mut Command) -> Result<(), ExecError> {
        let mut session_lock = self.session.lock().await;

        let session = session_lock.as_mut().ok_or(ExecError::NotConnected)?;

        let cmd = command.prepared_command();
        debug!(command = %cmd, "executing remote command");

        let start = Instant::now();

        let opened = session.channel_open_session().await;
        let mut channel = forget_session_on_error(&mut *session_lock, opened)?;

        let started = channel.exec(true, cmd.as_str()).await;
        forget_session_on_error(&mut *session_lock, started)?;

        let mut stdout = Utf8Chunker::new();
        let mut stderr = Utf8Chunker::new();

        // Exit status may arrive after EOF, so drain until the channel closes
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => {
                    if let Some(text) = stdout.push(&data) {
                        command.handle_data(text);
                    }
                }
                ChannelMsg::ExtendedData { data, ext } => {
                    if ext == 1
                        && let Some(text) = stderr.push(&data)
                    {
                        command.handle_stderr(text);
                    }
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    command.handle_status(exit_status.cast_signed());
                }
                ChannelMsg::ExitSignal { signal_name, .. } => {
                    command.handle_signal(sig_name(&signal_name));
                }
                _ => {}
            }
        }

        if let Some(text) = stdout.finish() {
            command.handle_data(text);
        }
        if let Some(text) = stderr.finish() {
            command.handle_stderr(text);
        }

        debug!(
            command = %cmd,
            status = ?command.exit_status(),
            signal = ?command.signal(),
            duration = ?start.elapsed(),
            "remote command completed"
        );

        Ok(())
    }
}

fn sig_name(sig: &Sig) -> String {
    match sig {
        Sig::Custom(name) => name.clone(),
        other => format!("SIG{other:?}"),
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    #[instrument(skip_all, fields(host = %self.conn_info.host))]
    async fn execute(&self, command: &mut Command) -> Result<(), ExecError> {
        self.connect().await?;
        self.execute_remote(command).await
    }

    #[instrument(skip_all, fields(host = %self.conn_info.host))]
    async fn execute_with_timeout(
        &self,
        command: &mut Command,
        timeout_duration: Duration,
    ) -> Result<(), ExecError> {
        let start = Instant::now();

        debug!(command = %command.raw_command(), timeout = ?timeout_duration, "executing with timeout");

        // Ensure connection first (outside of timeout)
        self.connect().await?;

        let result = timeout(timeout_duration, self.execute_remote(command)).await;

        match result {
            Ok(result) => result,
            Err(_) => {
                error!(
                    command = %command.raw_command(),
                    timeout = ?timeout_duration,
                    elapsed = ?start.elapsed(),
                    "command timed out"
                );
                Err(ExecError::Timeout {
                    timeout: timeout_duration,
                })
            }
        }
    }

    fn is_connected(&self) -> bool {
        // Only a best-effort check while a command holds the lock
        self.session
            .try_lock()
            .map(|s| s.is_some())
            .unwrap_or(false)
    }

    fn executor_type(&self) -> &'static str {
        "ssh"
    }

    async fn disconnect(&self) -> Result<(), ExecError> {
        let mut session_lock = self.session.lock().await;

        if let Some(session) = session_lock.take() {
            session
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
                .map_err(|e| ExecError::IoError(e.to_string()))?;
            info!(host = %self.conn_info.host, "SSH disconnected");
        }
        Ok(())
    }
}

/// Map a channel failure, dropping the session so the next command reconnects
fn forget_session_on_error<S, T, E: std::fmt::Display>(
    session: &mut Option<S>,
    result: Result<T, E>,
) -> Result<T, ExecError> {
    result.map_err(|e| {
        if session.take().is_some() {
            warn!(error = %e, "channel failed, dropping SSH session");
        }
        ExecError::IoError(e.to_string())
    })
}

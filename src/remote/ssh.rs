//! SSH transport built on `russh`.
//!
//! Login answers the two challenges a vendor shell presents on connect:
//! an unknown host key is accepted (and learned into `known_hosts` when one
//! is configured), and the password is supplied either through plain
//! password authentication or as the answer to a keyboard-interactive
//! password prompt. Any other challenge is a protocol error.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle, KeyboardInteractiveAuthResponse, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;
use tracing::{debug, info, warn};

use super::{BoxFuture, ConsoleChannel, Credentials, RemoteCommand, RemoteExecutor};
use crate::config::RemoteConfig;
use crate::{AppError, Result};

/// Keyboard-interactive rounds answered before giving up.
const MAX_CHALLENGE_ROUNDS: usize = 3;

/// Terminal geometry requested for every channel.
const PTY_COLUMNS: u32 = 200;
const PTY_ROWS: u32 = 50;

/// Host key check performed during the SSH handshake.
pub struct HostKeyPolicy {
    host: String,
    port: u16,
    known_hosts: Option<PathBuf>,
}

#[async_trait]
impl client::Handler for HostKeyPolicy {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let Some(path) = &self.known_hosts else {
            debug!(host = %self.host, "no known_hosts configured, accepting host key");
            return Ok(true);
        };

        match russh_keys::check_known_hosts_path(&self.host, self.port, server_public_key, path) {
            Ok(true) => Ok(true),
            Ok(false) => {
                info!(
                    host = %self.host,
                    fingerprint = %server_public_key.fingerprint(),
                    "unknown host key, recording it"
                );
                if let Err(err) = russh_keys::learn_known_hosts_path(
                    &self.host,
                    self.port,
                    server_public_key,
                    path,
                ) {
                    warn!(host = %self.host, %err, "failed to record host key");
                }
                Ok(true)
            }
            Err(err) => {
                warn!(host = %self.host, %err, "host key does not match known_hosts");
                Ok(false)
            }
        }
    }
}

/// Password-authenticated SSH sessions to nPars and the provisioning server.
#[derive(Debug, Clone)]
pub struct SshSession {
    credentials: Credentials,
    port: u16,
    login_timeout: Duration,
    command_timeout: Duration,
    known_hosts: Option<PathBuf>,
}

impl SshSession {
    /// Build a session factory from the remote configuration.
    #[must_use]
    pub fn from_config(config: &RemoteConfig) -> Self {
        Self {
            credentials: config.credentials(),
            port: config.port,
            login_timeout: config.ssh_timeout(),
            command_timeout: config.command_timeout(),
            known_hosts: config.known_hosts.clone(),
        }
    }

    async fn connect(&self, target: &str) -> Result<Handle<HostKeyPolicy>> {
        let handler = HostKeyPolicy {
            host: target.to_owned(),
            port: self.port,
            known_hosts: self.known_hosts.clone(),
        };
        let config = Arc::new(client::Config::default());

        let login = async {
            let mut handle = client::connect(config, (target, self.port), handler).await?;
            self.authenticate(&mut handle).await?;
            Ok::<_, AppError>(handle)
        };

        tokio::time::timeout(self.login_timeout, login)
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "login to {target} not completed within {:?}",
                    self.login_timeout
                ))
            })?
    }

    async fn authenticate(&self, handle: &mut Handle<HostKeyPolicy>) -> Result<()> {
        let user = self.credentials.username.clone();
        if handle
            .authenticate_password(user.clone(), self.credentials.password.clone())
            .await?
        {
            return Ok(());
        }

        debug!(user, "password auth refused, trying keyboard-interactive");
        let mut response = handle
            .authenticate_keyboard_interactive_start(user, None::<String>)
            .await?;

        for _ in 0..MAX_CHALLENGE_ROUNDS {
            match response {
                KeyboardInteractiveAuthResponse::Success => return Ok(()),
                KeyboardInteractiveAuthResponse::Failure => {
                    return Err(AppError::Protocol("authentication rejected".into()));
                }
                KeyboardInteractiveAuthResponse::InfoRequest { prompts, .. } => {
                    let answers = prompts
                        .iter()
                        .map(|p| answer_challenge(&p.prompt, &self.credentials.password))
                        .collect::<Result<Vec<_>>>()?;
                    response = handle
                        .authenticate_keyboard_interactive_respond(answers)
                        .await?;
                }
            }
        }

        Err(AppError::Protocol(format!(
            "authentication still challenged after {MAX_CHALLENGE_ROUNDS} rounds"
        )))
    }

    async fn run(&self, command: &RemoteCommand) -> Result<String> {
        let handle = self.connect(&command.target).await?;
        let outcome = self.collect_output(&handle, command).await;
        if let Err(err) = handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            debug!(host = %command.target, %err, "disconnect after command failed");
        }
        outcome
    }

    async fn collect_output(
        &self,
        handle: &Handle<HostKeyPolicy>,
        command: &RemoteCommand,
    ) -> Result<String> {
        let mut channel = handle.channel_open_session().await?;
        channel
            .request_pty(false, "vt100", PTY_COLUMNS, PTY_ROWS, 0, 0, &[])
            .await?;
        channel.exec(true, command.command.as_bytes()).await?;

        let read = async {
            let mut output = Vec::new();
            let mut finished = false;
            loop {
                match channel.wait().await {
                    Some(ChannelMsg::Data { data } | ChannelMsg::ExtendedData { data, .. }) => {
                        output.extend_from_slice(&data);
                    }
                    Some(ChannelMsg::ExitStatus { exit_status }) => {
                        debug!(host = %command.target, exit_status, "remote command exited");
                        finished = true;
                    }
                    Some(ChannelMsg::Eof) => finished = true,
                    Some(ChannelMsg::Close) | None => break,
                    Some(_) => {}
                }
            }
            if finished {
                Ok(output)
            } else {
                Err(AppError::Connectivity(format!(
                    "channel to {} closed before the command finished",
                    command.target
                )))
            }
        };

        let output = tokio::time::timeout(self.command_timeout, read)
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "command on {} did not finish within {:?}",
                    command.target, self.command_timeout
                ))
            })??;

        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    async fn open_shell(&self, target: &str) -> Result<Box<dyn ConsoleChannel>> {
        let handle = self.connect(target).await?;
        let mut channel = handle.channel_open_session().await?;
        channel
            .request_pty(false, "vt100", PTY_COLUMNS, PTY_ROWS, 0, 0, &[])
            .await?;
        channel.request_shell(true).await?;
        info!(host = target, "interactive shell opened");
        Ok(Box::new(SshConsole {
            target: target.to_owned(),
            handle,
            channel,
            closed: false,
        }))
    }
}

impl RemoteExecutor for SshSession {
    fn exec<'a>(&'a self, command: &'a RemoteCommand) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.run(command))
    }

    fn open_console<'a>(
        &'a self,
        target: &'a str,
    ) -> BoxFuture<'a, Result<Box<dyn ConsoleChannel>>> {
        Box::pin(self.open_shell(target))
    }
}

/// Interactive shell channel over an authenticated SSH session.
struct SshConsole {
    target: String,
    handle: Handle<HostKeyPolicy>,
    channel: Channel<Msg>,
    closed: bool,
}

impl ConsoleChannel for SshConsole {
    fn send<'a>(&'a mut self, data: &'a [u8]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.channel.data(data).await.map_err(|err| {
                AppError::Connectivity(format!("write to {} failed: {err}", self.target))
            })
        })
    }

    fn recv(&mut self) -> BoxFuture<'_, Result<Option<Vec<u8>>>> {
        Box::pin(async move {
            loop {
                match self.channel.wait().await {
                    Some(ChannelMsg::Data { data } | ChannelMsg::ExtendedData { data, .. }) => {
                        return Ok(Some(data.to_vec()));
                    }
                    Some(ChannelMsg::Eof | ChannelMsg::Close) | None => return Ok(None),
                    Some(_) => {}
                }
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.closed {
                return Ok(());
            }
            self.closed = true;
            if let Err(err) = self.channel.close().await {
                debug!(host = %self.target, %err, "channel close failed");
            }
            self.handle
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
                .map_err(AppError::from)
        })
    }
}

/// Answer one keyboard-interactive prompt; only password prompts are known.
fn answer_challenge(prompt: &str, password: &str) -> Result<String> {
    if prompt.to_ascii_lowercase().contains("password") {
        Ok(password.to_owned())
    } else {
        Err(AppError::Protocol(format!(
            "unrecognized challenge: {}",
            prompt.trim()
        )))
    }
}

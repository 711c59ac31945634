//! Remote command transport.
//!
//! Everything that talks to an nPar or to the provisioning server goes
//! through [`RemoteExecutor`]: single-shot commands via
//! [`exec`](RemoteExecutor::exec) and interactive console sessions via
//! [`open_console`](RemoteExecutor::open_console). The production
//! implementation is [`ssh::SshSession`]; tests substitute scripted fakes.

pub mod console;
pub mod expect;
pub mod ssh;

use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::Result;

/// Boxed future returned by the transport traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Login credentials for a remote shell.
///
/// `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login user.
    pub username: String,
    /// Login password.
    pub password: String,
}

impl Credentials {
    /// Build credentials from a user and password.
    #[must_use]
    pub fn new(username: String, password: String) -> Self {
        Self { username, password }
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One command line to run on one remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    /// Host address of the nPar or provisioning server.
    pub target: String,
    /// Shell command line.
    pub command: String,
}

impl RemoteCommand {
    /// Build a command for `target`.
    #[must_use]
    pub fn new(target: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            command: command.into(),
        }
    }
}

/// Executes vendor CLI commands on remote hosts.
pub trait RemoteExecutor: Send + Sync {
    /// Run `command` to completion and return everything it printed.
    ///
    /// # Errors
    ///
    /// - `AppError::Connectivity` if the channel cannot be opened or ends
    ///   before the remote process exits.
    /// - `AppError::Timeout` if login or the command exceeds its bound.
    /// - `AppError::Protocol` on rejected authentication, an unrecognized
    ///   challenge, or a changed host key.
    fn exec<'a>(&'a self, command: &'a RemoteCommand) -> BoxFuture<'a, Result<String>>;

    /// Log in to `target` and return an interactive shell channel.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`exec`](Self::exec).
    fn open_console<'a>(&'a self, target: &'a str)
        -> BoxFuture<'a, Result<Box<dyn ConsoleChannel>>>;
}

/// Raw byte channel of an interactive shell.
pub trait ConsoleChannel: Send {
    /// Write bytes to the remote terminal.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Connectivity` if the channel is gone.
    fn send<'a>(&'a mut self, data: &'a [u8]) -> BoxFuture<'a, Result<()>>;

    /// Wait for the next chunk of terminal output; `None` once the channel
    /// has closed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Connectivity` on transport failure.
    fn recv(&mut self) -> BoxFuture<'_, Result<Option<Vec<u8>>>>;

    /// Close the channel and the session behind it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Connectivity` if the close handshake fails.
    fn close(&mut self) -> BoxFuture<'_, Result<()>>;
}

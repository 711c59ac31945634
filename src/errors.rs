//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// Remote channel could not be opened or ended unexpectedly.
    Connectivity(String),
    /// An expected prompt or output did not appear within its bound.
    Timeout(String),
    /// Unrecognized challenge, prompt sequence, or host key.
    Protocol(String),
    /// No node satisfies a placement request, or no such partition.
    NotFound(String),
    /// Remote command ran but its expected acknowledgement is missing.
    RemoteCommand(String),
    /// A request was rejected before any remote work started.
    InvalidRequest(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// Prefix the message with the provisioning step that failed while
    /// keeping the variant intact.
    #[must_use]
    pub fn at_step(self, step: &str) -> Self {
        match self {
            Self::Config(msg) => Self::Config(format!("{step}: {msg}")),
            Self::Db(msg) => Self::Db(format!("{step}: {msg}")),
            Self::Connectivity(msg) => Self::Connectivity(format!("{step}: {msg}")),
            Self::Timeout(msg) => Self::Timeout(format!("{step}: {msg}")),
            Self::Protocol(msg) => Self::Protocol(format!("{step}: {msg}")),
            Self::NotFound(msg) => Self::NotFound(format!("{step}: {msg}")),
            Self::RemoteCommand(msg) => Self::RemoteCommand(format!("{step}: {msg}")),
            Self::InvalidRequest(msg) => Self::InvalidRequest(format!("{step}: {msg}")),
            Self::Io(msg) => Self::Io(format!("{step}: {msg}")),
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Connectivity(msg) => write!(f, "connectivity: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::RemoteCommand(msg) => write!(f, "remote command: {msg}"),
            Self::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<russh::Error> for AppError {
    fn from(err: russh::Error) -> Self {
        match err {
            russh::Error::Disconnect
            | russh::Error::HUP
            | russh::Error::ConnectionTimeout
            | russh::Error::IO(_) => Self::Connectivity(err.to_string()),
            russh::Error::UnknownKey
            | russh::Error::WrongServerSig
            | russh::Error::NotAuthenticated => Self::Protocol(err.to_string()),
            other => Self::Connectivity(other.to_string()),
        }
    }
}

//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::remote::Credentials;
use crate::{AppError, Result};

/// Keychain service name used for the remote SSH password.
pub const KEYRING_SERVICE: &str = "vpar-control";

/// Environment variable consulted when the keychain has no password.
pub const PASSWORD_ENV: &str = "VPAR_REMOTE_PASSWORD";

/// SSH connectivity and timeout settings shared by every remote call.
///
/// The password is loaded at runtime via OS keychain or environment
/// variable, never from the TOML file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RemoteConfig {
    /// Login user on nPars and on the provisioning server.
    #[serde(default = "default_username")]
    pub username: String,
    /// Password for `username` (populated at runtime).
    #[serde(skip)]
    pub password: String,
    /// SSH port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bound on connect, authentication and every console prompt wait.
    #[serde(default = "default_ssh_timeout")]
    pub ssh_timeout_seconds: u64,
    /// Bound on a single-shot command from start to exit.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,
    /// Bound on the final `lanboot` step of a network boot.
    #[serde(default = "default_lanboot_timeout")]
    pub lanboot_timeout_seconds: u64,
    /// Optional `known_hosts` file; unknown keys are learned into it.
    #[serde(default)]
    pub known_hosts: Option<PathBuf>,
    /// Regex matching a shell or firmware prompt at the end of output.
    #[serde(default = "default_prompt_pattern")]
    pub prompt_pattern: String,
}

fn default_username() -> String {
    "root".into()
}

fn default_port() -> u16 {
    22
}

fn default_ssh_timeout() -> u64 {
    20
}

fn default_command_timeout() -> u64 {
    600
}

fn default_lanboot_timeout() -> u64 {
    1200
}

fn default_prompt_pattern() -> String {
    r"[$#>]\s*$".into()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            password: String::new(),
            port: default_port(),
            ssh_timeout_seconds: default_ssh_timeout(),
            command_timeout_seconds: default_command_timeout(),
            lanboot_timeout_seconds: default_lanboot_timeout(),
            known_hosts: None,
            prompt_pattern: default_prompt_pattern(),
        }
    }
}

impl RemoteConfig {
    /// Login credentials for remote sessions.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }

    /// Per-step prompt timeout.
    #[must_use]
    pub fn ssh_timeout(&self) -> Duration {
        Duration::from_secs(self.ssh_timeout_seconds)
    }

    /// Whole-command timeout for single-shot execution.
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds)
    }

    /// Timeout for the final network boot step.
    #[must_use]
    pub fn lanboot_timeout(&self) -> Duration {
        Duration::from_secs(self.lanboot_timeout_seconds)
    }
}

/// Volume group and network names used on every nPar.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct NparConfig {
    /// Volume group used for partition logical volumes.
    #[serde(default = "default_vg_name")]
    pub vg_name: String,
    /// vswitch carrying the management network.
    #[serde(default = "default_management_network")]
    pub management_network: String,
    /// vswitch carrying the production network.
    #[serde(default = "default_production_network")]
    pub production_network: String,
    /// Orchestrator network label whose fixed IPv4 address becomes the
    /// management IP.
    #[serde(default = "default_network_label")]
    pub network_label: String,
    /// Fixed wait after a forced power off.
    #[serde(default = "default_power_off_grace")]
    pub power_off_grace_seconds: u64,
}

fn default_vg_name() -> String {
    "/dev/vg00".into()
}

fn default_management_network() -> String {
    "sitelan".into()
}

fn default_production_network() -> String {
    "localnet".into()
}

fn default_network_label() -> String {
    "hpux".into()
}

fn default_power_off_grace() -> u64 {
    10
}

impl Default for NparConfig {
    fn default() -> Self {
        Self {
            vg_name: default_vg_name(),
            management_network: default_management_network(),
            production_network: default_production_network(),
            network_label: default_network_label(),
            power_off_grace_seconds: default_power_off_grace(),
        }
    }
}

impl NparConfig {
    /// Grace period after `vparreset`.
    #[must_use]
    pub fn power_off_grace(&self) -> Duration {
        Duration::from_secs(self.power_off_grace_seconds)
    }
}

/// Provisioning (Ignite) server layout and client config template values.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct IgniteConfig {
    /// Address of the provisioning server.
    pub address: String,
    /// Network boot loader path served to clients.
    #[serde(default = "default_boot_file")]
    pub boot_file: String,
    /// Boot table appended to for each partition.
    #[serde(default = "default_bootptab")]
    pub bootptab: String,
    /// Directory holding one sub-directory per client MAC.
    #[serde(default = "default_clients_dir")]
    pub clients_dir: String,
    /// Keyboard layout written into the client config.
    #[serde(default = "default_keyboard")]
    pub keyboard: String,
    /// Crypted root password written into the client config.
    pub root_password_hash: String,
    /// Root disk hardware path written into the client config.
    #[serde(default = "default_root_disk")]
    pub root_disk: String,
    /// Firmware boot profile name used by `dbprofile` and `lanboot`.
    #[serde(default = "default_profile_name")]
    pub profile_name: String,
}

fn default_boot_file() -> String {
    "/opt/ignite/boot/Rel_B.11.31/nbp.efi".into()
}

fn default_bootptab() -> String {
    "/etc/bootptab".into()
}

fn default_clients_dir() -> String {
    "/var/opt/ignite/clients".into()
}

fn default_keyboard() -> String {
    "USB_PS2_DIN_US_English".into()
}

fn default_root_disk() -> String {
    "0/0/0/0.0x0.0x0".into()
}

fn default_profile_name() -> String {
    "profile-test".into()
}

/// Resource monitor settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct MonitorConfig {
    /// Interval between background refreshes.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_seconds: u64,
}

fn default_refresh_interval() -> u64 {
    60
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh_interval_seconds: default_refresh_interval(),
        }
    }
}

impl MonitorConfig {
    /// Interval between background refreshes.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_seconds)
    }
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// `SQLite` file holding the node resource and placement tables.
    pub db_path: PathBuf,
    /// SSH settings.
    #[serde(default)]
    pub remote: RemoteConfig,
    /// nPar-side names.
    #[serde(default)]
    pub npar: NparConfig,
    /// Provisioning server settings.
    pub ignite: IgniteConfig,
    /// Resource monitor settings.
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the SSH password from OS keychain with env-var fallback.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if neither keychain nor env var provide
    /// the password.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.remote.password = load_credential(&self.remote.username, PASSWORD_ENV).await?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.remote.username.trim().is_empty() {
            return Err(AppError::Config("remote.username must not be empty".into()));
        }

        if self.remote.ssh_timeout_seconds == 0 || self.remote.command_timeout_seconds == 0 {
            return Err(AppError::Config(
                "remote timeouts must be greater than zero".into(),
            ));
        }

        if self.remote.lanboot_timeout_seconds < self.remote.ssh_timeout_seconds {
            return Err(AppError::Config(
                "remote.lanboot_timeout_seconds must not be shorter than ssh_timeout_seconds"
                    .into(),
            ));
        }

        regex::Regex::new(&self.remote.prompt_pattern)
            .map_err(|err| AppError::Config(format!("remote.prompt_pattern invalid: {err}")))?;

        if self.ignite.address.trim().is_empty() {
            return Err(AppError::Config("ignite.address must not be empty".into()));
        }

        if self.npar.management_network == self.npar.production_network {
            return Err(AppError::Config(
                "management and production networks must differ".into(),
            ));
        }

        if self.monitor.refresh_interval_seconds == 0 {
            return Err(AppError::Config(
                "monitor.refresh_interval_seconds must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    env::var(env_key).map_err(|_| {
        AppError::Config(format!(
            "credential for {keyring_key} not found in keychain or {env_key} env var"
        ))
    })
}

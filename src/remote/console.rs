//! Firmware console automation for network boot.
//!
//! A partition booted to firmware is driven through its console:
//!
//! 1. **`LoggedIn`**: shell prompt seen on the hosting nPar.
//! 2. **`ConsoleAttached`**: `vparconsole -P <name>` run and the console
//!    selected with `CO`.
//! 3. **`Writable`**: write access obtained with `Ctrl-E c f` if the
//!    console announced itself read only.
//! 4. **`Configured`**: `dbprofile` network and boot-file settings applied.
//! 5. **`Booting`**: `lanboot select` issued and its prompt seen under the
//!    extended boot timeout.
//!
//! Every transition is gated on a prompt with its own timeout. The
//! channel is closed whether the sequence succeeds or fails.

use std::fmt::{Display, Formatter};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info, warn};

use super::expect::Expect;
use super::RemoteExecutor;
use crate::{AppError, Result};

/// Escape sequence granting console write access (`Ctrl-E c f`).
pub const WRITE_ACCESS_ESCAPE: &[u8] = b"\x05cf";

/// Banner shown when the console is attached read only.
const READ_ONLY_BANNER: &str = "Read only";

/// How many trailing characters are searched for the read-only banner.
const READ_ONLY_WINDOW: usize = 70;

/// Progress of the firmware console conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConsoleState {
    /// Channel open, no prompt seen yet.
    Connected,
    /// nPar shell prompt seen.
    LoggedIn,
    /// Partition console selected.
    ConsoleAttached,
    /// Console accepts input.
    Writable,
    /// Boot profile configured.
    Configured,
    /// Network boot issued.
    Booting,
}

impl Display for ConsoleState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Connected => "connected",
            Self::LoggedIn => "logged_in",
            Self::ConsoleAttached => "console_attached",
            Self::Writable => "writable",
            Self::Configured => "configured",
            Self::Booting => "booting",
        };
        f.write_str(name)
    }
}

/// Addresses and names needed to network-boot one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkBootPlan {
    /// Partition to boot.
    pub partition: String,
    /// Provisioning server address (`-sip`).
    pub server_address: String,
    /// Partition management IP (`-cip`).
    pub client_address: String,
    /// Management gateway (`-gip`).
    pub gateway: String,
    /// Management netmask (`-m`).
    pub netmask: String,
    /// Boot loader path on the provisioning server (`-b`).
    pub boot_file: String,
    /// Firmware boot profile name (`-dn`).
    pub profile: String,
}

impl NetworkBootPlan {
    fn attach_command(&self) -> String {
        format!("/opt/hpvm/bin/vparconsole -P {}", self.partition)
    }

    fn network_profile_command(&self) -> String {
        format!(
            "dbprofile -dn {} -sip {} -cip {} -gip {} -m {}",
            self.profile, self.server_address, self.client_address, self.gateway, self.netmask
        )
    }

    fn boot_file_command(&self) -> String {
        format!("dbprofile -dn {} -b \"{}\"", self.profile, self.boot_file)
    }

    fn lanboot_command(&self) -> String {
        format!("lanboot select -index 01 -dn {}", self.profile)
    }
}

/// Per-step and final-boot timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleTimeouts {
    /// Bound on every prompt wait before the boot command.
    pub step: Duration,
    /// Bound on the prompt after `lanboot`.
    pub boot: Duration,
}

/// State machine over one console session.
pub struct FirmwareConsole {
    expect: Expect,
    state: ConsoleState,
    timeouts: ConsoleTimeouts,
}

impl FirmwareConsole {
    /// Wrap an open console.
    #[must_use]
    pub fn new(expect: Expect, timeouts: ConsoleTimeouts) -> Self {
        Self {
            expect,
            state: ConsoleState::Connected,
            timeouts,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConsoleState {
        self.state
    }

    /// Drive the console from `Connected` to `Booting`.
    ///
    /// # Errors
    ///
    /// Propagates `Timeout`/`Connectivity` from prompt waits; returns
    /// `AppError::Protocol` if called out of order.
    pub async fn run(&mut self, plan: &NetworkBootPlan) -> Result<ConsoleState> {
        self.login().await?;
        let banner = self.attach(plan).await?;
        self.ensure_writable(&banner).await?;
        self.configure(plan).await?;
        self.boot(plan).await?;
        Ok(self.state)
    }

    async fn login(&mut self) -> Result<()> {
        self.require(ConsoleState::Connected)?;
        self.expect.wait_for_prompt(self.timeouts.step).await?;
        self.advance(ConsoleState::LoggedIn);
        Ok(())
    }

    async fn attach(&mut self, plan: &NetworkBootPlan) -> Result<String> {
        self.require(ConsoleState::LoggedIn)?;
        self.expect.send_shell_line(&plan.attach_command()).await?;
        self.expect.wait_for_prompt(self.timeouts.step).await?;
        self.expect.send_console_line("CO").await?;
        let banner = self.expect.wait_for_prompt(self.timeouts.step).await?;
        self.advance(ConsoleState::ConsoleAttached);
        Ok(banner)
    }

    async fn ensure_writable(&mut self, banner: &str) -> Result<()> {
        self.require(ConsoleState::ConsoleAttached)?;
        if is_read_only(banner) {
            info!("console is read only, requesting write access");
            self.expect.send_raw(WRITE_ACCESS_ESCAPE).await?;
            self.expect.send_console_line("").await?;
            self.expect.wait_for_prompt(self.timeouts.step).await?;
        }
        self.advance(ConsoleState::Writable);
        Ok(())
    }

    async fn configure(&mut self, plan: &NetworkBootPlan) -> Result<()> {
        self.require(ConsoleState::Writable)?;
        self.expect
            .send_console_line(&plan.network_profile_command())
            .await?;
        self.expect.wait_for_prompt(self.timeouts.step).await?;
        self.expect.send_console_line(&plan.boot_file_command()).await?;
        let transcript = self.expect.wait_for_prompt(self.timeouts.step).await?;
        info!(partition = %plan.partition, "firmware profile configured:\n{transcript}");
        self.advance(ConsoleState::Configured);
        Ok(())
    }

    async fn boot(&mut self, plan: &NetworkBootPlan) -> Result<()> {
        self.require(ConsoleState::Configured)?;
        self.expect.send_console_line(&plan.lanboot_command()).await?;
        let transcript = self.expect.wait_for_prompt(self.timeouts.boot).await?;
        info!(partition = %plan.partition, "lanboot finished:\n{transcript}");
        self.advance(ConsoleState::Booting);
        Ok(())
    }

    /// Close the console channel.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Connectivity` if the close handshake fails.
    pub async fn close(&mut self) -> Result<()> {
        self.expect.close().await
    }

    fn require(&self, expected: ConsoleState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(AppError::Protocol(format!(
                "console step expects state {expected}, current state is {}",
                self.state
            )))
        }
    }

    fn advance(&mut self, next: ConsoleState) {
        debug!(from = %self.state, to = %next, "console transition");
        self.state = next;
    }
}

/// True when the last [`READ_ONLY_WINDOW`] characters carry the read-only
/// banner.
#[must_use]
pub fn is_read_only(console_output: &str) -> bool {
    let tail: String = {
        let chars: Vec<char> = console_output.chars().collect();
        let start = chars.len().saturating_sub(READ_ONLY_WINDOW);
        chars[start..].iter().collect()
    };
    tail.contains(READ_ONLY_BANNER)
}

/// Open a console on `node`, network-boot `plan.partition`, and close the
/// console on every exit path.
///
/// # Errors
///
/// Returns the first failure of the sequence, annotated with the state the
/// console had reached.
pub async fn network_boot(
    executor: &dyn RemoteExecutor,
    node: &str,
    plan: &NetworkBootPlan,
    prompt: Regex,
    timeouts: ConsoleTimeouts,
) -> Result<ConsoleState> {
    let channel = executor.open_console(node).await?;
    let mut console = FirmwareConsole::new(Expect::new(channel, prompt), timeouts);

    let outcome = console.run(plan).await;
    if let Err(err) = console.close().await {
        warn!(node, %err, "failed to close firmware console");
    }

    outcome.map_err(|err| {
        warn!(node, partition = %plan.partition, state = %console.state(), %err, "network boot aborted");
        err.at_step(&format!("console at {}", console.state()))
    })
}

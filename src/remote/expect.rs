//! Prompt-gated conversation over a [`ConsoleChannel`].
//!
//! Output is accumulated with terminal escapes stripped; each
//! [`wait_for_prompt`](Expect::wait_for_prompt) call consumes the buffer up
//! to and including the first prompt match and returns the text before it.

use std::time::Duration;

use regex::Regex;
use tracing::debug;

use super::ConsoleChannel;
use crate::parse::strip_terminal_escapes;
use crate::{AppError, Result};

/// Expect-style driver around an interactive channel.
pub struct Expect {
    channel: Box<dyn ConsoleChannel>,
    prompt: Regex,
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
}

impl Expect {
    /// Wrap `channel`; `prompt` must match at the end of the pending output.
    #[must_use]
    pub fn new(channel: Box<dyn ConsoleChannel>, prompt: Regex) -> Self {
        Self {
            channel,
            prompt,
            buffer: String::new(),
            pending: Vec::new(),
        }
    }

    /// Send a shell command terminated by `\n`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Connectivity` if the write fails.
    pub async fn send_shell_line(&mut self, line: &str) -> Result<()> {
        self.send_raw(format!("{line}\n").as_bytes()).await
    }

    /// Send a firmware console command terminated by `\r`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Connectivity` if the write fails.
    pub async fn send_console_line(&mut self, line: &str) -> Result<()> {
        self.send_raw(format!("{line}\r").as_bytes()).await
    }

    /// Send bytes verbatim.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Connectivity` if the write fails.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.channel.send(bytes).await
    }

    /// Wait until the accumulated output ends with a prompt.
    ///
    /// Returns the escape-stripped text that preceded the prompt.
    ///
    /// # Errors
    ///
    /// - `AppError::Timeout` if no prompt appears within `timeout`.
    /// - `AppError::Connectivity` if the channel closes first.
    pub async fn wait_for_prompt(&mut self, timeout: Duration) -> Result<String> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if let Some(before) = self.take_until_prompt() {
                return Ok(before);
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(self.timeout_error(timeout));
            }

            let received = tokio::time::timeout(remaining, self.channel.recv()).await;
            let Ok(chunk) = received else {
                return Err(self.timeout_error(timeout));
            };

            match chunk? {
                Some(bytes) => {
                    self.pending.extend_from_slice(&bytes);
                    self.decode_pending();
                    self.buffer = strip_terminal_escapes(&self.buffer);
                }
                None => {
                    debug!(pending = self.buffer.len(), "console closed while waiting for prompt");
                    return Err(AppError::Connectivity(
                        "console channel closed while waiting for prompt".into(),
                    ));
                }
            }
        }
    }

    /// Close the underlying channel.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Connectivity` if the close handshake fails.
    pub async fn close(&mut self) -> Result<()> {
        self.channel.close().await
    }

    /// Move the decodable prefix of `pending` into the text buffer. Invalid
    /// sequences become U+FFFD; an incomplete tail waits for the next chunk.
    fn decode_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&self.pending[..valid]) {
                        self.buffer.push_str(text);
                    }
                    let Some(invalid) = err.error_len() else {
                        self.pending.drain(..valid);
                        return;
                    };
                    self.buffer.push(char::REPLACEMENT_CHARACTER);
                    self.pending.drain(..valid + invalid);
                }
            }
        }
    }

    fn take_until_prompt(&mut self) -> Option<String> {
        let found = self.prompt.find(&self.buffer)?;
        let before = self.buffer[..found.start()].to_owned();
        self.buffer.drain(..found.end());
        Some(before)
    }

    fn timeout_error(&self, timeout: Duration) -> AppError {
        let tail: String = self
            .buffer
            .chars()
            .rev()
            .take(80)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        AppError::Timeout(format!(
            "no prompt within {timeout:?}; last output: {:?}",
            tail.trim()
        ))
    }
}

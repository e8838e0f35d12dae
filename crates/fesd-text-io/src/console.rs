//! Serial console: line writes and prompt-delimited reads over a transport.
//!
//! [`SerialConsole`] owns one [`Transport`] exclusively. It is not shared
//! directly; [`DeviceConnection`](crate::DeviceConnection) wraps it in a
//! lock so that one transaction at a time reaches the wire.

use std::time::Duration;

use fesd_core::{Error, Result, Transport};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::protocol::{self, DecodeResult};

/// Upper bound on one reply. Anything longer is line noise, not a reply.
const MAX_REPLY_LEN: usize = 64 * 1024;

/// Timing parameters of a console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// Overall budget for one reply to reach the prompt.
    pub read_timeout: Duration,
    /// Longest single wait inside the read loop.
    pub poll_interval: Duration,
    /// How long stale bytes are drained after the ETX flush on open.
    pub flush_window: Duration,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
            flush_window: Duration::from_millis(250),
        }
    }
}

/// Line-oriented console over a [`Transport`].
pub struct SerialConsole {
    transport: Box<dyn Transport>,
    config: ConsoleConfig,
    port: String,
    /// Set when a read gave up before the prompt. The instrument may still
    /// answer that command, so the line is resynchronised first.
    needs_resync: bool,
}

impl SerialConsole {
    /// Take ownership of an already opened transport and flush the line.
    ///
    /// The flush sends ETX so the instrument drops any half-entered command,
    /// then discards whatever arrives within
    /// [`flush_window`](ConsoleConfig::flush_window).
    pub async fn open(
        port: impl Into<String>,
        transport: Box<dyn Transport>,
        config: ConsoleConfig,
    ) -> Result<Self> {
        let mut console = Self {
            transport,
            config,
            port: port.into(),
            needs_resync: false,
        };
        console.flush().await?;
        Ok(console)
    }

    /// Name of the port, for logging.
    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    async fn send_etx(&mut self) -> Result<()> {
        self.transport
            .send(&protocol::encode_line("\x03"))
            .await
            .map_err(|e| Error::Transport(format!("failed to flush {}: {e}", self.port)))
    }

    async fn flush(&mut self) -> Result<()> {
        self.send_etx().await?;

        let deadline = Instant::now() + self.config.flush_window;
        let mut scratch = [0u8; 256];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.transport.receive(&mut scratch, remaining).await {
                Ok(n) => trace!(port = %self.port, bytes = n, "discarded stale bytes"),
                Err(_) => break,
            }
        }
        Ok(())
    }

    /// Clear the line after a timed-out read.
    ///
    /// Sends ETX and discards input until a prompt has been seen and the
    /// line then stays quiet for [`flush_window`](ConsoleConfig::flush_window).
    /// A late reply to the abandoned command always precedes the prompt
    /// answering the ETX, so both are consumed here. Gives up quietly after
    /// [`read_timeout`](ConsoleConfig::read_timeout); the next read then
    /// reports a silent instrument on its own.
    async fn resync(&mut self) -> Result<()> {
        self.send_etx().await?;

        let deadline = Instant::now() + self.config.read_timeout;
        let mut scratch = [0u8; 256];
        let mut prompted = false;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!(port = %self.port, "no prompt after resync");
                break;
            }
            let wait = if prompted {
                remaining.min(self.config.flush_window)
            } else {
                remaining.min(self.config.poll_interval)
            };
            match self.transport.receive(&mut scratch, wait).await {
                Ok(n) => {
                    trace!(port = %self.port, bytes = n, "discarded late bytes");
                    prompted |= scratch[..n].contains(&protocol::PROMPT);
                }
                Err(Error::Timeout) if prompted => break,
                Err(Error::Timeout) => continue,
                Err(e) => return Err(e),
            }
        }
        self.needs_resync = false;
        Ok(())
    }

    /// Write one command line. The line terminator is appended here.
    pub async fn write_line(&mut self, message: &str) -> Result<()> {
        trace!(port = %self.port, line = message, "write");
        self.transport.send(&protocol::encode_line(message)).await
    }

    /// Read until `delimiter` is seen or the read timeout expires.
    ///
    /// Each call starts with an empty buffer. The loop waits at most
    /// [`poll_interval`](ConsoleConfig::poll_interval) per receive so the
    /// overall deadline is checked regularly. After a timeout the next
    /// [`transact`](Self::transact) clears the line before writing.
    pub async fn read_until(&mut self, delimiter: u8) -> Result<Vec<u8>> {
        let deadline = Instant::now() + self.config.read_timeout;
        let mut reply = Vec::new();
        let mut chunk = [0u8; 256];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!(
                    port = %self.port,
                    received = reply.len(),
                    "timed out waiting for prompt"
                );
                self.needs_resync = true;
                return Err(Error::Timeout);
            }

            match self
                .transport
                .receive(&mut chunk, remaining.min(self.config.poll_interval))
                .await
            {
                Ok(n) => {
                    reply.extend_from_slice(&chunk[..n]);
                    if chunk[..n].contains(&delimiter) {
                        return Ok(reply);
                    }
                    if reply.len() > MAX_REPLY_LEN {
                        warn!(port = %self.port, len = reply.len(), "reply overflow");
                        self.needs_resync = true;
                        return Err(Error::Protocol(format!(
                            "reply exceeded {MAX_REPLY_LEN} bytes without a prompt"
                        )));
                    }
                }
                Err(Error::Timeout) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Write `message`, read the reply and classify it.
    ///
    /// Returns the payload with status line and peripheral tokens removed.
    /// An `ERR` reply becomes [`Error::Rejected`].
    pub async fn transact(&mut self, message: &str) -> Result<String> {
        if self.needs_resync {
            self.resync().await?;
        }
        self.write_line(message).await?;
        let reply = self.read_until(protocol::PROMPT).await?;

        match protocol::decode_response(&reply) {
            DecodeResult::Payload(payload) => {
                debug!(
                    port = %self.port,
                    command = message.trim_end(),
                    payload = %payload,
                    "transaction"
                );
                Ok(payload)
            }
            DecodeResult::Rejected => {
                debug!(port = %self.port, command = message.trim_end(), "rejected");
                Err(Error::Rejected(message.trim_end().to_string()))
            }
            DecodeResult::Incomplete => Err(Error::invalid_response(
                "reply ended without a prompt",
            )),
        }
    }

    /// Release the port.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.transport.close().await
    }

    /// Re-acquire the port and flush it as on open.
    pub async fn reconnect(&mut self) -> Result<()> {
        self.transport.reopen().await?;
        self.needs_resync = false;
        self.flush().await
    }
}

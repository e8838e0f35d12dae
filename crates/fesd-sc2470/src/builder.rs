//! Sc2470Builder: open a connection and a commander in one step.
//!
//! Opening a commander directly needs a [`DeviceConnection`]; the builder
//! creates one from a serial port (or a caller-supplied transport) and
//! verifies the slot before returning.
//!
//! Several commanders on the same port must share one connection. Use the
//! discovery driver in the `fesd` crate for that instead of building twice.

use std::time::Duration;

use fesd_core::{Error, Result, Transport};
use fesd_text_io::{ConsoleConfig, DeviceConnection};
use fesd_transport::{SerialConfig, SerialTransport};

use crate::commander::Sc2470Commander;

/// Fluent builder for [`Sc2470Commander`].
#[derive(Debug, Clone, Default)]
pub struct Sc2470Builder {
    serial_port: Option<String>,
    serial_config: SerialConfig,
    slot_id: u16,
    console_config: ConsoleConfig,
}

impl Sc2470Builder {
    /// Slot 0, 115200 8E1, 10 s reply timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the serial port path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    pub fn serial_config(mut self, config: SerialConfig) -> Self {
        self.serial_config = config;
        self
    }

    pub fn slot_id(mut self, slot_id: u16) -> Self {
        self.slot_id = slot_id;
        self
    }

    pub fn console_config(mut self, config: ConsoleConfig) -> Self {
        self.console_config = config;
        self
    }

    /// Shorthand for overriding only the reply timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.console_config.read_timeout = timeout;
        self
    }

    /// Build over a caller-provided transport (a `MockTransport` in tests).
    pub async fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<Sc2470Commander> {
        let port = self.serial_port.unwrap_or_else(|| "custom".to_string());
        let connection = DeviceConnection::open(port, transport, self.console_config).await?;
        Sc2470Commander::new(connection, self.slot_id).await
    }

    /// Build over a serial transport.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    pub async fn build(self) -> Result<Sc2470Commander> {
        let port = self
            .serial_port
            .clone()
            .ok_or_else(|| Error::InvalidParameter("serial_port is required for build()".into()))?;
        let transport = SerialTransport::open_with_config(&port, self.serial_config.clone()).await?;
        self.build_with_transport(Box::new(transport)).await
    }
}

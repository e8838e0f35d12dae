//! Transport implementations for fesd.
//!
//! [`SerialTransport`] implements the [`Transport`](fesd_core::Transport)
//! trait from `fesd-core` for the USB virtual COM port an instrument
//! presents to the host.
//!
//! # Example
//!
//! ```no_run
//! use fesd_transport::SerialTransport;
//! use fesd_core::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> fesd_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyUSB0").await?;
//! transport.send(b"VER\r").await?;
//!
//! let mut buf = [0u8; 256];
//! let n = transport.receive(&mut buf, Duration::from_secs(1)).await?;
//! # Ok(())
//! # }
//! ```

pub mod serial;

pub use serial::{DataBits, FlowControl, Parity, SerialConfig, SerialTransport, StopBits};

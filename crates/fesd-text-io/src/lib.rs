//! Text console layer for fesd instruments.
//!
//! The instrument speaks a line-oriented ASCII protocol: a command line
//! terminated by `CR`, answered by zero or more payload lines, an `OK` or
//! `ERR` status line, and a `>` prompt.
//!
//! # Architecture
//!
//! - [`protocol`] -- prompt detection, status classification, prefix stripping
//! - [`message`] -- pure command/query string construction
//! - [`console`] -- one serial console over a [`Transport`](fesd_core::Transport)
//! - [`connection`] -- the lock-serialized, shareable [`DeviceConnection`]

pub mod connection;
pub mod console;
pub mod message;
pub mod protocol;

pub use connection::{DeviceConnection, RESET_SETTLE_INTERVAL};
pub use console::{ConsoleConfig, SerialConsole};

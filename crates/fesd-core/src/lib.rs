//! fesd-core: Core traits, types, and error definitions for fesd.
//!
//! This crate defines the instrument-agnostic abstractions shared by every
//! layer of the front-end serial driver. Device backends and applications
//! depend on these types without pulling in the serial stack.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level communication channel
//! - [`Path`], [`FrequencySet`] and the range-clamping frequency newtypes
//! - [`Error`] / [`Result`] / [`ErrorKind`] -- error handling

pub mod error;
pub mod helpers;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use fesd_core::*`.
pub use error::{Error, ErrorKind, Result};
pub use helpers::{format_freq_ghz, is_almost_equal, is_almost_equal_to_zero, ZERO_EPSILON};
pub use transport::Transport;
pub use types::*;

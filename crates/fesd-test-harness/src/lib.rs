//! fesd-test-harness: mock transport for fesd.
//!
//! [`MockTransport`] lets the console, connection and commander layers be
//! tested against scripted instrument replies without real hardware.

pub mod mock_serial;

pub use mock_serial::MockTransport;

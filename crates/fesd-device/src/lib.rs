//! Accessors common to every device type on an fesd port.
//!
//! [`GeneralCommander`] covers identification, manufacturing data, system
//! role and reset. Device-specific commanders build on it.

pub mod general;

pub use general::GeneralCommander;

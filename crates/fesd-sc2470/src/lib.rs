//! SC2470 RF up/down-converter support for fesd.
//!
//! - [`commands`] -- verb names, command strings and reply parsers
//! - [`planner`] -- the RF/IF/LO frequency solver
//! - [`commander`] -- [`Sc2470Commander`], the typed accessor surface
//! - [`builder`] -- [`Sc2470Builder`] for opening a commander on a port
//!
//! # Example
//!
//! ```no_run
//! use fesd_core::{IfFrequency, Path, RfFrequency};
//! use fesd_sc2470::Sc2470Builder;
//!
//! # async fn example() -> fesd_core::Result<()> {
//! let sc2470 = Sc2470Builder::new()
//!     .serial_port("/dev/ttyUSB0")
//!     .slot_id(1)
//!     .build()
//!     .await?;
//!
//! let set = sc2470
//!     .configure_rf_if(Path::Rx, RfFrequency::new(12.7e9), IfFrequency::new(6e9))
//!     .await?;
//! println!("{set}");
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod commander;
pub mod commands;
pub mod planner;

pub use builder::Sc2470Builder;
pub use commander::Sc2470Commander;
pub use planner::{plan, FrequencyRequest, WireFrequencySet};

//! # fesd: host-side driver for FE serial RF front-ends
//!
//! `fesd` drives SC2470 RF up/down-converters over their USB serial
//! console. It finds instruments across one or more ports, then exposes
//! each one as a typed commander whose setters clamp to hardware ranges
//! and return the value the instrument reads back.
//!
//! ## Quick Start
//!
//! ```no_run
//! use fesd::{FeSerialDriver, IfFrequency, Path, RfFrequency};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> fesd::Result<()> {
//!     let driver = FeSerialDriver::new("/dev/ttyUSB0,/dev/ttyUSB1").await?;
//!     for info in driver.devices() {
//!         println!("{info}");
//!     }
//!
//!     let sc2470 = driver.sc2470_commander_by_slot(1)?;
//!     let set = sc2470
//!         .configure_rf_if(Path::Rx, RfFrequency::new(12.7e9), IfFrequency::new(6e9))
//!         .await?;
//!     println!("RX: {set}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate               | Purpose                                             |
//! |---------------------|-----------------------------------------------------|
//! | `fesd-core`         | Error type, [`Transport`] trait, domain types       |
//! | `fesd-transport`    | Serial transport over `tokio-serial`                |
//! | `fesd-text-io`      | Reply framing, command builder, shared connection   |
//! | `fesd-device`       | Identification accessors common to every device     |
//! | `fesd-sc2470`       | SC2470 commands, frequency planner, commander       |
//! | **`fesd`**          | This facade: re-exports and port discovery          |
//!
//! ## Errors
//!
//! Every failure is an [`Error`]. [`Error::kind`] sorts it into one of
//! three [`ErrorKind`]s (communication, invalid arguments, calibration),
//! and [`ErrorKind::status_code`] gives the numeric code used at C-style
//! boundaries.

pub mod driver;

pub use driver::{Commander, FeSerialDriver};
pub use fesd_core::*;

/// Serial transport and line settings.
pub mod transport {
    pub use fesd_transport::*;
}

/// Console framing, command builder and the shared connection.
pub mod text_io {
    pub use fesd_text_io::*;
}

/// Identification and system accessors common to every device type.
pub mod device {
    pub use fesd_device::*;
}

/// SC2470 up/down-converter support.
pub mod sc2470 {
    pub use fesd_sc2470::*;
}

pub use fesd_device::GeneralCommander;
pub use fesd_sc2470::{FrequencyRequest, Sc2470Builder, Sc2470Commander};

/// Library version.
///
/// ```
/// assert!(!fesd::version().is_empty());
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

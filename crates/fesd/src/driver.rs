//! Port discovery and the device registry.
//!
//! [`FeSerialDriver`] opens every port in a comma-separated list, checks
//! that something answers the bare `VER` probe, and then asks each slot in
//! [`SLOT_IDS`] to identify itself. The first recognised slot on a port is
//! recorded under its serial-number string. Probing is forgiving: a port
//! that does not answer, or a slot that fails to identify, is simply not a
//! device. Opening a port, on the other hand, must succeed.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

use fesd_core::{DeviceInfo, DeviceType, Error, Result, Transport};
use fesd_device::GeneralCommander;
use fesd_sc2470::Sc2470Commander;
use fesd_text_io::{ConsoleConfig, DeviceConnection};
use fesd_transport::{SerialConfig, SerialTransport};
use tracing::{debug, info, warn};

/// Slot ids probed on each port.
pub const SLOT_IDS: RangeInclusive<u16> = 0..=1;

/// Liveliness probe. Sent without a slot id.
const PROBE: &str = "VER";

/// A discovered device, resolved once by type.
#[derive(Debug, Clone)]
pub enum Commander {
    Sc2470(Sc2470Commander),
}

impl Commander {
    pub fn device_type(&self) -> DeviceType {
        match self {
            Commander::Sc2470(_) => DeviceType::Sc2470,
        }
    }

    /// General accessors shared by every device type.
    pub fn general(&self) -> &GeneralCommander {
        match self {
            Commander::Sc2470(sc2470) => sc2470.general(),
        }
    }

    pub fn slot_id(&self) -> u16 {
        self.general().slot_id()
    }
}

#[derive(Debug, Clone)]
struct Registered {
    info: DeviceInfo,
    commander: Commander,
}

/// Registry of instruments found on a set of serial ports.
#[derive(Debug, Default)]
pub struct FeSerialDriver {
    serial_config: SerialConfig,
    console_config: ConsoleConfig,
    devices: BTreeMap<String, Registered>,
}

/// Split a comma-separated port list. Blank entries are skipped.
fn split_ports(ports: &str) -> impl Iterator<Item = &str> {
    ports.split(',').map(str::trim).filter(|port| !port.is_empty())
}

impl FeSerialDriver {
    /// Open and probe every port in `ports` with default line settings.
    pub async fn new(ports: &str) -> Result<Self> {
        let mut driver = Self::default();
        driver.add_ports(ports).await?;
        Ok(driver)
    }

    /// An empty registry with custom line and console settings.
    pub fn with_config(serial_config: SerialConfig, console_config: ConsoleConfig) -> Self {
        Self {
            serial_config,
            console_config,
            devices: BTreeMap::new(),
        }
    }

    /// Open and probe more ports, adding what they hold to the registry.
    ///
    /// Stops at the first port that cannot be opened.
    pub async fn add_ports(&mut self, ports: &str) -> Result<()> {
        for port in split_ports(ports) {
            let transport = SerialTransport::open_with_config(port, self.serial_config.clone()).await?;
            self.add_transport(port, Box::new(transport)).await?;
        }
        Ok(())
    }

    /// Probe an already-open transport and register what it holds.
    ///
    /// Returns the number of devices found on it.
    pub async fn add_transport(&mut self, port: &str, transport: Box<dyn Transport>) -> Result<usize> {
        let connection = DeviceConnection::open(port, transport, self.console_config.clone()).await?;

        if let Err(e) = connection.transact(PROBE).await {
            info!(port, error = %e, "no instrument answered; skipping port");
            return Ok(0);
        }

        let mut found = 0;
        for slot_id in SLOT_IDS {
            let general = GeneralCommander::new(Arc::clone(&connection), slot_id);
            match general.device_info().await {
                Ok(info) => {
                    self.register(info, general);
                    found += 1;
                    break;
                }
                Err(e) => debug!(port, slot = slot_id, error = %e, "no device at slot"),
            }
        }
        Ok(found)
    }

    fn register(&mut self, info: DeviceInfo, general: GeneralCommander) {
        let port = general.connection().port().to_string();
        let commander = match info.device_type {
            DeviceType::Sc2470 => Commander::Sc2470(Sc2470Commander::from_general(general)),
            // device_info() rejects unknown models before we get here.
            DeviceType::Undefined => return,
        };
        info!(
            port = %port,
            slot = info.slot_id,
            serial = %info.serial_number_str,
            "found {}",
            info.device_type
        );
        let key = info.serial_number_str.clone();
        if self
            .devices
            .insert(key, Registered { info, commander })
            .is_some()
        {
            warn!("duplicate serial number; keeping the newest device");
        }
    }

    /// Every discovered device, ordered by serial number.
    pub fn devices(&self) -> Vec<DeviceInfo> {
        self.devices.values().map(|d| d.info.clone()).collect()
    }

    /// Commander for the device with serial number `serial`.
    pub fn commander(&self, serial: &str) -> Result<Commander> {
        self.devices
            .get(serial)
            .map(|d| d.commander.clone())
            .ok_or_else(|| {
                Error::InvalidParameter(format!("Could not find device with serial number {serial}"))
            })
    }

    pub fn sc2470_commander_by_serial(&self, serial: &str) -> Result<Sc2470Commander> {
        match self.commander(serial)? {
            Commander::Sc2470(sc2470) => Ok(sc2470),
        }
    }

    /// First SC2470 discovered at `slot_id`.
    pub fn sc2470_commander_by_slot(&self, slot_id: u16) -> Result<Sc2470Commander> {
        self.devices
            .values()
            .find_map(|d| match &d.commander {
                Commander::Sc2470(sc2470) if d.info.slot_id == slot_id => Some(sc2470.clone()),
                _ => None,
            })
            .ok_or_else(|| {
                Error::InvalidParameter(format!("Could not find an SC2470 at slot {slot_id}"))
            })
    }

    pub fn sc2470_commander_for(&self, info: &DeviceInfo) -> Result<Sc2470Commander> {
        self.sc2470_commander_by_serial(&info.serial_number_str)
    }

    pub fn sc2470_commanders(&self) -> Vec<Sc2470Commander> {
        self.devices
            .values()
            .map(|d| match &d.commander {
                Commander::Sc2470(sc2470) => sc2470.clone(),
            })
            .collect()
    }
}

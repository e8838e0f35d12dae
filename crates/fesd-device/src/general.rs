//! Identification and system accessors shared by all device types.
//!
//! `*IDN?` answers `<vendor>,<model>,<..>,<firmware>` and `MAINT:GETMANUF?`
//! answers `<serial> <..> <hardware> ...`, both single lines.

use std::sync::Arc;

use fesd_core::{DeviceInfo, DeviceType, Error, Result, SystemRole};
use fesd_text_io::message::{build_command, build_query};
use fesd_text_io::DeviceConnection;
use tracing::debug;

const RESET: &str = "*RST";
const IDENTIFICATION: &str = "*IDN";
const MANUFACTURING: &str = "MAINT:GETMANUF";
const SYSTEM_ROLE: &str = "SYS:ROLE";
const CHANNEL_COUNT: &str = "SYS:NCHAN";

const IDN_MODEL_FIELD: usize = 1;
const IDN_FIRMWARE_FIELD: usize = 3;
const MANUF_SERIAL_FIELD: usize = 0;
const MANUF_HARDWARE_FIELD: usize = 2;

/// Left-trimmed field `index` of `reply` split on `delim`, or `""`.
fn split_field(reply: &str, delim: char, index: usize) -> String {
    reply
        .split(delim)
        .nth(index)
        .map(|field| field.trim_start().to_string())
        .unwrap_or_default()
}

fn parse_f64(field: &str, what: &str) -> Result<f64> {
    field
        .trim()
        .parse()
        .map_err(|_| Error::invalid_response(format!("{what}: {field:?} is not a number")))
}

/// Commander for one slot on a connection, limited to the general command set.
#[derive(Debug, Clone)]
pub struct GeneralCommander {
    connection: Arc<DeviceConnection>,
    slot_id: u16,
}

impl GeneralCommander {
    pub fn new(connection: Arc<DeviceConnection>, slot_id: u16) -> Self {
        Self {
            connection,
            slot_id,
        }
    }

    pub fn slot_id(&self) -> u16 {
        self.slot_id
    }

    pub fn connection(&self) -> &Arc<DeviceConnection> {
        &self.connection
    }

    /// Reset the device, wait for it to come back, and verify it answers.
    ///
    /// Blocks for the full reset settle interval.
    pub async fn reset_device(&self) -> Result<()> {
        let notify = build_command(RESET, self.slot_id, &[]);
        self.connection.reset_connection(&notify).await?;
        self.id().await?;
        Ok(())
    }

    /// Raw `*IDN?` reply.
    pub async fn id(&self) -> Result<String> {
        self.connection
            .transact(&build_query(IDENTIFICATION, self.slot_id, &[]))
            .await
    }

    pub async fn device_type(&self) -> Result<DeviceType> {
        let reply = self.id().await?;
        Ok(DeviceType::from_model(&split_field(&reply, ',', IDN_MODEL_FIELD)))
    }

    /// Firmware version string from `*IDN?`.
    pub async fn firmware_version(&self) -> Result<String> {
        let reply = self.id().await?;
        Ok(split_field(&reply, ',', IDN_FIRMWARE_FIELD))
    }

    pub async fn firmware_version_value(&self) -> Result<f64> {
        parse_f64(&self.firmware_version().await?, "firmware version")
    }

    async fn manufacturing_field(&self, index: usize) -> Result<String> {
        let reply = self
            .connection
            .transact(&build_query(MANUFACTURING, self.slot_id, &[]))
            .await?;
        Ok(split_field(&reply, ' ', index))
    }

    /// Serial number as printed by the device, without its `#`/`H` markers.
    pub async fn serial_number(&self) -> Result<String> {
        let field = self.manufacturing_field(MANUF_SERIAL_FIELD).await?;
        Ok(field.trim_start_matches(['#', 'H']).to_string())
    }

    /// Serial number parsed as hexadecimal.
    pub async fn serial_number_value(&self) -> Result<u32> {
        let serial = self.serial_number().await?;
        u32::from_str_radix(serial.trim(), 16).map_err(|_| {
            Error::invalid_response(format!("serial number {serial:?} is not hexadecimal"))
        })
    }

    pub async fn hardware_version(&self) -> Result<String> {
        self.manufacturing_field(MANUF_HARDWARE_FIELD).await
    }

    pub async fn hardware_version_value(&self) -> Result<f64> {
        parse_f64(&self.hardware_version().await?, "hardware version")
    }

    pub async fn system_role(&self) -> Result<SystemRole> {
        let reply = self
            .connection
            .transact(&build_query(SYSTEM_ROLE, self.slot_id, &[]))
            .await?;
        match reply.trim() {
            "MASTER" => Ok(SystemRole::Controller),
            "SLAVE" => Ok(SystemRole::Peripheral),
            other => Err(Error::invalid_response(format!("unknown system role {other:?}"))),
        }
    }

    pub async fn set_system_role(&self, role: SystemRole) -> Result<()> {
        let params = [role.as_wire().to_string()];
        self.connection
            .transact(&build_command(SYSTEM_ROLE, self.slot_id, &params))
            .await?;
        Ok(())
    }

    /// Number of devices the bus controller reports.
    pub async fn number_of_devices(&self) -> Result<u16> {
        let reply = self
            .connection
            .transact(&build_query(CHANNEL_COUNT, self.slot_id, &[]))
            .await?;
        reply
            .trim()
            .parse()
            .map_err(|_| Error::invalid_response(format!("device count {reply:?}")))
    }

    /// Identify this slot.
    ///
    /// Fails with [`Error::InvalidParameter`] when the slot answers but the
    /// model is not one this driver supports.
    pub async fn device_info(&self) -> Result<DeviceInfo> {
        let device_type = self.device_type().await?;
        if device_type == DeviceType::Undefined {
            return Err(Error::InvalidParameter(format!(
                "slot {} on {} holds no supported device",
                self.slot_id,
                self.connection.port()
            )));
        }

        let serial_number = self.serial_number_value().await?;
        let serial_number_str = self.serial_number().await?;
        let firmware_version = self.firmware_version_value().await?;
        let hardware_version = self.hardware_version_value().await?;

        debug!(
            port = %self.connection.port(),
            slot = self.slot_id,
            serial = %serial_number_str,
            "identified device"
        );

        Ok(DeviceInfo {
            slot_id: self.slot_id,
            device_type,
            serial_number,
            serial_number_str,
            firmware_version,
            hardware_version,
        })
    }
}

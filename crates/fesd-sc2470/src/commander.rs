//! Typed accessors for one SC2470 on a connection.
//!
//! Every call round-trips to the instrument; no state is cached. Setters
//! clamp their input, send it, and return what the instrument reads back,
//! which is authoritative.

use std::sync::Arc;

use fesd_core::{
    is_almost_equal_to_zero, BypassFrequency, DcBias, DeviceType, DuplexSetting, Error,
    FrequencySet, GainLimits, IfFrequency, InternalReferenceFrequency, LoFrequency, Path,
    ReferenceSource, Result, RfFrequency, SynthesizerMode, SynthesizerSettings, SystemRole,
    ZERO_EPSILON,
};
use fesd_device::GeneralCommander;
use fesd_text_io::message::{build_command, build_path_query, build_query};
use fesd_text_io::DeviceConnection;
use tracing::debug;

use crate::commands::{self, SYNTH_REFERENCE_100MHZ_KHZ, SYNTH_REFERENCE_105MHZ_KHZ};
use crate::planner::{plan, FrequencyRequest};

/// TX attenuator range in dB.
pub const TX_ATTENUATION_MAX_DB: f64 = 31.5;
/// Combined range of the two RX attenuator stages in dB.
pub const RX_ATTENUATION_MAX_DB: f64 = 63.25;
/// Phase offsets are clamped to +/- this many degrees.
pub const PHASE_OFFSET_LIMIT_DEG: f64 = 360.0;

/// Split a combined RX attenuation into stages (A, B).
///
/// B takes half the value rounded to the nearest whole dB and A the
/// remainder, so B leads when the value rounds up.
pub fn split_rx_attenuation(total_db: f64) -> (f64, f64) {
    let total_db = total_db.clamp(0.0, RX_ATTENUATION_MAX_DB);
    let stage_b = 0.5 * total_db.round();
    (total_db - stage_b, stage_b)
}

/// Commander for an SC2470 at one slot.
#[derive(Debug, Clone)]
pub struct Sc2470Commander {
    general: GeneralCommander,
}

impl Sc2470Commander {
    /// Create a commander and check that the slot answers `*IDN?`.
    pub async fn new(connection: Arc<DeviceConnection>, slot_id: u16) -> Result<Self> {
        let general = GeneralCommander::new(connection, slot_id);
        general.id().await?;
        Ok(Self { general })
    }

    /// Wrap a slot that has already been identified as an SC2470.
    pub fn from_general(general: GeneralCommander) -> Self {
        Self { general }
    }

    /// General (identification and system) accessors for this slot.
    pub fn general(&self) -> &GeneralCommander {
        &self.general
    }

    pub fn slot_id(&self) -> u16 {
        self.general.slot_id()
    }

    pub fn device_type(&self) -> DeviceType {
        DeviceType::Sc2470
    }

    pub async fn serial_number(&self) -> Result<String> {
        self.general.serial_number().await
    }

    pub async fn firmware_version(&self) -> Result<String> {
        self.general.firmware_version().await
    }

    pub async fn system_role(&self) -> Result<SystemRole> {
        self.general.system_role().await
    }

    /// Reset the device and wait for it to return. Blocks for the settle interval.
    pub async fn reset_device(&self) -> Result<()> {
        self.general.reset_device().await
    }

    async fn transact(&self, message: String) -> Result<String> {
        self.general.connection().transact(&message).await
    }

    async fn query(&self, name: &str) -> Result<String> {
        self.transact(build_query(name, self.slot_id(), &[])).await
    }

    async fn path_query(&self, name: &str, path: Path) -> Result<String> {
        self.transact(build_path_query(name, self.slot_id(), path, &[])).await
    }

    // -----------------------------------------------------------------------
    // Gain and attenuation
    // -----------------------------------------------------------------------

    /// Calibrated gain range.
    ///
    /// A range narrower than 0.001 dB, or an inverted one, means the path
    /// was never calibrated and fails with [`Error::Calibration`].
    pub async fn gain_limits(&self, path: Path) -> Result<GainLimits> {
        let reply = self.path_query(commands::PATH_GAIN_LIMITS, path).await?;
        let (min_db, max_db) = commands::parse_decimal_pair(&reply, "gain limits")?;
        if max_db - min_db < ZERO_EPSILON {
            return Err(Error::Calibration(format!(
                "{path} gain limits are not a range ({min_db} dB to {max_db} dB)"
            )));
        }
        Ok(GainLimits { min_db, max_db })
    }

    pub async fn gain(&self, path: Path) -> Result<f64> {
        let reply = self.path_query(commands::PATH_GAIN, path).await?;
        commands::parse_decimal(&reply, "gain")
    }

    /// Set gain, clamped to the calibrated limits.
    pub async fn configure_gain(&self, path: Path, gain_db: f64) -> Result<f64> {
        let limits = self.gain_limits(path).await?;
        let gain_db = limits.clamp(gain_db);
        self.transact(commands::set_gain(self.slot_id(), path, gain_db)).await?;
        self.gain(path).await
    }

    /// Total attenuation. For RX this is the sum of both stages.
    pub async fn attenuation(&self, path: Path) -> Result<f64> {
        match path {
            Path::Tx => {
                let reply = self.path_query(commands::RF_PATH_ATTENUATION, Path::Tx).await?;
                commands::parse_decimal(&reply, "tx attenuation")
            }
            Path::Rx => {
                let reply = self.path_query(commands::IF_PATH_ATTENUATION, Path::Rx).await?;
                let (stage_a, stage_b) = commands::parse_decimal_pair(&reply, "rx attenuation")?;
                Ok(stage_a + stage_b)
            }
        }
    }

    /// Set attenuation. TX is clamped to 0..=31.5 dB; RX to 0..=63.25 dB
    /// and split across its two stages by [`split_rx_attenuation`].
    pub async fn configure_attenuation(&self, path: Path, attenuation_db: f64) -> Result<f64> {
        let message = match path {
            Path::Tx => {
                let db = attenuation_db.clamp(0.0, TX_ATTENUATION_MAX_DB);
                commands::set_tx_attenuation(self.slot_id(), db)
            }
            Path::Rx => {
                let (stage_a, stage_b) = split_rx_attenuation(attenuation_db);
                commands::set_rx_attenuation(self.slot_id(), stage_a, stage_b)
            }
        };
        self.transact(message).await?;
        self.attenuation(path).await
    }

    // -----------------------------------------------------------------------
    // Frequencies
    // -----------------------------------------------------------------------

    /// Current RF/IF/LO triple in Hz.
    pub async fn frequencies(&self, path: Path) -> Result<FrequencySet> {
        let reply = self.path_query(commands::PATH_FREQ, path).await?;
        commands::parse_frequencies(&reply)
    }

    /// Plan `request`, send it, and return the triple read back.
    pub async fn configure_frequencies(
        &self,
        path: Path,
        request: FrequencyRequest,
    ) -> Result<FrequencySet> {
        let wire = plan(&request);
        debug!(
            slot = self.slot_id(),
            path = %path,
            ?request,
            rf_khz = wire.rf_khz,
            if_khz = wire.if_khz,
            lo_khz = wire.lo_khz,
            "planned frequencies"
        );
        self.transact(commands::set_frequencies(self.slot_id(), path, &wire)).await?;
        self.frequencies(path).await
    }

    pub async fn configure_rf_if(
        &self,
        path: Path,
        rf: RfFrequency,
        if_: IfFrequency,
    ) -> Result<FrequencySet> {
        self.configure_frequencies(path, FrequencyRequest::RfIf(rf, if_)).await
    }

    pub async fn configure_rf_lo(
        &self,
        path: Path,
        rf: RfFrequency,
        lo: LoFrequency,
    ) -> Result<FrequencySet> {
        self.configure_frequencies(path, FrequencyRequest::RfLo(rf, lo)).await
    }

    pub async fn configure_if_lo(
        &self,
        path: Path,
        if_: IfFrequency,
        lo: LoFrequency,
    ) -> Result<FrequencySet> {
        self.configure_frequencies(path, FrequencyRequest::IfLo(if_, lo)).await
    }

    pub async fn configure_frequency_set(
        &self,
        path: Path,
        set: FrequencySet,
    ) -> Result<FrequencySet> {
        self.configure_frequencies(path, FrequencyRequest::Explicit(set)).await
    }

    pub async fn configure_bypass_frequency(
        &self,
        path: Path,
        bypass: BypassFrequency,
    ) -> Result<FrequencySet> {
        self.configure_frequencies(path, FrequencyRequest::Bypass(bypass)).await
    }

    /// LO frequency in Hz.
    pub async fn lo_frequency(&self, path: Path) -> Result<f64> {
        let reply = self.path_query(commands::LO_FREQUENCY, path).await?;
        Ok(commands::parse_decimal(&reply, "lo frequency")? * 1000.0)
    }

    /// Set the LO directly, clamped to its range.
    pub async fn configure_lo_frequency(&self, path: Path, frequency_hz: f64) -> Result<f64> {
        let lo = LoFrequency::new(frequency_hz);
        self.transact(commands::set_lo_frequency(self.slot_id(), path, lo.khz())).await?;
        self.lo_frequency(path).await
    }

    pub async fn lo_enable(&self, path: Path) -> Result<bool> {
        let reply = self.path_query(commands::LO_ENABLE, path).await?;
        commands::parse_on_off(&reply, "lo enable")
    }

    pub async fn configure_lo_enable(&self, path: Path, enable: bool) -> Result<bool> {
        self.transact(commands::set_lo_enable(self.slot_id(), path, enable)).await?;
        self.lo_enable(path).await
    }

    // -----------------------------------------------------------------------
    // Synthesizer
    // -----------------------------------------------------------------------

    pub async fn synthesizer_settings(&self, path: Path) -> Result<SynthesizerSettings> {
        let reply = self.path_query(commands::SYNTH_POWER, path).await?;
        let (power_1x, power_2x) = commands::parse_synthesizer_power(&reply)?;
        let reply = self.path_query(commands::SYNTH_ENABLE, path).await?;
        let (enable_1x, enable_2x) = commands::parse_synthesizer_enables(&reply)?;
        Ok(SynthesizerSettings::new(enable_1x, enable_2x, power_1x, power_2x))
    }

    /// Set power levels first, then the output enables.
    pub async fn configure_synthesizer_settings(
        &self,
        path: Path,
        settings: SynthesizerSettings,
    ) -> Result<SynthesizerSettings> {
        let slot = self.slot_id();
        self.transact(commands::set_synthesizer_power(
            slot,
            path,
            settings.power_level_1x(),
            settings.power_level_2x(),
        ))
        .await?;
        self.transact(commands::set_synthesizer_enable(
            slot,
            path,
            settings.enable_1x,
            settings.enable_2x,
        ))
        .await?;
        self.synthesizer_settings(path).await
    }

    async fn force_fractional(&self, path: Path) -> Result<bool> {
        let reply = self.path_query(commands::SYNTH_FORCE_FRACTIONAL, path).await?;
        commands::parse_flag(&reply, "force fractional")
    }

    /// Integer mode when fractional mode is not forced and both fractional
    /// registers are zero.
    pub async fn synthesizer_mode(&self, path: Path) -> Result<SynthesizerMode> {
        let reply = self.path_query(commands::SYNTH_RF_REGISTERS, path).await?;
        let registers = commands::parse_synthesizer_registers(&reply)?;
        let forced = self.force_fractional(path).await?;
        if !forced && registers.frac1 == 0 && registers.frac2 == 0 {
            Ok(SynthesizerMode::Integer)
        } else {
            Ok(SynthesizerMode::Fractional)
        }
    }

    pub async fn internal_reference_override(
        &self,
        path: Path,
    ) -> Result<InternalReferenceFrequency> {
        let reply = self.path_query(commands::SYNTH_AUTO_REFERENCE, path).await?;
        if commands::parse_flag(&reply, "auto reference")? {
            return Ok(InternalReferenceFrequency::Automatic);
        }
        let reply = self.path_query(commands::SYNTH_REFERENCE_FREQUENCY, path).await?;
        commands::parse_synthesizer_reference(&reply)
    }

    pub async fn configure_internal_reference_override(
        &self,
        path: Path,
        frequency: InternalReferenceFrequency,
    ) -> Result<InternalReferenceFrequency> {
        let slot = self.slot_id();
        let forced_khz = match frequency {
            InternalReferenceFrequency::Automatic => None,
            InternalReferenceFrequency::Force100MHz => Some(SYNTH_REFERENCE_100MHZ_KHZ),
            InternalReferenceFrequency::Force105MHz => Some(SYNTH_REFERENCE_105MHZ_KHZ),
        };
        self.transact(commands::set_synthesizer_auto_reference(slot, path, forced_khz.is_none()))
            .await?;
        if let Some(khz) = forced_khz {
            self.transact(commands::set_synthesizer_reference_frequency(slot, path, khz))
                .await?;
        }
        self.internal_reference_override(path).await
    }

    // -----------------------------------------------------------------------
    // Phase
    // -----------------------------------------------------------------------

    async fn phase_accumulator(&self, path: Path) -> Result<f64> {
        let reply = self.path_query(commands::PHASE_ACCUMULATOR, path).await?;
        commands::parse_decimal(&reply, "phase accumulator")
    }

    /// Phase offset in degrees; 0 unless fractional mode is forced.
    pub async fn phase_offset(&self, path: Path) -> Result<f64> {
        if !self.force_fractional(path).await? {
            return Ok(0.0);
        }
        self.phase_accumulator(path).await
    }

    /// Set the LO phase offset in degrees.
    ///
    /// Zero clears the accumulator and releases forced fractional mode.
    /// Any other value forces fractional mode if needed, then steps the
    /// accumulator by the difference to the clamped target, since the
    /// instrument only accepts relative increments. Re-issuing the LO
    /// frequency latches a mode change and zeroes the accumulator.
    pub async fn configure_phase_offset(&self, path: Path, offset_deg: f64) -> Result<f64> {
        let slot = self.slot_id();
        let lo_hz = self.lo_frequency(path).await?;

        if is_almost_equal_to_zero(offset_deg, ZERO_EPSILON) {
            self.transact(commands::set_phase_accumulator(slot, path, 0.0)).await?;
            self.transact(commands::set_force_fractional(slot, path, false)).await?;
            self.configure_lo_frequency(path, lo_hz).await?;
            return self.phase_offset(path).await;
        }

        if !self.force_fractional(path).await? {
            self.transact(commands::set_force_fractional(slot, path, true)).await?;
            self.configure_lo_frequency(path, lo_hz).await?;
        }

        let target = offset_deg.clamp(-PHASE_OFFSET_LIMIT_DEG, PHASE_OFFSET_LIMIT_DEG);
        let current = self.phase_accumulator(path).await?;
        debug!(slot, path = %path, target, current, "phase increment");
        self.transact(commands::increment_phase(slot, path, target - current)).await?;
        self.phase_accumulator(path).await
    }

    // -----------------------------------------------------------------------
    // Routing and reference
    // -----------------------------------------------------------------------

    pub async fn duplex_setting(&self) -> Result<DuplexSetting> {
        let reply = self.query(commands::RF_PATH_DUPLEX).await?;
        if !commands::parse_duplex_mode(&reply)? {
            return Ok(DuplexSetting::Fdd);
        }
        let reply = self.query(commands::RF_PATH_TDD).await?;
        match commands::parse_path(&reply)? {
            Path::Tx => Ok(DuplexSetting::TddTx),
            Path::Rx => Ok(DuplexSetting::TddRx),
        }
    }

    pub async fn configure_duplex_setting(&self, setting: DuplexSetting) -> Result<DuplexSetting> {
        let slot = self.slot_id();
        match setting {
            DuplexSetting::Fdd => {
                self.transact(commands::set_duplex_mode(slot, false)).await?;
            }
            DuplexSetting::TddRx | DuplexSetting::TddTx => {
                let active = if setting == DuplexSetting::TddTx {
                    Path::Tx
                } else {
                    Path::Rx
                };
                self.transact(commands::set_duplex_mode(slot, true)).await?;
                self.transact(commands::set_tdd_path(slot, active)).await?;
            }
        }
        self.duplex_setting().await
    }

    pub async fn reference_source(&self) -> Result<ReferenceSource> {
        let reply = self.query(commands::REFERENCE_CONFIG).await?;
        commands::parse_reference_config(&reply)
    }

    /// Switch the reference clock, then re-apply both LO frequencies since
    /// a reference change invalidates the synthesizer programming.
    pub async fn configure_reference_source(&self, source: ReferenceSource) -> Result<ReferenceSource> {
        let rx_lo_hz = self.lo_frequency(Path::Rx).await?;
        let tx_lo_hz = self.lo_frequency(Path::Tx).await?;

        self.transact(commands::set_reference_config(self.slot_id(), source)).await?;

        self.configure_lo_frequency(Path::Rx, rx_lo_hz).await?;
        self.configure_lo_frequency(Path::Tx, tx_lo_hz).await?;
        self.reference_source().await
    }

    pub async fn reference_output_enable(&self) -> Result<bool> {
        let reply = self.query(commands::REFERENCE_OUTPUT).await?;
        commands::parse_on_off(&reply, "reference output")
    }

    pub async fn configure_reference_output_enable(&self, enable: bool) -> Result<bool> {
        self.transact(commands::set_reference_output(self.slot_id(), enable)).await?;
        self.reference_output_enable().await
    }

    // -----------------------------------------------------------------------
    // IQ correction
    // -----------------------------------------------------------------------

    pub async fn dc_bias(&self, path: Path) -> Result<DcBias> {
        let reply = self.path_query(commands::IF_PATH_DC_BIAS, path).await?;
        commands::parse_dc_bias(&reply)
    }

    pub async fn configure_dc_bias(&self, path: Path, bias: DcBias) -> Result<DcBias> {
        self.transact(commands::set_dc_bias(self.slot_id(), path, bias)).await?;
        self.dc_bias(path).await
    }

    // -----------------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------------

    /// Power amplifier temperature.
    pub async fn pa_temperature(&self) -> Result<f64> {
        let reply = self.query(commands::PA_TEMPERATURE).await?;
        commands::parse_decimal(&reply, "pa temperature")
    }

    /// Drain voltage of power amplifier `pa_id`.
    pub async fn pa_drain_voltage(&self, pa_id: u16) -> Result<f64> {
        let message = build_query(commands::PA_DRAIN_VOLTAGE, self.slot_id(), &[pa_id.to_string()]);
        let reply = self.transact(message).await?;
        commands::parse_decimal(&reply, "pa drain voltage")
    }

    pub async fn reference_dac(&self) -> Result<f64> {
        let reply = self.query(commands::REFERENCE_DAC).await?;
        commands::parse_decimal(&reply, "reference dac")
    }

    pub async fn set_reference_dac(&self, value: u32) -> Result<()> {
        self.transact(commands::set_reference_dac(self.slot_id(), value)).await?;
        Ok(())
    }

    pub async fn reference_lock_detect(&self) -> Result<f64> {
        let reply = self.query(commands::REFERENCE_LOCK_DETECT).await?;
        commands::parse_decimal(&reply, "reference lock detect")
    }

    async fn simple_command(&self, name: &str) -> Result<()> {
        self.transact(build_command(name, self.slot_id(), &[])).await?;
        Ok(())
    }

    /// Apply the working configuration to the hardware.
    pub async fn apply_config(&self) -> Result<()> {
        self.simple_command(commands::CONFIG_APPLY).await
    }

    pub async fn load_default_config(&self) -> Result<()> {
        self.simple_command(commands::CONFIG_DEFAULT).await
    }

    pub async fn load_config_from_nvm(&self) -> Result<()> {
        self.simple_command(commands::CONFIG_LOAD).await
    }

    pub async fn save_config_to_nvm(&self) -> Result<()> {
        self.simple_command(commands::CONFIG_SAVE).await
    }

    /// Whether the saved configuration is loaded at power-up.
    pub async fn config_autoload(&self) -> Result<bool> {
        let reply = self.query(commands::CONFIG_AUTOLOAD).await?;
        commands::parse_flag(&reply, "config autoload")
    }

    pub async fn set_config_autoload(&self, enable: bool) -> Result<()> {
        let message = commands::set_config_flag(commands::CONFIG_AUTOLOAD, self.slot_id(), enable);
        self.transact(message).await?;
        Ok(())
    }

    pub async fn config_autophase(&self) -> Result<bool> {
        let reply = self.query(commands::CONFIG_AUTOPHASE).await?;
        commands::parse_flag(&reply, "config autophase")
    }

    pub async fn set_config_autophase(&self, enable: bool) -> Result<()> {
        let message = commands::set_config_flag(commands::CONFIG_AUTOPHASE, self.slot_id(), enable);
        self.transact(message).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fesd_core::ErrorKind;
    use fesd_test_harness::MockTransport;
    use fesd_text_io::ConsoleConfig;

    const OK: &[u8] = b"\rOK\r>";

    fn reply(payload: &str) -> Vec<u8> {
        format!("{payload}\rOK\r>").into_bytes()
    }

    async fn commander(mock: &MockTransport) -> Sc2470Commander {
        mock.expect_flush();
        mock.expect(b"*IDN? 1 \r", b"FEI,SC2470,0,1.4\rOK\r>");
        let conn = DeviceConnection::open("mock", Box::new(mock.clone()), ConsoleConfig::default())
            .await
            .unwrap();
        Sc2470Commander::new(conn, 1).await.unwrap()
    }

    fn sent(mock: &MockTransport) -> Vec<String> {
        mock.sent_data()
            .into_iter()
            .skip(2)
            .map(|line| String::from_utf8_lossy(&line).into_owned())
            .collect()
    }

    #[test]
    fn rx_attenuation_split() {
        let (a, b) = split_rx_attenuation(10.3);
        assert!((a - 5.3).abs() < 1e-9);
        assert_eq!(b, 5.0);

        let (a, b) = split_rx_attenuation(10.6);
        assert!((a - 5.1).abs() < 1e-9);
        assert_eq!(b, 5.5);

        assert_eq!(split_rx_attenuation(100.0), (31.75, 31.5));
        assert_eq!(split_rx_attenuation(-3.0), (0.0, 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn construction_fails_when_device_silent() {
        let mock = MockTransport::new();
        mock.expect_flush();
        mock.expect(b"*IDN? 1 \r", b"");
        let conn = DeviceConnection::open("mock", Box::new(mock.clone()), ConsoleConfig::default())
            .await
            .unwrap();

        let err = Sc2470Commander::new(conn, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Communication);
    }

    #[tokio::test(start_paused = true)]
    async fn rx_attenuation_is_split_across_stages() {
        let mock = MockTransport::new();
        let cmd = commander(&mock).await;
        mock.expect(b"IFPATH:ATTN 1 RX 5.300000 5.000000 \r", OK);
        mock.expect(b"IFPATH:ATTN? 1 RX \r", &reply("5.300000 5.000000"));

        let db = cmd.configure_attenuation(Path::Rx, 10.3).await.unwrap();
        assert!((db - 10.3).abs() < 1e-9);
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn tx_attenuation_is_clamped() {
        let mock = MockTransport::new();
        let cmd = commander(&mock).await;
        mock.expect(b"RFPATH:ATTN 1 TX 31.500000 \r", OK);
        mock.expect(b"RFPATH:ATTN? 1 TX \r", &reply("31.500000"));

        assert_eq!(cmd.configure_attenuation(Path::Tx, 40.0).await.unwrap(), 31.5);
    }

    #[tokio::test(start_paused = true)]
    async fn gain_is_clamped_to_limits() {
        let mock = MockTransport::new();
        let cmd = commander(&mock).await;
        mock.expect(b"PATH:GAINLIM? 1 TX \r", &reply("-10.000000 20.000000"));
        mock.expect(b"PATH:GAIN 1 TX 20.000000 \r", OK);
        mock.expect(b"PATH:GAIN? 1 TX \r", &reply("19.950000"));

        assert_eq!(cmd.configure_gain(Path::Tx, 35.0).await.unwrap(), 19.95);
    }

    #[tokio::test(start_paused = true)]
    async fn degenerate_gain_limits_are_calibration_error() {
        let mock = MockTransport::new();
        let cmd = commander(&mock).await;
        mock.expect(b"PATH:GAINLIM? 1 RX \r", &reply("0.000000 0.000000"));

        let err = cmd.configure_gain(Path::Rx, 5.0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Calibration);
        assert_eq!(err.kind().status_code(), -3);
        // Nothing was sent after the limits query.
        assert_eq!(sent(&mock), vec!["PATH:GAINLIM? 1 RX \r"]);
    }

    #[tokio::test(start_paused = true)]
    async fn inverted_gain_limits_are_calibration_error() {
        let mock = MockTransport::new();
        let cmd = commander(&mock).await;
        mock.expect(b"PATH:GAINLIM? 1 TX \r", &reply("20.000000 -10.000000"));

        let err = cmd.configure_gain(Path::Tx, 5.0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Calibration);
        assert_eq!(sent(&mock), vec!["PATH:GAINLIM? 1 TX \r"]);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_command_is_invalid_arguments() {
        let mock = MockTransport::new();
        let cmd = commander(&mock).await;
        mock.expect(b"IFPATH:DCBIAS 1 RX 10 -10 \r", b"\rERR\r>");

        let err = cmd
            .configure_dc_bias(Path::Rx, DcBias::new(10, -10))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
    }

    #[tokio::test(start_paused = true)]
    async fn rf_if_request_is_planned_and_read_back() {
        let mock = MockTransport::new();
        let cmd = commander(&mock).await;
        let readback = "12700000.000000 6000000.000000 6700000.000000";
        mock.expect(b"PATH:FREQ 1 RX 12700000.000000 6000000.000000 0.000000 \r", OK);
        mock.expect(b"PATH:FREQ? 1 RX \r", &reply(readback));

        let set = cmd
            .configure_rf_if(Path::Rx, RfFrequency::new(12.7e9), IfFrequency::new(6e9))
            .await
            .unwrap();
        assert_eq!(set.rf_hz, 12.7e9);
        assert_eq!(set.if_hz, 6e9);
        assert_eq!(set.lo_hz, 6.7e9);
    }

    #[tokio::test(start_paused = true)]
    async fn repeating_a_request_sends_the_same_line() {
        let mock = MockTransport::new();
        let cmd = commander(&mock).await;
        let line: &[u8] = b"PATH:FREQ 1 TX 0.000000 1000000.000000 10000000.000000 \r";
        let readback = reply("11000000.000000 1000000.000000 10000000.000000");
        for _ in 0..2 {
            mock.expect(line, OK);
            mock.expect(b"PATH:FREQ? 1 TX \r", &readback);
        }

        let if_ = IfFrequency::new(1e9);
        let lo = LoFrequency::new(10e9);
        let first = cmd.configure_if_lo(Path::Tx, if_, lo).await.unwrap();
        let second = cmd.configure_if_lo(Path::Tx, if_, lo).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn bypass_sends_rf_equal_to_if() {
        let mock = MockTransport::new();
        let cmd = commander(&mock).await;
        mock.expect(b"PATH:FREQ 1 RX 2000000.000000 2000000.000000 0.000000 \r", OK);
        mock.expect(b"PATH:FREQ? 1 RX \r", &reply("2000000 2000000 0"));

        let set = cmd
            .configure_bypass_frequency(Path::Rx, BypassFrequency::new(2e9))
            .await
            .unwrap();
        assert_eq!(set.lo_hz, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn lo_frequency_is_clamped_and_converted() {
        let mock = MockTransport::new();
        let cmd = commander(&mock).await;
        mock.expect(b"LOCLK:FREQ 1 TX 25300000.000000 \r", OK);
        mock.expect(b"LOCLK:FREQ? 1 TX \r", &reply("25300000.000000"));

        assert_eq!(cmd.configure_lo_frequency(Path::Tx, 30e9).await.unwrap(), 25.3e9);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_phase_clears_accumulator_and_fractional_mode() {
        let mock = MockTransport::new();
        let cmd = commander(&mock).await;
        mock.expect(b"LOCLK:FREQ? 1 RX \r", &reply("8000000.000000"));
        mock.expect(b"LOCLK:PHCUMU 1 RX 0.000000 \r", OK);
        mock.expect(b"SYN:FFRAC 1 RX 0 \r", OK);
        mock.expect(b"LOCLK:FREQ 1 RX 8000000.000000 \r", OK);
        mock.expect(b"LOCLK:FREQ? 1 RX \r", &reply("8000000.000000"));
        mock.expect(b"SYN:FFRAC? 1 RX \r", &reply("0"));

        assert_eq!(cmd.configure_phase_offset(Path::Rx, 0.0).await.unwrap(), 0.0);
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn nonzero_phase_forces_fractional_and_steps_accumulator() {
        let mock = MockTransport::new();
        let cmd = commander(&mock).await;
        mock.expect(b"LOCLK:FREQ? 1 TX \r", &reply("8000000.000000"));
        mock.expect(b"SYN:FFRAC? 1 TX \r", &reply("0"));
        mock.expect(b"SYN:FFRAC 1 TX 1 \r", OK);
        mock.expect(b"LOCLK:FREQ 1 TX 8000000.000000 \r", OK);
        mock.expect(b"LOCLK:FREQ? 1 TX \r", &reply("8000000.000000"));
        mock.expect(b"LOCLK:PHCUMU? 1 TX \r", &reply("0.000000"));
        mock.expect(b"LOCLK:PHINC 1 TX 45.000000 \r", OK);
        mock.expect(b"LOCLK:PHCUMU? 1 TX \r", &reply("45.000000"));

        assert_eq!(cmd.configure_phase_offset(Path::Tx, 45.0).await.unwrap(), 45.0);
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn phase_steps_relative_to_current_and_clamps() {
        let mock = MockTransport::new();
        let cmd = commander(&mock).await;
        mock.expect(b"LOCLK:FREQ? 1 RX \r", &reply("8000000.000000"));
        mock.expect(b"SYN:FFRAC? 1 RX \r", &reply("1"));
        mock.expect(b"LOCLK:PHCUMU? 1 RX \r", &reply("100.000000"));
        mock.expect(b"LOCLK:PHINC 1 RX 260.000000 \r", OK);
        mock.expect(b"LOCLK:PHCUMU? 1 RX \r", &reply("360.000000"));

        assert_eq!(cmd.configure_phase_offset(Path::Rx, 500.0).await.unwrap(), 360.0);
    }

    #[tokio::test(start_paused = true)]
    async fn phase_offset_reads_zero_without_forced_fractional() {
        let mock = MockTransport::new();
        let cmd = commander(&mock).await;
        mock.expect(b"SYN:FFRAC? 1 RX \r", &reply("0"));
        mock.expect(b"SYN:FFRAC? 1 RX \r", &reply("1"));
        mock.expect(b"LOCLK:PHCUMU? 1 RX \r", &reply("-12.500000"));

        assert_eq!(cmd.phase_offset(Path::Rx).await.unwrap(), 0.0);
        assert_eq!(cmd.phase_offset(Path::Rx).await.unwrap(), -12.5);
    }

    #[tokio::test(start_paused = true)]
    async fn reference_change_reapplies_both_los() {
        let mock = MockTransport::new();
        let cmd = commander(&mock).await;
        mock.expect(b"LOCLK:FREQ? 1 RX \r", &reply("8000000.000000"));
        mock.expect(b"LOCLK:FREQ? 1 TX \r", &reply("9500000.000000"));
        mock.expect(b"REFPLL:CONFIG 1 EXT 10000.000000 \r", OK);
        mock.expect(b"LOCLK:FREQ 1 RX 8000000.000000 \r", OK);
        mock.expect(b"LOCLK:FREQ? 1 RX \r", &reply("8000000.000000"));
        mock.expect(b"LOCLK:FREQ 1 TX 9500000.000000 \r", OK);
        mock.expect(b"LOCLK:FREQ? 1 TX \r", &reply("9500000.000000"));
        mock.expect(b"REFPLL:CONFIG? 1 \r", &reply("EXT 10000.000000"));

        let source = cmd
            .configure_reference_source(ReferenceSource::External10MHz)
            .await
            .unwrap();
        assert_eq!(source, ReferenceSource::External10MHz);
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn duplex_tdd_selects_path() {
        let mock = MockTransport::new();
        let cmd = commander(&mock).await;
        mock.expect(b"RFPATH:PATH 1 TDD \r", OK);
        mock.expect(b"RFPATH:TDD 1 TX \r", OK);
        mock.expect(b"RFPATH:PATH? 1 \r", &reply("TDD"));
        mock.expect(b"RFPATH:TDD? 1 \r", &reply("TX"));

        assert_eq!(
            cmd.configure_duplex_setting(DuplexSetting::TddTx).await.unwrap(),
            DuplexSetting::TddTx
        );
    }

    #[tokio::test(start_paused = true)]
    async fn duplex_fdd_skips_tdd_query() {
        let mock = MockTransport::new();
        let cmd = commander(&mock).await;
        mock.expect(b"RFPATH:PATH 1 FDD \r", OK);
        mock.expect(b"RFPATH:PATH? 1 \r", &reply("FDD"));

        assert_eq!(
            cmd.configure_duplex_setting(DuplexSetting::Fdd).await.unwrap(),
            DuplexSetting::Fdd
        );
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn synthesizer_mode_integer_and_fractional() {
        let mock = MockTransport::new();
        let cmd = commander(&mock).await;
        mock.expect(b"SYN:RFSET? 1 RX \r", &reply("80 0 0 1 1"));
        mock.expect(b"SYN:FFRAC? 1 RX \r", &reply("0"));
        mock.expect(b"SYN:RFSET? 1 RX \r", &reply("80 0 0 1 1"));
        mock.expect(b"SYN:FFRAC? 1 RX \r", &reply("1"));
        mock.expect(b"SYN:RFSET? 1 RX \r", &reply("80 1234 0 1 1"));
        mock.expect(b"SYN:FFRAC? 1 RX \r", &reply("0"));

        assert_eq!(cmd.synthesizer_mode(Path::Rx).await.unwrap(), SynthesizerMode::Integer);
        assert_eq!(cmd.synthesizer_mode(Path::Rx).await.unwrap(), SynthesizerMode::Fractional);
        assert_eq!(cmd.synthesizer_mode(Path::Rx).await.unwrap(), SynthesizerMode::Fractional);
    }

    #[tokio::test(start_paused = true)]
    async fn synthesizer_settings_power_then_enable() {
        let mock = MockTransport::new();
        let cmd = commander(&mock).await;
        mock.expect(b"SYN:POW 1 TX 15 3 \r", OK);
        mock.expect(b"SYN:EN 1 TX ON OFF \r", OK);
        mock.expect(b"SYN:POW? 1 TX \r", &reply("15 3"));
        mock.expect(b"SYN:EN? 1 TX \r", &reply("ON OFF"));

        let settings = SynthesizerSettings::new(true, false, 20, 3);
        let read = cmd.configure_synthesizer_settings(Path::Tx, settings).await.unwrap();
        assert_eq!(read, SynthesizerSettings::new(true, false, 15, 3));
    }

    #[tokio::test(start_paused = true)]
    async fn internal_reference_override_forced() {
        let mock = MockTransport::new();
        let cmd = commander(&mock).await;
        mock.expect(b"SYN:AUTOREF 1 RX 0 \r", OK);
        mock.expect(b"SYN:REFFREQ 1 RX 105000.000000 \r", OK);
        mock.expect(b"SYN:AUTOREF? 1 RX \r", &reply("0"));
        mock.expect(b"SYN:REFFREQ? 1 RX \r", &reply("105000.000000"));

        assert_eq!(
            cmd.configure_internal_reference_override(Path::Rx, InternalReferenceFrequency::Force105MHz)
                .await
                .unwrap(),
            InternalReferenceFrequency::Force105MHz
        );
    }

    #[tokio::test(start_paused = true)]
    async fn internal_reference_override_automatic() {
        let mock = MockTransport::new();
        let cmd = commander(&mock).await;
        mock.expect(b"SYN:AUTOREF 1 TX 1 \r", OK);
        mock.expect(b"SYN:AUTOREF? 1 TX \r", &reply("1"));

        assert_eq!(
            cmd.configure_internal_reference_override(Path::Tx, InternalReferenceFrequency::Automatic)
                .await
                .unwrap(),
            InternalReferenceFrequency::Automatic
        );
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn switches_round_trip() {
        let mock = MockTransport::new();
        let cmd = commander(&mock).await;
        mock.expect(b"LOCLK:EN 1 RX OFF \r", OK);
        mock.expect(b"LOCLK:EN? 1 RX \r", &reply("OFF"));
        mock.expect(b"REFPLL:OUTPUT 1 ON \r", OK);
        mock.expect(b"REFPLL:OUTPUT? 1 \r", &reply("ON"));

        assert!(!cmd.configure_lo_enable(Path::Rx, false).await.unwrap());
        assert!(cmd.configure_reference_output_enable(true).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn maintenance_accessors() {
        let mock = MockTransport::new();
        let cmd = commander(&mock).await;
        mock.expect(b"BIAS:TEMP? 1 \r", &reply("41.250000"));
        mock.expect(b"BIAS:PAVOLT? 1 2 \r", &reply("5.010000"));
        mock.expect(b"REFDAC:DAC 1 0x7ff \r", OK);
        mock.expect(b"REFDAC:DAC? 1 \r", &reply("2047"));
        mock.expect(b"REFPLL:LD? 1 \r", &reply("1"));
        mock.expect(b"CONFIG:SAVE 1 \r", OK);
        mock.expect(b"CONFIG:AUTOLOAD 1 1 \r", OK);
        mock.expect(b"CONFIG:AUTOLOAD? 1 \r", &reply("1"));

        assert_eq!(cmd.pa_temperature().await.unwrap(), 41.25);
        assert_eq!(cmd.pa_drain_voltage(2).await.unwrap(), 5.01);
        cmd.set_reference_dac(0x7ff).await.unwrap();
        assert_eq!(cmd.reference_dac().await.unwrap(), 2047.0);
        assert_eq!(cmd.reference_lock_detect().await.unwrap(), 1.0);
        cmd.save_config_to_nvm().await.unwrap();
        cmd.set_config_autoload(true).await.unwrap();
        assert!(cmd.config_autoload().await.unwrap());
        assert_eq!(mock.remaining_expectations(), 0);
    }
}

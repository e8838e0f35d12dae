//! SC2470 command vocabulary.
//!
//! Verb names, builders for every command that carries parameters, and
//! parsers for the replies. Everything here is pure; the commander pairs
//! them with a connection. Frequencies are kHz on the wire.

use fesd_core::{
    is_almost_equal, DcBias, Error, FrequencySet, InternalReferenceFrequency, Path,
    ReferenceSource, Result,
};
use fesd_text_io::message::{
    build_command, build_path_command, format_decimal, format_flag, format_hex, format_on_off,
};

use crate::planner::WireFrequencySet;

pub const PATH_FREQ: &str = "PATH:FREQ";
pub const PATH_GAIN: &str = "PATH:GAIN";
pub const PATH_GAIN_LIMITS: &str = "PATH:GAINLIM";

pub const RF_PATH_ATTENUATION: &str = "RFPATH:ATTN";
pub const RF_PATH_DUPLEX: &str = "RFPATH:PATH";
pub const RF_PATH_TDD: &str = "RFPATH:TDD";

pub const IF_PATH_ATTENUATION: &str = "IFPATH:ATTN";
pub const IF_PATH_DC_BIAS: &str = "IFPATH:DCBIAS";

pub const SYNTH_POWER: &str = "SYN:POW";
pub const SYNTH_ENABLE: &str = "SYN:EN";
pub const SYNTH_REFERENCE_FREQUENCY: &str = "SYN:REFFREQ";
pub const SYNTH_AUTO_REFERENCE: &str = "SYN:AUTOREF";
pub const SYNTH_FORCE_FRACTIONAL: &str = "SYN:FFRAC";
pub const SYNTH_RF_REGISTERS: &str = "SYN:RFSET";

pub const LO_FREQUENCY: &str = "LOCLK:FREQ";
pub const LO_ENABLE: &str = "LOCLK:EN";
pub const PHASE_INCREMENT: &str = "LOCLK:PHINC";
pub const PHASE_ACCUMULATOR: &str = "LOCLK:PHCUMU";

pub const REFERENCE_CONFIG: &str = "REFPLL:CONFIG";
pub const REFERENCE_LOCK_DETECT: &str = "REFPLL:LD";
pub const REFERENCE_OUTPUT: &str = "REFPLL:OUTPUT";
pub const REFERENCE_DAC: &str = "REFDAC:DAC";

pub const PA_DRAIN_VOLTAGE: &str = "BIAS:PAVOLT";
pub const PA_TEMPERATURE: &str = "BIAS:TEMP";

pub const CONFIG_APPLY: &str = "CONFIG:APPLY";
pub const CONFIG_DEFAULT: &str = "CONFIG:DEFAULT";
pub const CONFIG_LOAD: &str = "CONFIG:LOAD";
pub const CONFIG_SAVE: &str = "CONFIG:SAVE";
pub const CONFIG_AUTOLOAD: &str = "CONFIG:AUTOLOAD";
pub const CONFIG_AUTOPHASE: &str = "CONFIG:AUTOPHASE";

/// Internal synthesizer reference frequencies, in kHz.
pub const SYNTH_REFERENCE_100MHZ_KHZ: f64 = 100_000.0;
pub const SYNTH_REFERENCE_105MHZ_KHZ: f64 = 105_000.0;

const DUPLEX_FDD: &str = "FDD";
const DUPLEX_TDD: &str = "TDD";
const CLOCK_INTERNAL: &str = "INT";
const CLOCK_EXTERNAL: &str = "EXT";

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn set_frequencies(slot: u16, path: Path, wire: &WireFrequencySet) -> String {
    let params = [
        format_decimal(wire.rf_khz),
        format_decimal(wire.if_khz),
        format_decimal(wire.lo_khz),
    ];
    build_path_command(PATH_FREQ, slot, path, &params)
}

pub fn set_gain(slot: u16, path: Path, gain_db: f64) -> String {
    build_path_command(PATH_GAIN, slot, path, &[format_decimal(gain_db)])
}

/// Single TX attenuator.
pub fn set_tx_attenuation(slot: u16, attenuation_db: f64) -> String {
    build_path_command(RF_PATH_ATTENUATION, slot, Path::Tx, &[format_decimal(attenuation_db)])
}

/// The two RX attenuator stages, A then B.
pub fn set_rx_attenuation(slot: u16, stage_a_db: f64, stage_b_db: f64) -> String {
    let params = [format_decimal(stage_a_db), format_decimal(stage_b_db)];
    build_path_command(IF_PATH_ATTENUATION, slot, Path::Rx, &params)
}

pub fn set_dc_bias(slot: u16, path: Path, bias: DcBias) -> String {
    let params = [bias.i().to_string(), bias.q().to_string()];
    build_path_command(IF_PATH_DC_BIAS, slot, path, &params)
}

pub fn set_duplex_mode(slot: u16, tdd: bool) -> String {
    let mode = if tdd { DUPLEX_TDD } else { DUPLEX_FDD };
    build_command(RF_PATH_DUPLEX, slot, &[mode.to_string()])
}

/// Select the active path in TDD mode.
pub fn set_tdd_path(slot: u16, path: Path) -> String {
    build_path_command(RF_PATH_TDD, slot, path, &[])
}

pub fn set_synthesizer_power(slot: u16, path: Path, power_1x: u8, power_2x: u8) -> String {
    let params = [power_1x.to_string(), power_2x.to_string()];
    build_path_command(SYNTH_POWER, slot, path, &params)
}

pub fn set_synthesizer_enable(slot: u16, path: Path, enable_1x: bool, enable_2x: bool) -> String {
    let params = [format_on_off(enable_1x), format_on_off(enable_2x)];
    build_path_command(SYNTH_ENABLE, slot, path, &params)
}

pub fn set_synthesizer_reference_frequency(slot: u16, path: Path, frequency_khz: f64) -> String {
    build_path_command(SYNTH_REFERENCE_FREQUENCY, slot, path, &[format_decimal(frequency_khz)])
}

pub fn set_synthesizer_auto_reference(slot: u16, path: Path, enable: bool) -> String {
    build_path_command(SYNTH_AUTO_REFERENCE, slot, path, &[format_flag(enable)])
}

pub fn set_force_fractional(slot: u16, path: Path, enable: bool) -> String {
    build_path_command(SYNTH_FORCE_FRACTIONAL, slot, path, &[format_flag(enable)])
}

pub fn set_lo_frequency(slot: u16, path: Path, frequency_khz: f64) -> String {
    build_path_command(LO_FREQUENCY, slot, path, &[format_decimal(frequency_khz)])
}

pub fn set_lo_enable(slot: u16, path: Path, enable: bool) -> String {
    build_path_command(LO_ENABLE, slot, path, &[format_on_off(enable)])
}

/// Relative phase step in degrees.
pub fn increment_phase(slot: u16, path: Path, degrees: f64) -> String {
    build_path_command(PHASE_INCREMENT, slot, path, &[format_decimal(degrees)])
}

pub fn set_phase_accumulator(slot: u16, path: Path, degrees: f64) -> String {
    build_path_command(PHASE_ACCUMULATOR, slot, path, &[format_decimal(degrees)])
}

/// `REFPLL:CONFIG`. The internal source always runs at 100 MHz.
pub fn set_reference_config(slot: u16, source: ReferenceSource) -> String {
    let clock = match source {
        ReferenceSource::Internal => CLOCK_INTERNAL,
        ReferenceSource::External10MHz | ReferenceSource::External100MHz => CLOCK_EXTERNAL,
    };
    let params = [clock.to_string(), format_decimal(source.frequency_khz())];
    build_command(REFERENCE_CONFIG, slot, &params)
}

pub fn set_reference_output(slot: u16, enable: bool) -> String {
    build_command(REFERENCE_OUTPUT, slot, &[format_on_off(enable)])
}

pub fn set_reference_dac(slot: u16, value: u32) -> String {
    build_command(REFERENCE_DAC, slot, &[format_hex(value)])
}

/// `CONFIG:AUTOLOAD` / `CONFIG:AUTOPHASE` style 0/1 settings.
pub fn set_config_flag(name: &str, slot: u16, enable: bool) -> String {
    build_command(name, slot, &[format_flag(enable)])
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

fn fields<'a>(reply: &'a str, count: usize, what: &str) -> Result<Vec<&'a str>> {
    let fields: Vec<&str> = reply.split_whitespace().collect();
    if fields.len() < count {
        return Err(Error::invalid_response(format!(
            "{what}: expected {count} fields, got {reply:?}"
        )));
    }
    Ok(fields)
}

fn number<T: std::str::FromStr>(field: &str, what: &str) -> Result<T> {
    field
        .parse()
        .map_err(|_| Error::invalid_response(format!("{what}: {field:?} is not a number")))
}

/// A single decimal reply.
pub fn parse_decimal(reply: &str, what: &str) -> Result<f64> {
    let fields = fields(reply, 1, what)?;
    number(fields[0], what)
}

/// Two decimals (`min max`, `A B`).
pub fn parse_decimal_pair(reply: &str, what: &str) -> Result<(f64, f64)> {
    let fields = fields(reply, 2, what)?;
    Ok((number(fields[0], what)?, number(fields[1], what)?))
}

/// `PATH:FREQ?` reply (`rf if lo` in kHz) converted to Hz.
pub fn parse_frequencies(reply: &str) -> Result<FrequencySet> {
    let what = "frequency set";
    let fields = fields(reply, 3, what)?;
    let rf_khz: f64 = number(fields[0], what)?;
    let if_khz: f64 = number(fields[1], what)?;
    let lo_khz: f64 = number(fields[2], what)?;
    Ok(FrequencySet {
        rf_hz: rf_khz * 1000.0,
        if_hz: if_khz * 1000.0,
        lo_hz: lo_khz * 1000.0,
    })
}

/// `0` / `1`.
pub fn parse_flag(reply: &str, what: &str) -> Result<bool> {
    match reply.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(Error::invalid_response(format!("{what}: expected 0 or 1, got {other:?}"))),
    }
}

/// `ON` / `OFF`.
pub fn parse_on_off(reply: &str, what: &str) -> Result<bool> {
    match reply.trim() {
        "ON" => Ok(true),
        "OFF" => Ok(false),
        other => Err(Error::invalid_response(format!("{what}: expected ON or OFF, got {other:?}"))),
    }
}

/// `SYN:EN?` reply: exactly two switch tokens. Anything but `ON` reads as off.
pub fn parse_synthesizer_enables(reply: &str) -> Result<(bool, bool)> {
    let fields: Vec<&str> = reply.split_whitespace().collect();
    if fields.len() != 2 {
        return Err(Error::invalid_response(format!(
            "synthesizer enables: expected 2 fields, got {reply:?}"
        )));
    }
    Ok((fields[0] == "ON", fields[1] == "ON"))
}

/// `SYN:POW?` reply.
pub fn parse_synthesizer_power(reply: &str) -> Result<(u8, u8)> {
    let what = "synthesizer power";
    let fields = fields(reply, 2, what)?;
    Ok((number(fields[0], what)?, number(fields[1], what)?))
}

pub fn parse_dc_bias(reply: &str) -> Result<DcBias> {
    let what = "dc bias";
    let fields = fields(reply, 2, what)?;
    Ok(DcBias::new(number(fields[0], what)?, number(fields[1], what)?))
}

/// `RFPATH:PATH?` reply; `true` for TDD. Only the first three characters count.
pub fn parse_duplex_mode(reply: &str) -> Result<bool> {
    let reply = reply.trim();
    match reply.get(..3) {
        Some(DUPLEX_FDD) => Ok(false),
        Some(DUPLEX_TDD) => Ok(true),
        _ => Err(Error::invalid_response(format!("unknown duplex mode {reply:?}"))),
    }
}

/// `RFPATH:TDD?` reply.
pub fn parse_path(reply: &str) -> Result<Path> {
    match reply.trim() {
        "RX" => Ok(Path::Rx),
        "TX" => Ok(Path::Tx),
        other => Err(Error::invalid_response(format!("unknown path {other:?}"))),
    }
}

/// `SYN:REFFREQ?` reply (kHz) as a forced internal reference.
pub fn parse_synthesizer_reference(reply: &str) -> Result<InternalReferenceFrequency> {
    let khz = parse_decimal(reply, "synthesizer reference")?;
    if is_almost_equal(khz, SYNTH_REFERENCE_100MHZ_KHZ, f64::EPSILON) {
        Ok(InternalReferenceFrequency::Force100MHz)
    } else if is_almost_equal(khz, SYNTH_REFERENCE_105MHZ_KHZ, f64::EPSILON) {
        Ok(InternalReferenceFrequency::Force105MHz)
    } else {
        Err(Error::invalid_response(format!("unknown synthesizer reference {khz} kHz")))
    }
}

/// `REFPLL:CONFIG?` reply: clock source token then frequency in kHz.
pub fn parse_reference_config(reply: &str) -> Result<ReferenceSource> {
    let what = "reference config";
    let fields = fields(reply, 2, what)?;
    let khz: f64 = number(fields[1], what)?;
    let is_10mhz = is_almost_equal(khz, 10_000.0, f64::EPSILON);
    let is_100mhz = is_almost_equal(khz, 100_000.0, f64::EPSILON);

    match fields[0] {
        CLOCK_INTERNAL if is_10mhz || is_100mhz => Ok(ReferenceSource::Internal),
        CLOCK_EXTERNAL if is_10mhz => Ok(ReferenceSource::External10MHz),
        CLOCK_EXTERNAL if is_100mhz => Ok(ReferenceSource::External100MHz),
        _ => Err(Error::invalid_response(format!("unknown reference config {reply:?}"))),
    }
}

/// Synthesizer N-divider registers from `SYN:RFSET?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthesizerRegisters {
    pub int_divider: i32,
    pub frac1: u32,
    pub frac2: u32,
    pub mod2: u32,
    pub rf_divider: i32,
}

pub fn parse_synthesizer_registers(reply: &str) -> Result<SynthesizerRegisters> {
    let what = "synthesizer registers";
    let fields: Vec<&str> = reply.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(Error::invalid_response(format!(
            "{what}: expected 5 fields, got {reply:?}"
        )));
    }
    Ok(SynthesizerRegisters {
        int_divider: number(fields[0], what)?,
        frac1: number(fields[1], what)?,
        frac2: number(fields[2], what)?,
        mod2: number(fields[3], what)?,
        rf_divider: number(fields[4], what)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fesd_core::ErrorKind;

    #[test]
    fn frequencies_command() {
        let wire = WireFrequencySet {
            rf_khz: 12_700_000.0,
            if_khz: 6_000_000.0,
            lo_khz: 0.0,
        };
        assert_eq!(
            set_frequencies(1, Path::Rx, &wire),
            "PATH:FREQ 1 RX 12700000.000000 6000000.000000 0.000000 "
        );
    }

    #[test]
    fn rx_attenuation_command() {
        assert_eq!(
            set_rx_attenuation(1, 5.3, 5.0),
            "IFPATH:ATTN 1 RX 5.300000 5.000000 "
        );
    }

    #[test]
    fn tx_attenuation_command() {
        assert_eq!(set_tx_attenuation(0, 31.5), "RFPATH:ATTN 0 TX 31.500000 ");
    }

    #[test]
    fn duplex_commands() {
        assert_eq!(set_duplex_mode(1, false), "RFPATH:PATH 1 FDD ");
        assert_eq!(set_duplex_mode(1, true), "RFPATH:PATH 1 TDD ");
        assert_eq!(set_tdd_path(1, Path::Tx), "RFPATH:TDD 1 TX ");
    }

    #[test]
    fn synthesizer_commands() {
        assert_eq!(set_synthesizer_power(1, Path::Tx, 15, 3), "SYN:POW 1 TX 15 3 ");
        assert_eq!(set_synthesizer_enable(1, Path::Rx, true, false), "SYN:EN 1 RX ON OFF ");
        assert_eq!(set_force_fractional(1, Path::Rx, true), "SYN:FFRAC 1 RX 1 ");
        assert_eq!(set_synthesizer_auto_reference(0, Path::Tx, false), "SYN:AUTOREF 0 TX 0 ");
        assert_eq!(
            set_synthesizer_reference_frequency(0, Path::Rx, SYNTH_REFERENCE_105MHZ_KHZ),
            "SYN:REFFREQ 0 RX 105000.000000 "
        );
    }

    #[test]
    fn reference_commands() {
        assert_eq!(
            set_reference_config(1, ReferenceSource::Internal),
            "REFPLL:CONFIG 1 INT 100000.000000 "
        );
        assert_eq!(
            set_reference_config(1, ReferenceSource::External10MHz),
            "REFPLL:CONFIG 1 EXT 10000.000000 "
        );
        assert_eq!(set_reference_output(1, true), "REFPLL:OUTPUT 1 ON ");
        assert_eq!(set_reference_dac(1, 2048), "REFDAC:DAC 1 0x800 ");
    }

    #[test]
    fn dc_bias_command() {
        assert_eq!(
            set_dc_bias(1, Path::Rx, DcBias::new(-12, 40)),
            "IFPATH:DCBIAS 1 RX -12 40 "
        );
    }

    #[test]
    fn config_flag_command() {
        assert_eq!(set_config_flag(CONFIG_AUTOLOAD, 1, true), "CONFIG:AUTOLOAD 1 1 ");
    }

    #[test]
    fn parse_frequencies_converts_to_hz() {
        let set = parse_frequencies("12700000.000000 6000000.000000 6700000.000000").unwrap();
        assert_eq!(set.rf_hz, 12.7e9);
        assert_eq!(set.if_hz, 6e9);
        assert_eq!(set.lo_hz, 6.7e9);
    }

    #[test]
    fn parse_frequencies_short_reply() {
        let err = parse_frequencies("12700000.000000 6000000.000000").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Communication);
    }

    #[test]
    fn parse_decimal_rejects_text() {
        assert!(parse_decimal("abc", "gain").is_err());
        assert!(parse_decimal("", "gain").is_err());
        assert_eq!(parse_decimal(" 12.5 ", "gain").unwrap(), 12.5);
    }

    #[test]
    fn parse_flags_and_switches() {
        assert!(parse_flag("1", "x").unwrap());
        assert!(!parse_flag("0", "x").unwrap());
        assert!(parse_flag("2", "x").is_err());
        assert!(parse_on_off("ON", "x").unwrap());
        assert!(parse_on_off("on", "x").is_err());
    }

    #[test]
    fn parse_enables() {
        assert_eq!(parse_synthesizer_enables("ON OFF").unwrap(), (true, false));
        assert!(parse_synthesizer_enables("ON").is_err());
    }

    #[test]
    fn parse_duplex_uses_prefix() {
        assert!(!parse_duplex_mode("FDD").unwrap());
        assert!(parse_duplex_mode("TDD_MODE").unwrap());
        assert!(parse_duplex_mode("XX").is_err());
    }

    #[test]
    fn parse_reference_config_variants() {
        assert_eq!(
            parse_reference_config("INT 100000.000000").unwrap(),
            ReferenceSource::Internal
        );
        assert_eq!(
            parse_reference_config("EXT 10000.000000").unwrap(),
            ReferenceSource::External10MHz
        );
        assert_eq!(
            parse_reference_config("EXT 100000").unwrap(),
            ReferenceSource::External100MHz
        );
        assert!(parse_reference_config("EXT 50000").is_err());
        assert!(parse_reference_config("GPS 10000").is_err());
        assert!(parse_reference_config("INT").is_err());
    }

    #[test]
    fn parse_synthesizer_reference_values() {
        assert_eq!(
            parse_synthesizer_reference("105000.000000").unwrap(),
            InternalReferenceFrequency::Force105MHz
        );
        assert!(parse_synthesizer_reference("99000").is_err());
    }

    #[test]
    fn parse_registers() {
        let regs = parse_synthesizer_registers("120 0 0 1 2").unwrap();
        assert_eq!(regs.int_divider, 120);
        assert_eq!(regs.frac1, 0);
        assert_eq!(regs.rf_divider, 2);
        assert!(parse_synthesizer_registers("120 0 0 1").is_err());
    }

    #[test]
    fn parse_bias_clamps() {
        assert_eq!(parse_dc_bias("3000 -7").unwrap(), DcBias::new(2047, -7));
    }
}

//! Core types used throughout fesd.
//!
//! These are the value types that flow between the command layer and the
//! caller: signal path selectors, range-clamped frequencies, and the small
//! enumerations the instrument reports or accepts.

use std::fmt;
use std::str::FromStr;

/// Signal chain a command applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Path {
    /// Receive (down-conversion) chain.
    Rx,
    /// Transmit (up-conversion) chain.
    Tx,
}

impl Path {
    /// Both paths, in wire order.
    pub const ALL: [Path; 2] = [Path::Rx, Path::Tx];

    /// Wire token for this path.
    pub fn as_str(&self) -> &'static str {
        match self {
            Path::Rx => "RX",
            Path::Tx => "TX",
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string cannot be parsed into a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePathError(String);

impl fmt::Display for ParsePathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown path: {} (expected RX or TX)", self.0)
    }
}

impl std::error::Error for ParsePathError {}

impl FromStr for Path {
    type Err = ParsePathError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "RX" => Ok(Path::Rx),
            "TX" => Ok(Path::Tx),
            _ => Err(ParsePathError(s.to_string())),
        }
    }
}

macro_rules! clamped_frequency {
    ($(#[$meta:meta])* $name:ident, $min:expr, $max:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
        pub struct $name(f64);

        impl $name {
            /// Lowest accepted frequency in hertz.
            pub const MIN_HZ: f64 = $min;
            /// Highest accepted frequency in hertz.
            pub const MAX_HZ: f64 = $max;

            /// Clamp `hz` into `[MIN_HZ, MAX_HZ]`. NaN becomes `MIN_HZ`.
            pub fn new(hz: f64) -> Self {
                if hz.is_nan() {
                    return $name(Self::MIN_HZ);
                }
                $name(hz.clamp(Self::MIN_HZ, Self::MAX_HZ))
            }

            /// Frequency in hertz.
            pub fn hz(&self) -> f64 {
                self.0
            }

            /// Frequency in kilohertz, the unit used on the wire.
            pub fn khz(&self) -> f64 {
                self.0 / 1000.0
            }
        }

        impl From<$name> for f64 {
            fn from(f: $name) -> f64 {
                f.0
            }
        }
    };
}

clamped_frequency!(
    /// RF port frequency, clamped to 6.7 GHz ..= 26 GHz.
    RfFrequency,
    6.7e9,
    26e9
);

clamped_frequency!(
    /// IF port frequency, clamped to 700 MHz ..= 6 GHz.
    IfFrequency,
    700e6,
    6e9
);

clamped_frequency!(
    /// Local oscillator frequency, clamped to 6 GHz ..= 25.3 GHz.
    LoFrequency,
    6e9,
    25.3e9
);

clamped_frequency!(
    /// Bypass frequency (RF tied to IF, no mixing), clamped to 50 MHz ..= 8.5 GHz.
    BypassFrequency,
    50e6,
    8.5e9
);

/// An RF/IF/LO triple in hertz, as reported by the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrequencySet {
    pub rf_hz: f64,
    pub if_hz: f64,
    pub lo_hz: f64,
}

impl fmt::Display for FrequencySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RF {:.6} GHz, IF {:.6} GHz, LO {:.6} GHz",
            self.rf_hz / 1e9,
            self.if_hz / 1e9,
            self.lo_hz / 1e9
        )
    }
}

/// Calibrated gain range of one path, in dB.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GainLimits {
    pub min_db: f64,
    pub max_db: f64,
}

impl GainLimits {
    /// Clamp `gain_db` into this range.
    pub fn clamp(&self, gain_db: f64) -> f64 {
        gain_db.max(self.min_db).min(self.max_db)
    }
}

/// IQ mixer DC offset correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DcBias {
    i: i32,
    q: i32,
}

impl DcBias {
    pub const MIN: i32 = -2048;
    pub const MAX: i32 = 2047;

    /// Create a bias pair, clamping each component to `MIN..=MAX`.
    pub fn new(i: i32, q: i32) -> Self {
        DcBias {
            i: i.clamp(Self::MIN, Self::MAX),
            q: q.clamp(Self::MIN, Self::MAX),
        }
    }

    pub fn i(&self) -> i32 {
        self.i
    }

    pub fn q(&self) -> i32 {
        self.q
    }
}

/// Output enables and power levels of the two synthesizer outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SynthesizerSettings {
    pub enable_1x: bool,
    pub enable_2x: bool,
    power_level_1x: u8,
    power_level_2x: u8,
}

impl SynthesizerSettings {
    pub const MAX_POWER_LEVEL: u8 = 15;

    /// Create settings, clamping both power levels to `0..=15`.
    pub fn new(enable_1x: bool, enable_2x: bool, power_level_1x: u8, power_level_2x: u8) -> Self {
        SynthesizerSettings {
            enable_1x,
            enable_2x,
            power_level_1x: power_level_1x.min(Self::MAX_POWER_LEVEL),
            power_level_2x: power_level_2x.min(Self::MAX_POWER_LEVEL),
        }
    }

    pub fn power_level_1x(&self) -> u8 {
        self.power_level_1x
    }

    pub fn power_level_2x(&self) -> u8 {
        self.power_level_2x
    }
}

/// Duplex routing of the two paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DuplexSetting {
    /// Both paths active simultaneously.
    Fdd,
    /// Time-shared, receive path active.
    TddRx,
    /// Time-shared, transmit path active.
    TddTx,
}

impl fmt::Display for DuplexSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DuplexSetting::Fdd => "FDD",
            DuplexSetting::TddRx => "TDD-RX",
            DuplexSetting::TddTx => "TDD-TX",
        };
        f.write_str(s)
    }
}

/// Error returned when a string cannot be parsed into a [`DuplexSetting`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDuplexError(String);

impl fmt::Display for ParseDuplexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown duplex setting: {}", self.0)
    }
}

impl std::error::Error for ParseDuplexError {}

impl FromStr for DuplexSetting {
    type Err = ParseDuplexError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().replace('_', "-").as_str() {
            "FDD" => Ok(DuplexSetting::Fdd),
            "TDD-RX" | "TDDRX" => Ok(DuplexSetting::TddRx),
            "TDD-TX" | "TDDTX" => Ok(DuplexSetting::TddTx),
            _ => Err(ParseDuplexError(s.to_string())),
        }
    }
}

/// Reference clock source of the synthesizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceSource {
    Internal,
    External10MHz,
    External100MHz,
}

impl ReferenceSource {
    /// Reference frequency in kHz as carried by `REFPLL:CONFIG`.
    pub fn frequency_khz(&self) -> f64 {
        match self {
            ReferenceSource::Internal | ReferenceSource::External100MHz => 100_000.0,
            ReferenceSource::External10MHz => 10_000.0,
        }
    }
}

impl fmt::Display for ReferenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReferenceSource::Internal => "internal",
            ReferenceSource::External10MHz => "external 10 MHz",
            ReferenceSource::External100MHz => "external 100 MHz",
        };
        f.write_str(s)
    }
}

/// Internal reference frequency selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalReferenceFrequency {
    /// The instrument picks 100 or 105 MHz per frequency plan.
    Automatic,
    Force100MHz,
    Force105MHz,
}

impl fmt::Display for InternalReferenceFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InternalReferenceFrequency::Automatic => "automatic",
            InternalReferenceFrequency::Force100MHz => "100 MHz",
            InternalReferenceFrequency::Force105MHz => "105 MHz",
        };
        f.write_str(s)
    }
}

/// Synthesizer N-divider mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SynthesizerMode {
    Integer,
    Fractional,
}

impl fmt::Display for SynthesizerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthesizerMode::Integer => f.write_str("integer"),
            SynthesizerMode::Fractional => f.write_str("fractional"),
        }
    }
}

/// Role of a device on a shared serial bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemRole {
    Controller,
    Peripheral,
}

impl SystemRole {
    /// Wire token used by `SYS:ROLE`.
    pub fn as_wire(&self) -> &'static str {
        match self {
            SystemRole::Controller => "MASTER",
            SystemRole::Peripheral => "SLAVE",
        }
    }
}

impl fmt::Display for SystemRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemRole::Controller => f.write_str("controller"),
            SystemRole::Peripheral => f.write_str("peripheral"),
        }
    }
}

/// Device family identified from `*IDN?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceType {
    #[default]
    Undefined,
    Sc2470,
}

impl DeviceType {
    /// Classify the model field of an identification reply.
    pub fn from_model(model: &str) -> Self {
        match model.trim() {
            "SC2470" => DeviceType::Sc2470,
            _ => DeviceType::Undefined,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Undefined => f.write_str("undefined"),
            DeviceType::Sc2470 => f.write_str("SC2470"),
        }
    }
}

/// Identification of one discovered device.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceInfo {
    pub slot_id: u16,
    pub device_type: DeviceType,
    pub serial_number: u32,
    pub serial_number_str: String,
    pub firmware_version: f64,
    pub hardware_version: f64,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} serial {} (slot {}, fw {}, hw {})",
            self.device_type,
            self.serial_number_str,
            self.slot_id,
            self.firmware_version,
            self.hardware_version
        )
    }
}

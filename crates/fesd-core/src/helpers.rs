//! Floating-point comparison and formatting helpers.
//!
//! Instrument replies carry decimal values that must be matched against
//! known constants (reference frequencies) or tested for "unset" (zero),
//! so exact float equality is never used on device data.

/// Absolute epsilon used for every "is this value zero" decision: unset
/// frequency fields, degenerate gain-limit ranges, a zero phase request.
pub const ZERO_EPSILON: f64 = 0.001;

/// Relative-epsilon comparison.
///
/// `a` and `b` are equal when `|a - b| <= |a + b| * epsilon`. Using the sum
/// rather than the larger magnitude is slightly more lenient. Pass
/// `f64::EPSILON` for general comparisons.
///
/// # Example
///
/// ```
/// use fesd_core::is_almost_equal;
///
/// assert!(is_almost_equal(100_000.0, 100_000.0, f64::EPSILON));
/// assert!(!is_almost_equal(100_000.0, 105_000.0, f64::EPSILON));
/// ```
pub fn is_almost_equal(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() <= (a + b).abs() * epsilon
}

/// Absolute-epsilon comparison against zero.
///
/// # Example
///
/// ```
/// use fesd_core::{is_almost_equal_to_zero, ZERO_EPSILON};
///
/// assert!(is_almost_equal_to_zero(0.0005, ZERO_EPSILON));
/// assert!(!is_almost_equal_to_zero(0.01, ZERO_EPSILON));
/// ```
pub fn is_almost_equal_to_zero(a: f64, epsilon: f64) -> bool {
    a == 0.0 || a.abs() <= epsilon
}

/// Format a frequency in hertz as a human-readable GHz string.
///
/// # Example
///
/// ```
/// use fesd_core::format_freq_ghz;
///
/// assert_eq!(format_freq_ghz(12.7e9), "12.700000 GHz");
/// ```
pub fn format_freq_ghz(freq_hz: f64) -> String {
    let ghz = freq_hz / 1e9;
    format!("{ghz:.6} GHz")
}

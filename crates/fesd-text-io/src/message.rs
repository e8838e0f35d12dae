//! Command and query construction.
//!
//! Every line sent to an instrument has the form
//! `<VERB>[?] <slot> [RX|TX] <param> <param> ... ` with single-space
//! separators. The trailing space is accepted by the instrument. No range
//! checking happens here; callers clamp before formatting.

use fesd_core::Path;

/// Appended to a verb to turn a command into a query.
pub const QUERY_MARKER: char = '?';

const PARAM_DELIM: char = ' ';

/// Build a command addressed to `slot_id`.
///
/// ```
/// use fesd_text_io::message::build_command;
///
/// assert_eq!(build_command("CONFIG:SAVE", 1, &[]), "CONFIG:SAVE 1 ");
/// assert_eq!(
///     build_command("REFDAC:DAC", 0, &["0x1f4".to_string()]),
///     "REFDAC:DAC 0 0x1f4 "
/// );
/// ```
pub fn build_command(name: &str, slot_id: u16, params: &[String]) -> String {
    let mut message = String::with_capacity(name.len() + 8 + params.len() * 16);
    message.push_str(name);
    message.push(PARAM_DELIM);
    message.push_str(&slot_id.to_string());
    message.push(PARAM_DELIM);
    for param in params {
        message.push_str(param);
        message.push(PARAM_DELIM);
    }
    message
}

/// Build a command with the path token as its first parameter.
pub fn build_path_command(name: &str, slot_id: u16, path: Path, params: &[String]) -> String {
    let mut all = Vec::with_capacity(params.len() + 1);
    all.push(path.as_str().to_string());
    all.extend_from_slice(params);
    build_command(name, slot_id, &all)
}

/// Build the query form of `name`.
///
/// ```
/// use fesd_text_io::message::build_query;
///
/// assert_eq!(build_query("*IDN", 1, &[]), "*IDN? 1 ");
/// ```
pub fn build_query(name: &str, slot_id: u16, params: &[String]) -> String {
    build_command(&query_name(name), slot_id, params)
}

/// Build the query form of `name` for one path.
pub fn build_path_query(name: &str, slot_id: u16, path: Path, params: &[String]) -> String {
    build_path_command(&query_name(name), slot_id, path, params)
}

fn query_name(name: &str) -> String {
    let mut query = String::with_capacity(name.len() + 1);
    query.push_str(name);
    query.push(QUERY_MARKER);
    query
}

/// Fixed six-decimal rendering, never in exponent form.
///
/// ```
/// use fesd_text_io::message::format_decimal;
///
/// assert_eq!(format_decimal(12_700_000.0), "12700000.000000");
/// assert_eq!(format_decimal(5.3), "5.300000");
/// ```
pub fn format_decimal(value: f64) -> String {
    format!("{value:.6}")
}

/// `1` / `0`.
pub fn format_flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

/// `ON` / `OFF`.
pub fn format_on_off(value: bool) -> String {
    if value { "ON" } else { "OFF" }.to_string()
}

/// Lowercase hexadecimal with a `0x` prefix.
pub fn format_hex(value: u32) -> String {
    format!("0x{value:x}")
}

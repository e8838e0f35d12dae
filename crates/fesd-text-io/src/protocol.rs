//! Response framing for the instrument's text console.
//!
//! A complete reply is everything the instrument writes before its `>`
//! prompt. The line immediately before the prompt carries the status: `OK`
//! for success, `ERR` for a rejected command. Devices reached through a
//! controller on a shared bus prepend `[ <id> ] ` to each line they emit.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

/// The prompt byte that ends every reply.
pub const PROMPT: u8 = b'>';

/// Appended to every line written to the instrument.
pub const LINE_TERMINATOR: u8 = b'\r';

/// ASCII ETX; makes the instrument discard a partially entered command.
pub const ETX: u8 = 0x03;

/// Status line of a successful command.
pub const SUCCESS_STATUS: &str = "OK";

/// Status line of a rejected command.
pub const ERROR_STATUS: &str = "ERR";

static PERIPHERAL_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[ [0-9]+ \] ?").expect("valid peripheral token regex"));

/// Result of attempting to decode one reply from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// The command succeeded. Payload lines are joined with `\n`, with the
    /// status line and peripheral tokens removed.
    Payload(String),

    /// The instrument answered `ERR`.
    Rejected,

    /// No prompt yet. More data is needed.
    Incomplete,
}

/// Frame `message` as one command line.
pub fn encode_line(message: &str) -> Vec<u8> {
    let mut line = Vec::with_capacity(message.len() + 1);
    line.extend_from_slice(message.as_bytes());
    line.push(LINE_TERMINATOR);
    line
}

/// Remove `[ <id> ] ` routing tokens from a line.
pub fn strip_peripheral_tokens(line: &str) -> Cow<'_, str> {
    PERIPHERAL_TOKEN.replace_all(line, "")
}

/// Decode the reply accumulated in `buf`.
///
/// Bytes after the first prompt are ignored.
pub fn decode_response(buf: &[u8]) -> DecodeResult {
    let prompt_pos = match buf.iter().position(|&b| b == PROMPT) {
        Some(pos) => pos,
        None => return DecodeResult::Incomplete,
    };

    let body = String::from_utf8_lossy(&buf[..prompt_pos]);
    let mut lines: Vec<String> = body
        .split(['\r', '\n'])
        .map(|line| strip_peripheral_tokens(line).trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    match lines.last() {
        Some(status) if status.ends_with(ERROR_STATUS) => return DecodeResult::Rejected,
        Some(status) if status == SUCCESS_STATUS => {
            lines.pop();
        }
        _ => {}
    }

    DecodeResult::Payload(lines.join("\n"))
}

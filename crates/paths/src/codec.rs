//! Textual encodings used by transcript lines.
//!
//! Path names are whitespace-separated fields, so whitespace and the escape
//! character itself are written as two-character escapes and remaining
//! non-printable bytes as `\xHH`. Digest values and finder-info blobs travel
//! as standard base64.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

/// Failures while decoding an encoded path or a base64 field.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// A backslash escape that is not one of `\t \n \r "\ " \\ \xHH`.
    #[error("invalid escape sequence at byte {0}")]
    BadEscape(usize),
    /// Input ended in the middle of an escape sequence.
    #[error("truncated escape sequence")]
    Truncated,
    /// A base64 field failed to decode.
    #[error("invalid base64: {0}")]
    Base64(String),
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Encodes a raw path for embedding in a transcript line.
///
/// Whitespace and the backslash become two-character escapes; control bytes
/// and DEL become `\xHH`. Bytes at or above 0x80 pass through so UTF-8 names
/// stay readable.
pub fn encode(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    for &b in raw {
        match b {
            b'\t' => out.push_str("\\t"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b' ' => out.push_str("\\ "),
            b'\\' => out.push_str("\\\\"),
            0x00..=0x1f | 0x7f => out.push_str(&format!("\\x{b:02x}")),
            _ => out.push(b as char),
        }
    }
    out
}

/// Decodes an encoded path back to raw bytes.
///
/// Exact inverse of [`encode`]; any other escape is an error.
pub fn decode(printable: &str) -> Result<Vec<u8>, CodecError> {
    let bytes = printable.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b != b'\\' {
            out.push(b);
            i += 1;
            continue;
        }
        let esc = *bytes.get(i + 1).ok_or(CodecError::Truncated)?;
        match esc {
            b't' => out.push(b'\t'),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b' ' => out.push(b' '),
            b'\\' => out.push(b'\\'),
            b'x' => {
                let hi = bytes.get(i + 2).copied().ok_or(CodecError::Truncated)?;
                let lo = bytes.get(i + 3).copied().ok_or(CodecError::Truncated)?;
                let hi = hex_digit(hi).ok_or(CodecError::BadEscape(i))?;
                let lo = hex_digit(lo).ok_or(CodecError::BadEscape(i))?;
                out.push((hi << 4) | lo);
                i += 4;
                continue;
            }
            _ => return Err(CodecError::BadEscape(i)),
        }
        i += 2;
    }
    Ok(out)
}

/// Splits a transcript or command-file line into fields.
///
/// Like a whitespace split, except a backslash escapes the following byte,
/// so encoded names containing `\ ` stay one field. The escapes themselves
/// are preserved for [`decode`].
pub fn split_fields(line: &str) -> Vec<&str> {
    let bytes = line.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        let start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
            if bytes[i] == b'\\' && bytes.get(i + 1).is_some_and(u8::is_ascii) {
                i += 2;
            } else {
                i += 1;
            }
        }
        out.push(&line[start..i]);
    }
    out
}

/// Standard base64 encoding for digest values.
pub fn b64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Standard base64 decoding for digest values.
pub fn b64_decode(text: &str) -> Result<Vec<u8>, CodecError> {
    STANDARD
        .decode(text)
        .map_err(|e| CodecError::Base64(e.to_string()))
}

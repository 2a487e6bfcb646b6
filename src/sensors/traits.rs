// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Transport trait and text decoding

use std::borrow::Cow;
use std::io::{self, Read};

use serde::{Deserialize, Serialize};

/// Byte encoding used by the board firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// ISO-8859-1; every byte maps to one character
    #[default]
    Latin1,
    /// UTF-8 with invalid sequences replaced by U+FFFD
    Utf8,
}

impl Encoding {
    /// Decode without failing; bad bytes are replaced, never dropped
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        match self {
            Encoding::Latin1 => {
                if bytes.is_ascii() {
                    // ASCII is valid UTF-8
                    String::from_utf8_lossy(bytes)
                } else {
                    Cow::Owned(bytes.iter().map(|&b| b as char).collect())
                }
            }
            Encoding::Utf8 => String::from_utf8_lossy(bytes),
        }
    }
}

/// A byte stream from a sensor board.
///
/// `read` blocks for at most the transport's timeout; a timeout is reported as
/// `ErrorKind::TimedOut` or `ErrorKind::WouldBlock` and means "no data yet".
pub trait Transport: Read + Send {
    /// Human readable name for logs
    fn name(&self) -> &str;

    /// Bytes that can be read right now without waiting
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// True once the transport can never produce more data
    fn is_finished(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin1_decodes_accented_bytes() {
        let bytes = b"Sensor de vibraci\xf3n: ACTIVADO";
        assert_eq!(Encoding::Latin1.decode(bytes), "Sensor de vibración: ACTIVADO");
    }

    #[test]
    fn test_utf8_replaces_invalid_bytes() {
        let bytes = b"Temp\xff: 20";
        let decoded = Encoding::Utf8.decode(bytes);
        assert_eq!(decoded, "Temp\u{FFFD}: 20");
        assert_eq!(decoded.chars().count(), bytes.len());
    }
}

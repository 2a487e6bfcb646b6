// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Replays captured board output for demos and testing

use std::io::{self, Read};
use std::path::Path;

use tracing::info;

use super::Transport;
use crate::error::TransportError;

/// Feeds recorded bytes back one line per poll, like a slow board would
pub struct ReplayTransport {
    name: String,
    data: Vec<u8>,
    position: usize,
}

impl ReplayTransport {
    pub fn from_bytes(name: &str, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.to_string(),
            data: data.into(),
            position: 0,
        }
    }

    pub fn open(path: &Path) -> Result<Self, TransportError> {
        let data = std::fs::read(path).map_err(|e| TransportError::Open {
            target: path.display().to_string(),
            reason: e.to_string(),
        })?;

        info!("Replaying {} bytes from {:?}", data.len(), path);
        Ok(Self::from_bytes(&path.display().to_string(), data))
    }

    fn remaining(&self) -> &[u8] {
        &self.data[self.position..]
    }
}

impl Read for ReplayTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.remaining().len().min(buf.len());
        buf[..n].copy_from_slice(&self.remaining()[..n]);
        self.position += n;
        Ok(n)
    }
}

impl Transport for ReplayTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        let rest = self.remaining();
        Ok(match rest.iter().position(|&b| b == b'\n') {
            Some(newline) => newline + 1,
            None => rest.len(),
        })
    }

    fn is_finished(&self) -> bool {
        self.position >= self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_line_per_poll() {
        let mut replay = ReplayTransport::from_bytes("test", "first\nsecond\nthird");
        let mut buf = [0u8; 64];

        let n = replay.bytes_available().unwrap();
        assert_eq!(replay.read(&mut buf[..n]).unwrap(), 6);
        assert_eq!(&buf[..6], b"first\n");

        let n = replay.bytes_available().unwrap();
        replay.read(&mut buf[..n]).unwrap();
        let n = replay.bytes_available().unwrap();
        assert_eq!(n, 5);
        replay.read(&mut buf[..n]).unwrap();

        assert!(replay.is_finished());
        assert_eq!(replay.bytes_available().unwrap(), 0);
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let err = ReplayTransport::open(Path::new("/nonexistent/capture.log"));
        assert!(matches!(err, Err(TransportError::Open { .. })));
    }
}

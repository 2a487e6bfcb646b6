// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Line reader - turns transport bytes into trimmed text lines

use std::collections::VecDeque;
use std::io::ErrorKind;

use tracing::{debug, trace};

use super::{Encoding, Transport};
use crate::error::TransportError;

const READ_CHUNK: usize = 4096;

/// Lazy, non-restartable sequence of lines from a transport.
///
/// Bytes are split on `\n` before decoding so a bad byte can never swallow a
/// line boundary. Empty lines are filtered out.
pub struct LineReader {
    transport: Box<dyn Transport>,
    encoding: Encoding,
    pending: Vec<u8>,
    ready: VecDeque<String>,
    exhausted: bool,
}

impl LineReader {
    pub fn new(transport: Box<dyn Transport>, encoding: Encoding) -> Self {
        Self {
            transport,
            encoding,
            pending: Vec::new(),
            ready: VecDeque::new(),
            exhausted: false,
        }
    }

    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    /// No more lines will ever be produced
    pub fn is_exhausted(&self) -> bool {
        self.exhausted && self.ready.is_empty()
    }

    /// Read whatever is buffered on the transport and return the complete
    /// lines it yields. Never waits for data that has not arrived yet.
    pub fn drain_ready(&mut self) -> Result<Vec<String>, TransportError> {
        let available = self.transport.bytes_available()?;
        if available > 0 {
            self.fill(available.min(READ_CHUNK))?;
        } else if self.transport.is_finished() {
            self.finish();
        }
        Ok(self.ready.drain(..).collect())
    }

    /// One bounded read; `Ok(false)` means nothing arrived before the timeout
    fn fill(&mut self, max: usize) -> Result<bool, TransportError> {
        let mut chunk = vec![0u8; max];
        match self.transport.read(&mut chunk) {
            Ok(0) => {
                self.finish();
                Ok(false)
            }
            Ok(n) => {
                trace!("Read {} bytes from {}", n, self.transport.name());
                self.pending.extend_from_slice(&chunk[..n]);
                self.split_lines();
                Ok(true)
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(false),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn split_lines(&mut self) {
        while let Some(newline) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=newline).collect();
            self.push_line(&raw[..newline]);
        }
    }

    /// Flush a trailing unterminated line once the stream ends
    fn finish(&mut self) {
        if self.exhausted {
            return;
        }
        self.exhausted = true;
        if !self.pending.is_empty() {
            let raw = std::mem::take(&mut self.pending);
            self.push_line(&raw);
        }
        debug!("Transport {} reached end of stream", self.transport.name());
    }

    fn push_line(&mut self, raw: &[u8]) {
        let text = self.encoding.decode(raw);
        let line = text.trim();
        if !line.is_empty() {
            self.ready.push_back(line.to_string());
        }
    }
}

impl Iterator for LineReader {
    type Item = Result<String, TransportError>;

    /// Blocks in timeout-bounded reads until a line arrives. Ends only when
    /// the transport reports end of stream.
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Some(Ok(line));
            }
            if self.exhausted {
                return None;
            }
            if self.transport.is_finished() {
                self.finish();
                continue;
            }
            if let Err(e) = self.fill(READ_CHUNK) {
                return Some(Err(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::ReplayTransport;
    use std::io::{self, Read};

    fn reader(data: &[u8]) -> LineReader {
        LineReader::new(
            Box::new(ReplayTransport::from_bytes("test", data.to_vec())),
            Encoding::Latin1,
        )
    }

    #[test]
    fn test_iterates_trimmed_non_empty_lines() {
        let lines: Vec<String> = reader(b"  Temperatura actual: 25.5 C \r\n\r\n\nJSON_START\nlast")
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines, vec!["Temperatura actual: 25.5 C", "JSON_START", "last"]);
    }

    #[test]
    fn test_bad_bytes_do_not_merge_lines() {
        let mut reader = LineReader::new(
            Box::new(ReplayTransport::from_bytes("test", b"a\xff\xfe\nb\n".to_vec())),
            Encoding::Utf8,
        );
        let lines: Vec<String> = reader.by_ref().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["a\u{FFFD}\u{FFFD}", "b"]);
        assert!(reader.is_exhausted());
    }

    #[test]
    fn test_drain_ready_returns_buffered_lines_only() {
        let mut reader = reader(b"one\ntwo\n");
        assert_eq!(reader.drain_ready().unwrap(), vec!["one"]);
        assert_eq!(reader.drain_ready().unwrap(), vec!["two"]);
        assert!(reader.drain_ready().unwrap().is_empty());
        assert!(reader.is_exhausted());
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::BrokenPipe, "unplugged"))
        }
    }

    impl Transport for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn bytes_available(&mut self) -> io::Result<usize> {
            Ok(8)
        }
    }

    struct Silent;

    impl Read for Silent {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::TimedOut, "no data"))
        }
    }

    impl Transport for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        fn bytes_available(&mut self) -> io::Result<usize> {
            Ok(1)
        }
    }

    #[test]
    fn test_transport_failure_is_reported() {
        let mut reader = LineReader::new(Box::new(Broken), Encoding::Latin1);
        assert!(matches!(reader.drain_ready(), Err(TransportError::Io(_))));
        assert!(matches!(reader.next(), Some(Err(TransportError::Io(_)))));
    }

    #[test]
    fn test_timeout_is_not_an_error() {
        let mut reader = LineReader::new(Box::new(Silent), Encoding::Latin1);
        assert!(reader.drain_ready().unwrap().is_empty());
        assert!(!reader.is_exhausted());
    }
}

// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Serial port link to the sensor board

use std::io::{self, Read};

use serialport::SerialPort;
use tracing::info;

use super::Transport;
use crate::config::SerialConfig;
use crate::error::TransportError;

/// Sensor board attached over USB serial
pub struct SerialTransport {
    name: String,
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn open(config: &SerialConfig) -> Result<Self, TransportError> {
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(config.timeout())
            .open()
            .map_err(|e| TransportError::Open {
                target: config.port.clone(),
                reason: e.to_string(),
            })?;

        info!("Opened serial port {} at {} baud", config.port, config.baud_rate);

        Ok(Self {
            name: config.port.clone(),
            port,
        })
    }
}

impl Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Transport for SerialTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(io::Error::from)
    }
}

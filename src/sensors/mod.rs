//! Sensor board transports and the line reader

mod traits;
mod reader;
mod replay;
#[cfg(feature = "serial")]
mod serial;

pub use traits::{Encoding, Transport};
pub use reader::LineReader;
pub use replay::ReplayTransport;
#[cfg(feature = "serial")]
pub use serial::SerialTransport;

use crate::config::SerialConfig;
use crate::error::TransportError;

/// Open the configured link: a replay file when one is set, otherwise the
/// serial port.
pub fn open_transport(config: &SerialConfig) -> Result<Box<dyn Transport>, TransportError> {
    if let Some(path) = &config.replay_file {
        return Ok(Box::new(ReplayTransport::open(path)?));
    }

    #[cfg(feature = "serial")]
    {
        Ok(Box::new(SerialTransport::open(config)?))
    }

    #[cfg(not(feature = "serial"))]
    {
        Err(TransportError::Unsupported(format!(
            "serial port {} (build with --features serial or use --replay)",
            config.port
        )))
    }
}

/// Open the link and wrap it in a line reader
pub fn open_reader(config: &SerialConfig) -> Result<LineReader, TransportError> {
    Ok(LineReader::new(open_transport(config)?, config.encoding))
}

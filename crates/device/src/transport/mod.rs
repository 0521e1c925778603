//! Transport layer for the device link.
//!
//! A [`Transport`] is one open, line-oriented connection; a
//! [`TransportFactory`] enumerates candidate ports and opens transports.
//! Closing a transport is dropping it.

use std::time::Duration;

use serde::Serialize;

use crate::error::DeviceResult;

pub mod mock;
mod serial;

pub use serial::{SerialTransport, SerialTransportFactory};

/// Upper bound on buffered bytes without a line terminator.
pub(crate) const MAX_PARTIAL_LINE: usize = 64 * 1024;

/// One open link to the device.
pub trait Transport: Send {
    /// Port name this transport was opened on.
    fn port(&self) -> &str;

    /// Bytes waiting to be read, including any buffered partial line.
    fn bytes_pending(&mut self) -> DeviceResult<usize>;

    /// Read one complete line without its terminator.
    ///
    /// Never blocks waiting for data; returns `None` when no complete line
    /// is available yet.
    fn read_line(&mut self) -> DeviceResult<Option<String>>;

    /// Write raw bytes to the device.
    fn write_all(&mut self, data: &[u8]) -> DeviceResult<()>;

    /// Change the per-call I/O timeout on the open link.
    fn set_timeout(&mut self, timeout: Duration) -> DeviceResult<()>;
}

/// A port visible to the host, with whatever description the OS reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortCandidate {
    pub name: String,
    pub description: String,
}

/// Enumerates and opens transports.
pub trait TransportFactory: Send + Sync {
    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> DeviceResult<Box<dyn Transport>>;

    fn candidates(&self) -> Vec<PortCandidate>;
}

/// Split the first complete line off `buffer`, dropping `\r\n` / `\n`.
pub(crate) fn take_line(buffer: &mut Vec<u8>) -> Option<String> {
    let pos = buffer.iter().position(|&b| b == b'\n')?;
    let mut line: Vec<u8> = buffer.drain(..=pos).collect();
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(String::from_utf8_lossy(&line).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_line_splits_on_newline_and_strips_cr() {
        let mut buf = b"first\r\nsecond\npartial".to_vec();
        assert_eq!(take_line(&mut buf).as_deref(), Some("first"));
        assert_eq!(take_line(&mut buf).as_deref(), Some("second"));
        assert_eq!(take_line(&mut buf), None);
        assert_eq!(buf, b"partial");
    }

    #[test]
    fn take_line_replaces_invalid_utf8() {
        let mut buf = vec![0x66, 0xff, b'\n'];
        assert_eq!(take_line(&mut buf).as_deref(), Some("f\u{fffd}"));
    }
}

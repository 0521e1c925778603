//! Serial transport implementation

use std::io::{Read, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};

use super::{take_line, PortCandidate, Transport, TransportFactory, MAX_PARTIAL_LINE};
use crate::error::DeviceResult;

/// Serial transport for the USB-UART bridge.
pub struct SerialTransport {
    port_name: String,
    port: Box<dyn SerialPort>,
    buffer: Vec<u8>,
}

impl SerialTransport {
    /// Open a serial port
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/ttyUSB0", "COM3")
    /// * `baud_rate` - Baud rate (e.g., 115200)
    /// * `timeout` - Per-call I/O timeout
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> DeviceResult<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()?;

        tracing::info!(port = %path, baud_rate, "Opened serial port");

        Ok(Self {
            port_name: path.to_string(),
            port,
            buffer: Vec::new(),
        })
    }

    /// Pull whatever the driver has buffered into our line buffer.
    fn fill(&mut self) -> DeviceResult<()> {
        let available = self.port.bytes_to_read()? as usize;
        if available == 0 {
            return Ok(());
        }

        let mut chunk = vec![0u8; available];
        match self.port.read(&mut chunk) {
            Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => return Err(e.into()),
        }

        if self.buffer.len() > MAX_PARTIAL_LINE && !self.buffer.contains(&b'\n') {
            tracing::warn!(
                port = %self.port_name,
                bytes = self.buffer.len(),
                "Discarding oversized partial line"
            );
            self.buffer.clear();
        }
        Ok(())
    }
}

impl Transport for SerialTransport {
    fn port(&self) -> &str {
        &self.port_name
    }

    fn bytes_pending(&mut self) -> DeviceResult<usize> {
        Ok(self.port.bytes_to_read()? as usize + self.buffer.len())
    }

    fn read_line(&mut self) -> DeviceResult<Option<String>> {
        if let Some(line) = take_line(&mut self.buffer) {
            return Ok(Some(line));
        }
        self.fill()?;
        Ok(take_line(&mut self.buffer))
    }

    fn write_all(&mut self, data: &[u8]) -> DeviceResult<()> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> DeviceResult<()> {
        self.port.set_timeout(timeout)?;
        tracing::debug!(port = %self.port_name, timeout_ms = timeout.as_millis() as u64, "Serial timeout changed");
        Ok(())
    }
}

/// Opens [`SerialTransport`]s and lists the host's serial ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialTransportFactory;

impl TransportFactory for SerialTransportFactory {
    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> DeviceResult<Box<dyn Transport>> {
        Ok(Box::new(SerialTransport::open(port, baud_rate, timeout)?))
    }

    fn candidates(&self) -> Vec<PortCandidate> {
        match serialport::available_ports() {
            Ok(ports) => ports
                .into_iter()
                .map(|p| PortCandidate {
                    description: describe(&p.port_type),
                    name: p.port_name,
                })
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to enumerate serial ports");
                Vec::new()
            }
        }
    }
}

/// Human-readable description used for keyword matching.
fn describe(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(info) => [info.product.as_deref(), info.manufacturer.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" "),
        SerialPortType::PciPort => "PCI serial port".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth serial port".to_string(),
        SerialPortType::Unknown => String::new(),
    }
}

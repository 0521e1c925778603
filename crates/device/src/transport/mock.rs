//! In-memory transport for tests and local development.
//!
//! [`MockTransportFactory`] exposes a configurable set of ports. Each port is
//! backed by a [`MockLink`] through which a test feeds lines to the manager,
//! inspects what the manager wrote, or breaks the link to simulate an unplug.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{take_line, PortCandidate, Transport, TransportFactory};
use crate::error::{DeviceError, DeviceResult};

#[derive(Default)]
struct LinkInner {
    incoming: Mutex<Vec<u8>>,
    written: Mutex<VecDeque<u8>>,
    broken: AtomicBool,
    timeout: Mutex<Option<Duration>>,
}

/// Test-side handle on one mock port.
#[derive(Clone, Default)]
pub struct MockLink {
    inner: Arc<LinkInner>,
}

impl MockLink {
    /// Queue one line for the manager to read. A newline is appended.
    pub fn push_line(&self, line: &str) {
        let mut incoming = lock(&self.inner.incoming);
        incoming.extend_from_slice(line.as_bytes());
        incoming.push(b'\n');
    }

    /// Queue raw bytes, e.g. a partial line.
    pub fn push_bytes(&self, bytes: &[u8]) {
        lock(&self.inner.incoming).extend_from_slice(bytes);
    }

    /// Everything written to the port so far, as text.
    pub fn written(&self) -> String {
        let written = lock(&self.inner.written);
        String::from_utf8_lossy(&written.iter().copied().collect::<Vec<_>>()).into_owned()
    }

    /// Make every subsequent read and write fail, as if the cable was pulled.
    pub fn break_link(&self) {
        self.inner.broken.store(true, Ordering::SeqCst);
    }

    /// I/O timeout of the most recently opened transport, as last set.
    pub fn timeout(&self) -> Option<Duration> {
        *lock(&self.inner.timeout)
    }

    pub fn repair(&self) {
        self.inner.broken.store(false, Ordering::SeqCst);
    }

    fn is_broken(&self) -> bool {
        self.inner.broken.load(Ordering::SeqCst)
    }
}

struct MockPort {
    description: String,
    link: MockLink,
}

/// Factory over a mutable set of in-memory ports.
#[derive(Default)]
pub struct MockTransportFactory {
    ports: Mutex<HashMap<String, MockPort>>,
    open_attempts: AtomicUsize,
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plug in a port and return its link handle.
    pub fn add_port(&self, name: &str, description: &str) -> MockLink {
        let link = MockLink::default();
        lock(&self.ports).insert(
            name.to_string(),
            MockPort {
                description: description.to_string(),
                link: link.clone(),
            },
        );
        link
    }

    /// Unplug a port. Any open transport on it starts failing.
    pub fn remove_port(&self, name: &str) {
        if let Some(port) = lock(&self.ports).remove(name) {
            port.link.break_link();
        }
    }

    /// Number of `open` calls, successful or not.
    pub fn open_attempts(&self) -> usize {
        self.open_attempts.load(Ordering::SeqCst)
    }
}

impl TransportFactory for MockTransportFactory {
    fn open(
        &self,
        port: &str,
        _baud_rate: u32,
        timeout: Duration,
    ) -> DeviceResult<Box<dyn Transport>> {
        self.open_attempts.fetch_add(1, Ordering::SeqCst);

        let ports = lock(&self.ports);
        let link = ports
            .get(port)
            .map(|p| p.link.clone())
            .ok_or_else(|| DeviceError::Open {
                port: port.to_string(),
                reason: "No such device".to_string(),
            })?;

        if link.is_broken() {
            return Err(DeviceError::Open {
                port: port.to_string(),
                reason: "Device not responding".to_string(),
            });
        }

        *lock(&link.inner.timeout) = Some(timeout);
        Ok(Box::new(MockTransport {
            port: port.to_string(),
            link,
        }))
    }

    fn candidates(&self) -> Vec<PortCandidate> {
        let mut candidates: Vec<PortCandidate> = lock(&self.ports)
            .iter()
            .map(|(name, port)| PortCandidate {
                name: name.clone(),
                description: port.description.clone(),
            })
            .collect();
        candidates.sort_by(|a, b| a.name.cmp(&b.name));
        candidates
    }
}

struct MockTransport {
    port: String,
    link: MockLink,
}

impl MockTransport {
    fn check(&self) -> DeviceResult<()> {
        if self.link.is_broken() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                format!("{} disconnected", self.port),
            )
            .into());
        }
        Ok(())
    }
}

impl Transport for MockTransport {
    fn port(&self) -> &str {
        &self.port
    }

    fn bytes_pending(&mut self) -> DeviceResult<usize> {
        self.check()?;
        Ok(lock(&self.link.inner.incoming).len())
    }

    fn read_line(&mut self) -> DeviceResult<Option<String>> {
        self.check()?;
        Ok(take_line(&mut lock(&self.link.inner.incoming)))
    }

    fn write_all(&mut self, data: &[u8]) -> DeviceResult<()> {
        self.check()?;
        lock(&self.link.inner.written).extend(data.iter().copied());
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> DeviceResult<()> {
        self.check()?;
        *lock(&self.link.inner.timeout) = Some(timeout);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_unknown_port_fails_and_is_counted() {
        let factory = MockTransportFactory::new();
        let result = factory.open("/dev/nope", 115_200, Duration::from_millis(10));
        assert!(matches!(result, Err(DeviceError::Open { .. })));
        assert_eq!(factory.open_attempts(), 1);
    }

    #[test]
    fn lines_flow_both_ways() {
        let factory = MockTransportFactory::new();
        let link = factory.add_port("mock0", "CP2102 USB to UART");
        let mut transport = factory
            .open("mock0", 115_200, Duration::from_millis(10))
            .unwrap();

        link.push_line("1,2,3");
        assert_eq!(transport.read_line().unwrap().as_deref(), Some("1,2,3"));
        assert_eq!(transport.read_line().unwrap(), None);

        transport.write_all(b"PING\n").unwrap();
        assert_eq!(link.written(), "PING\n");
    }

    #[test]
    fn timeout_is_recorded_on_open_and_change() {
        let factory = MockTransportFactory::new();
        let link = factory.add_port("mock0", "");
        assert_eq!(link.timeout(), None);

        let mut transport = factory
            .open("mock0", 115_200, Duration::from_millis(10))
            .unwrap();
        assert_eq!(link.timeout(), Some(Duration::from_millis(10)));

        transport.set_timeout(Duration::from_millis(250)).unwrap();
        assert_eq!(link.timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn removed_port_breaks_open_transport() {
        let factory = MockTransportFactory::new();
        factory.add_port("mock0", "");
        let mut transport = factory
            .open("mock0", 115_200, Duration::from_millis(10))
            .unwrap();

        factory.remove_port("mock0");
        assert!(transport.read_line().is_err());
        assert!(factory.candidates().is_empty());
    }
}

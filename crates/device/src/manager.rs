//! Device connection manager.
//!
//! [`DeviceManager`] owns the single link to the wearable. `start` runs
//! discovery, opens the transport and spawns one supervisor task that runs
//! the read loop and, when the link drops, the bounded reconnect loop.
//! Decoded readings are pushed onto an mpsc channel consumed by the
//! classification pipeline.
//!
//! Lifecycle events are broadcast via a [`tokio::sync::broadcast`] channel.
//! Call [`DeviceManager::subscribe`] to receive them.

use std::sync::Arc;
use std::time::Duration;

use integrisense_core::normalize::ReadingNormalizer;
use integrisense_core::reading::CanonicalReading;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{DeviceConfig, SerialConfigUpdate};
use crate::discovery;
use crate::error::{DeviceError, DeviceResult};
use crate::events::DeviceEvent;
use crate::reconnect::{reconnect_loop, Connector, ReconnectOutcome};
use crate::state::{ConnectionState, ConnectionStatus, StateCell};
use crate::transport::{PortCandidate, Transport, TransportFactory};

/// Broadcast channel capacity for device events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Upper bound on lines drained per poll tick.
const MAX_LINES_PER_POLL: usize = 32;

/// How long `stop` waits for the supervisor to exit.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

type TransportSlot = Arc<Mutex<Option<Box<dyn Transport>>>>;

/// Status snapshot returned by [`DeviceManager::status`].
#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatus {
    #[serde(flatten)]
    pub state: ConnectionState,
    pub connected: bool,
    pub baud_rate: u32,
    pub timeout_ms: u64,
    pub auto_detect: bool,
    pub enabled: bool,
    pub max_reconnect_attempts: u32,
    pub available_ports: Vec<PortCandidate>,
    pub platform: &'static str,
}

/// Result of [`DeviceManager::configure`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigOutcome {
    /// Whether a stop/start cycle was performed.
    pub restarted: bool,
}

/// Manages the device link.
///
/// Created once at startup via [`DeviceManager::new`]; the returned `Arc`
/// can be cloned into request handlers.
pub struct DeviceManager {
    config: RwLock<DeviceConfig>,
    state: StateCell,
    factory: Arc<dyn TransportFactory>,
    normalizer: ReadingNormalizer,
    readings_tx: mpsc::Sender<CanonicalReading>,
    /// Shared by the read loop and `send_command`; never held across an await
    /// on anything but the transport itself.
    transport: TransportSlot,
    /// Control lock serializing start/stop/configure.
    supervisor: Mutex<Option<SupervisorTask>>,
    event_tx: broadcast::Sender<DeviceEvent>,
    /// Master cancellation token -- cancelled during shutdown.
    cancel: CancellationToken,
}

struct SupervisorTask {
    handle: JoinHandle<()>,
    /// Child of the master token.
    cancel: CancellationToken,
}

impl DeviceManager {
    pub fn new(
        config: DeviceConfig,
        factory: Arc<dyn TransportFactory>,
        normalizer: ReadingNormalizer,
        readings_tx: mpsc::Sender<CanonicalReading>,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = StateCell::new(ConnectionState::new(config.port.clone()), event_tx.clone());

        Arc::new(Self {
            config: RwLock::new(config),
            state,
            factory,
            normalizer,
            readings_tx,
            transport: Arc::new(Mutex::new(None)),
            supervisor: Mutex::new(None),
            event_tx,
            cancel: CancellationToken::new(),
        })
    }

    /// Subscribe to device lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.event_tx.subscribe()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state.snapshot()
    }

    pub fn is_connected(&self) -> bool {
        self.state.snapshot().status.is_connected()
    }

    pub async fn config(&self) -> DeviceConfig {
        self.config.read().await.clone()
    }

    /// Connect and start the read loop.
    ///
    /// No-op when disabled or already running. If the first connect fails
    /// the error is returned and recorded in the state, and the supervisor
    /// keeps retrying in the background within the reconnect bound.
    pub async fn start(&self) -> DeviceResult<()> {
        let mut supervisor = self.supervisor.lock().await;
        self.start_locked(&mut supervisor).await
    }

    /// Stop the read loop and close the transport. Idempotent.
    pub async fn stop(&self) {
        let mut supervisor = self.supervisor.lock().await;
        self.stop_locked(&mut supervisor).await;
    }

    /// Apply a partial configuration update.
    ///
    /// Port, rate or enabled changes (or a manager stuck in `Failed`)
    /// trigger a full stop, pause, start cycle. A timeout change is applied
    /// to the open link in place; discovery changes take effect on the next
    /// connect.
    pub async fn configure(&self, update: SerialConfigUpdate) -> DeviceResult<ConfigOutcome> {
        update.validate()?;

        let mut supervisor = self.supervisor.lock().await;

        let (needs_restart, config) = {
            let mut config = self.config.write().await;
            let changed = update.apply_to(&mut config);
            (changed, config.clone())
        };
        let failed = self.state.snapshot().status == ConnectionStatus::Failed;

        tracing::info!(
            port = %config.port,
            baud_rate = config.baud_rate,
            enabled = config.enabled,
            restart = needs_restart || failed,
            "Device configuration updated"
        );

        if !(needs_restart || failed) {
            if update.timeout_ms.is_some() {
                self.apply_timeout(config.timeout).await;
            }
            return Ok(ConfigOutcome { restarted: false });
        }

        self.stop_locked(&mut supervisor).await;
        tokio::time::sleep(config.restart_delay).await;
        if let Err(e) = self.start_locked(&mut supervisor).await {
            tracing::warn!(error = %e, "Restart after reconfigure did not connect");
        }

        Ok(ConfigOutcome { restarted: true })
    }

    /// Write `text` plus a newline to the device.
    pub async fn send_command(&self, text: &str) -> DeviceResult<()> {
        if !self.is_connected() {
            return Err(DeviceError::NotConnected);
        }

        let mut line = text.trim_end_matches(['\r', '\n']).to_string();
        line.push('\n');

        let mut slot = self.transport.lock().await;
        let transport = slot.as_mut().ok_or(DeviceError::NotConnected)?;
        transport.write_all(line.as_bytes())?;

        tracing::info!(port = %transport.port(), command = %line.trim_end(), "Sent device command");
        Ok(())
    }

    /// State snapshot plus configuration and discoverable ports.
    pub async fn status(&self) -> DeviceStatus {
        let state = self.state.snapshot();
        let config = self.config.read().await.clone();

        let factory = Arc::clone(&self.factory);
        let available_ports = tokio::task::spawn_blocking(move || factory.candidates())
            .await
            .unwrap_or_default();

        DeviceStatus {
            connected: state.status.is_connected(),
            state,
            baud_rate: config.baud_rate,
            timeout_ms: config.timeout.as_millis() as u64,
            auto_detect: config.auto_detect,
            enabled: config.enabled,
            max_reconnect_attempts: config.max_reconnect_attempts,
            available_ports,
            platform: discovery::platform_tag(),
        }
    }

    /// Stop for good. Later `start` calls are ignored.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down device manager");
        self.cancel.cancel();
        self.stop().await;
        tracing::info!("Device manager shut down complete");
    }

    // ---- private helpers ----

    /// Push a new I/O timeout to the open link, if any. A failure here
    /// surfaces on the next read, which drives the reconnect path.
    async fn apply_timeout(&self, timeout: Duration) {
        let mut slot = self.transport.lock().await;
        let Some(transport) = slot.as_mut() else {
            return;
        };
        let timeout_ms = timeout.as_millis() as u64;
        match transport.set_timeout(timeout) {
            Ok(()) => tracing::info!(port = %transport.port(), timeout_ms, "Applied timeout to open link"),
            Err(e) => tracing::warn!(port = %transport.port(), timeout_ms, error = %e, "Failed to apply timeout to open link"),
        }
    }

    async fn start_locked(&self, supervisor: &mut Option<SupervisorTask>) -> DeviceResult<()> {
        if self.cancel.is_cancelled() {
            return Ok(());
        }

        let config = self.config.read().await.clone();
        if !config.enabled {
            tracing::info!("Device ingress disabled, not starting");
            return Ok(());
        }

        if let Some(task) = supervisor.as_ref() {
            if !task.handle.is_finished() {
                tracing::debug!("Device manager already running");
                return Ok(());
            }
        }
        *supervisor = None;

        let connector = Connector::new(Arc::clone(&self.factory), config);

        self.state.update(|s| ConnectionState {
            status: ConnectionStatus::Connecting,
            reconnect_attempts: 0,
            last_error: None,
            ..s.clone()
        });

        let port = connector.resolve_port().await;
        {
            let mut config = self.config.write().await;
            if config.port != port {
                tracing::info!(from = %config.port, to = %port, "Using discovered port");
                config.port = port.clone();
            }
        }
        self.state.update(|s| ConnectionState {
            port: port.clone(),
            ..s.clone()
        });

        let (connected, result) = match connector.open(&port).await {
            Ok(transport) => {
                attach(&self.state, &self.transport, transport).await;
                (true, Ok(()))
            }
            Err(e) => {
                tracing::warn!(port = %port, error = %e, "Initial device connect failed");
                self.state.update(|s| ConnectionState {
                    status: ConnectionStatus::Disconnected,
                    last_error: Some(e.to_string()),
                    ..s.clone()
                });
                (false, Err(e))
            }
        };

        let cancel = self.cancel.child_token();
        let task = Supervisor {
            connector,
            state: self.state.clone(),
            transport: Arc::clone(&self.transport),
            normalizer: self.normalizer.clone(),
            readings_tx: self.readings_tx.clone(),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(async move {
            tracing::info!("Device supervisor started");
            task.run(connected).await;
            tracing::info!("Device supervisor exited");
        });

        *supervisor = Some(SupervisorTask { handle, cancel });
        result
    }

    async fn stop_locked(&self, supervisor: &mut Option<SupervisorTask>) {
        if let Some(task) = supervisor.take() {
            task.cancel.cancel();
            let abort = task.handle.abort_handle();
            if tokio::time::timeout(STOP_TIMEOUT, task.handle).await.is_err() {
                tracing::warn!("Device supervisor did not exit in time, aborting");
                abort.abort();
            }
        }

        detach(&self.state, &self.transport, "stopped").await;

        self.state.update(|s| ConnectionState {
            status: ConnectionStatus::Disconnected,
            ..s.clone()
        });
    }
}

/// Install an open transport and mark the link connected.
async fn attach(state: &StateCell, slot: &TransportSlot, transport: Box<dyn Transport>) {
    let port = transport.port().to_string();
    *slot.lock().await = Some(transport);

    state.update(|s| ConnectionState {
        status: ConnectionStatus::Connected,
        port: port.clone(),
        reconnect_attempts: 0,
        last_error: None,
    });
    state.emit(DeviceEvent::Linked { port: port.clone() });
    tracing::info!(port = %port, "Device connected");
}

/// Close the transport, if any. Closing is dropping.
async fn detach(state: &StateCell, slot: &TransportSlot, reason: &str) {
    if let Some(transport) = slot.lock().await.take() {
        let port = transport.port().to_string();
        drop(transport);
        state.emit(DeviceEvent::Unlinked {
            port: port.clone(),
            reason: reason.to_string(),
        });
        tracing::info!(port = %port, reason, "Device transport closed");
    }
}

/// The one long-lived task behind a started manager.
struct Supervisor {
    connector: Connector,
    state: StateCell,
    transport: TransportSlot,
    normalizer: ReadingNormalizer,
    readings_tx: mpsc::Sender<CanonicalReading>,
    cancel: CancellationToken,
}

impl Supervisor {
    /// Read -> reconnect -> read, until cancelled or the bound is hit.
    async fn run(self, mut connected: bool) {
        loop {
            if connected {
                let Some(error) = self.read_loop().await else {
                    return;
                };
                if self.cancel.is_cancelled() {
                    return;
                }

                tracing::warn!(error = %error, "Device link lost");
                detach(&self.state, &self.transport, &error.to_string()).await;
                self.state.update(|s| ConnectionState {
                    status: ConnectionStatus::Disconnected,
                    last_error: Some(error.to_string()),
                    ..s.clone()
                });
            }

            match reconnect_loop(&self.connector, &self.state, &self.cancel).await {
                ReconnectOutcome::Connected(transport) => {
                    attach(&self.state, &self.transport, transport).await;
                    connected = true;
                }
                ReconnectOutcome::Exhausted => {
                    let state = self.state.update(|s| ConnectionState {
                        status: ConnectionStatus::Failed,
                        ..s.clone()
                    });
                    tracing::error!(
                        attempts = state.reconnect_attempts,
                        "Max reconnection attempts reached, device ingress stopped"
                    );
                    return;
                }
                ReconnectOutcome::Cancelled => return,
            }
        }
    }

    /// Poll the transport until cancelled (`None`) or it fails (`Some`).
    async fn read_loop(&self) -> Option<DeviceError> {
        self.state.update(|s| ConnectionState {
            status: ConnectionStatus::Listening,
            ..s.clone()
        });

        let mut interval = tokio::time::interval(self.connector.poll_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                _ = interval.tick() => {}
            }

            let lines = match self.drain_lines().await {
                Ok(lines) => lines,
                Err(e) => return Some(e),
            };

            for line in lines {
                self.forward(&line);
            }
        }
    }

    async fn drain_lines(&self) -> DeviceResult<Vec<String>> {
        let mut slot = self.transport.lock().await;
        let transport = slot.as_mut().ok_or(DeviceError::NotConnected)?;

        let mut lines = Vec::new();
        while lines.len() < MAX_LINES_PER_POLL && transport.bytes_pending()? > 0 {
            match transport.read_line()? {
                Some(line) => lines.push(line),
                None => break,
            }
        }
        Ok(lines)
    }

    /// Decode one line and hand it to the pipeline. Bad lines are dropped.
    fn forward(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let reading = match self.normalizer.from_device_line(line) {
            Ok(reading) => reading,
            Err(e) => {
                tracing::debug!(error = %e, line = %line, "Discarding undecodable device line");
                return;
            }
        };

        match self.readings_tx.try_send(reading) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Reading channel full, dropping device reading");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Reading channel closed, dropping device reading");
            }
        }
    }
}

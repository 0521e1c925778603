//! Bounded fixed-delay reconnection.
//!
//! After a transport failure the supervisor calls [`reconnect_loop`], which
//! retries up to [`ReconnectPolicy::max_attempts`] times, sleeping the same
//! delay before each attempt, and then gives up. Giving up is terminal: the
//! manager reports `Failed` until an operator restarts it.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::DeviceConfig;
use crate::discovery;
use crate::error::{DeviceError, DeviceResult};
use crate::state::{ConnectionState, ConnectionStatus, StateCell};
use crate::transport::{Transport, TransportFactory};

/// Reconnect bound and fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl ReconnectPolicy {
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self {
            max_attempts: config.max_reconnect_attempts,
            delay: config.reconnect_delay,
        }
    }

    /// `true` while another attempt is allowed after `attempts` failures.
    pub fn allows(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

/// How a reconnect loop ended.
pub enum ReconnectOutcome {
    Connected(Box<dyn Transport>),
    /// Every allowed attempt failed.
    Exhausted,
    Cancelled,
}

/// Resolves the target port and opens transports for one configuration.
#[derive(Clone)]
pub(crate) struct Connector {
    factory: Arc<dyn TransportFactory>,
    config: DeviceConfig,
}

impl Connector {
    pub(crate) fn new(factory: Arc<dyn TransportFactory>, config: DeviceConfig) -> Self {
        Self { factory, config }
    }

    /// Run discovery if enabled, else use the configured port.
    pub(crate) async fn resolve_port(&self) -> String {
        if !self.config.auto_detect {
            return self.config.port.clone();
        }

        let factory = Arc::clone(&self.factory);
        let candidates = tokio::task::spawn_blocking(move || factory.candidates())
            .await
            .unwrap_or_default();

        match discovery::select_port(&candidates, discovery::platform_tag()) {
            Some(port) => {
                tracing::info!(port = %port, candidates = candidates.len(), "Discovered device port");
                port
            }
            None => self.config.port.clone(),
        }
    }

    /// Open `port` on the blocking pool.
    pub(crate) async fn open(&self, port: &str) -> DeviceResult<Box<dyn Transport>> {
        let factory = Arc::clone(&self.factory);
        let port = port.to_string();
        let baud_rate = self.config.baud_rate;
        let timeout = self.config.timeout;

        tokio::task::spawn_blocking(move || factory.open(&port, baud_rate, timeout))
            .await
            .map_err(|e| DeviceError::Task(e.to_string()))?
    }

    pub(crate) fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::from_config(&self.config)
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }
}

/// Retry the connection until it succeeds, the bound is hit, or `cancel`
/// fires.
///
/// The attempt counter lives in the shared state so status readers see it
/// climb; it is not reset here.
pub(crate) async fn reconnect_loop(
    connector: &Connector,
    state: &StateCell,
    cancel: &CancellationToken,
) -> ReconnectOutcome {
    let policy = connector.policy();

    loop {
        let attempts = state.snapshot().reconnect_attempts;
        if !policy.allows(attempts) {
            return ReconnectOutcome::Exhausted;
        }

        let attempt = attempts + 1;
        state.update(|s| ConnectionState {
            status: ConnectionStatus::ReconnectWait,
            reconnect_attempts: attempt,
            ..s.clone()
        });
        tracing::info!(
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms = policy.delay.as_millis() as u64,
            "Reconnecting to device",
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return ReconnectOutcome::Cancelled,
            _ = tokio::time::sleep(policy.delay) => {}
        }

        state.update(|s| ConnectionState {
            status: ConnectionStatus::Connecting,
            ..s.clone()
        });

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ReconnectOutcome::Cancelled,
            result = async {
                let port = connector.resolve_port().await;
                connector.open(&port).await
            } => result,
        };

        match result {
            Ok(transport) => {
                tracing::info!(attempt, port = %transport.port(), "Reconnected to device");
                return ReconnectOutcome::Connected(transport);
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "Reconnect attempt failed");
                state.update(|s| ConnectionState {
                    status: ConnectionStatus::Disconnected,
                    last_error: Some(e.to_string()),
                    ..s.clone()
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::DeviceEvent;
    use crate::transport::mock::MockTransportFactory;
    use tokio::sync::broadcast;

    fn connector(factory: Arc<MockTransportFactory>, max_attempts: u32) -> Connector {
        Connector::new(
            factory,
            DeviceConfig {
                port: "/dev/missing".into(),
                auto_detect: false,
                max_reconnect_attempts: max_attempts,
                reconnect_delay: Duration::from_millis(1),
                ..DeviceConfig::default()
            },
        )
    }

    fn cell() -> StateCell {
        let (tx, _) = broadcast::channel::<DeviceEvent>(64);
        StateCell::new(ConnectionState::new("/dev/missing"), tx)
    }

    #[test]
    fn policy_allows_up_to_max() {
        let policy = ReconnectPolicy {
            max_attempts: 3,
            delay: Duration::ZERO,
        };
        assert!(policy.allows(0));
        assert!(policy.allows(2));
        assert!(!policy.allows(3));
        assert!(!ReconnectPolicy { max_attempts: 0, ..policy }.allows(0));
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let factory = Arc::new(MockTransportFactory::new());
        let state = cell();
        let outcome =
            reconnect_loop(&connector(factory.clone(), 3), &state, &CancellationToken::new()).await;

        assert!(matches!(outcome, ReconnectOutcome::Exhausted));
        assert_eq!(factory.open_attempts(), 3);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.reconnect_attempts, 3);
        assert!(snapshot.last_error.is_some());
    }

    #[tokio::test]
    async fn connects_once_port_appears() {
        let factory = Arc::new(MockTransportFactory::new());
        factory.add_port("/dev/missing", "");
        let outcome =
            reconnect_loop(&connector(factory, 3), &cell(), &CancellationToken::new()).await;
        assert!(matches!(outcome, ReconnectOutcome::Connected(_)));
    }

    #[tokio::test]
    async fn cancellation_stops_reconnect() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let factory = Arc::new(MockTransportFactory::new());
        let outcome = reconnect_loop(&connector(factory.clone(), 3), &cell(), &cancel).await;

        assert!(matches!(outcome, ReconnectOutcome::Cancelled));
        assert_eq!(factory.open_attempts(), 0);
    }
}

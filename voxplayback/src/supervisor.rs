//! Connection supervision: readiness, bounded reconnection, teardown
//!
//! Mirrors the transport lifecycle: `Connecting → Ready`, `Ready →
//! Disconnected`, `Disconnected → (Rejoining | Destroyed)`. A fatal
//! disconnect stops the session immediately; transient ones rejoin with
//! linear backoff up to a bounded attempt count, after which the session is
//! destroyed. Reconnection is bounded by attempt count, not wall-clock; only
//! the per-attempt readiness wait is wall-clock bounded.

use tokio::sync::broadcast;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::session::Session;
use crate::transport::{ConnectionEvent, DisconnectCause};

pub(crate) struct ConnectionSupervisor {
    session: Session,
    /// Re-entrancy guard for readiness handling: a duplicate Ready while one
    /// wait is in progress is dropped, never awaited twice.
    ready_gate: AsyncMutex<()>,
}

impl ConnectionSupervisor {
    pub(crate) fn new(session: Session) -> Self {
        Self {
            session,
            ready_gate: AsyncMutex::new(()),
        }
    }

    pub(crate) async fn run(self, mut events: broadcast::Receiver<ConnectionEvent>) {
        let room = self.session.room();
        loop {
            match events.recv().await {
                Ok(ConnectionEvent::Ready) => self.on_ready(),
                Ok(ConnectionEvent::Disconnected { cause }) => match cause {
                    DisconnectCause::Fatal(reason) => {
                        warn!(%room, reason, "fatal disconnect, stopping session");
                        self.session.destroy().await;
                        return;
                    }
                    DisconnectCause::Transient(reason) => {
                        info!(%room, reason, "transient disconnect, rejoining");
                        match self.rejoin_with_backoff().await {
                            Some(new_events) => events = new_events,
                            None => {
                                warn!(%room, "reconnection exhausted, destroying session");
                                self.session.destroy().await;
                                return;
                            }
                        }
                    }
                },
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(%room, missed, "connection events lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    // The transport dropped its event channel without a
                    // disconnect notice; nothing left to supervise.
                    debug!(%room, "connection event channel closed");
                    return;
                }
            }
            if self.session.is_destroyed() {
                return;
            }
        }
    }

    fn on_ready(&self) {
        let Ok(_gate) = self.ready_gate.try_lock() else {
            debug!(room = %self.session.room(), "duplicate ready dropped");
            return;
        };
        info!(room = %self.session.room(), "transport ready");
    }

    /// Rejoin with linear backoff (attempt n waits n × step). Returns the
    /// new event stream once a rejoined connection reports ready, or `None`
    /// when the attempt bound is exhausted.
    async fn rejoin_with_backoff(&self) -> Option<broadcast::Receiver<ConnectionEvent>> {
        let room = self.session.room();
        let max_attempts = self.session.config().reconnect_max_attempts;
        let step = self.session.config().reconnect_backoff_step();

        for attempt in 1..=max_attempts {
            sleep(step * attempt).await;
            if self.session.is_destroyed() {
                return None;
            }

            match self.session.rejoin().await {
                Ok(mut events) => {
                    if self.await_ready(&mut events).await {
                        info!(%room, attempt, "rejoined and ready");
                        return Some(events);
                    }
                    warn!(%room, attempt, "rejoined but never became ready");
                }
                Err(e) => {
                    warn!(%room, attempt, error = %e, "rejoin attempt failed");
                }
            }
        }
        None
    }

    /// Wall-clock bounded wait for `Ready` on a fresh connection.
    async fn await_ready(&self, events: &mut broadcast::Receiver<ConnectionEvent>) -> bool {
        let Ok(_gate) = self.ready_gate.try_lock() else {
            debug!(room = %self.session.room(), "readiness wait already in progress");
            return false;
        };

        let wait = async {
            loop {
                match events.recv().await {
                    Ok(ConnectionEvent::Ready) => return true,
                    Ok(ConnectionEvent::Disconnected { .. }) => return false,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return false,
                }
            }
        };
        timeout(self.session.config().ready_timeout(), wait)
            .await
            .unwrap_or(false)
    }
}

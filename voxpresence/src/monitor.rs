//! VoicePresenceMonitor: occupancy tracking and empty-room teardown
//!
//! Runs independently of playback: membership events plus a periodic
//! heartbeat feed it, and when the last human leaves it counts down a grace
//! period before stopping the room's session. The heartbeat also catches
//! users who were already in the room when monitoring started, and flushes
//! accumulated listening time so long sessions report progressively instead
//! of in one lump on exit.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use voxplayback::{report_listening, Notice, Notifier, RoomId, SessionRegistry, StatsSink, UserId};

/// Presence tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Seconds an empty room lingers before the session is stopped.
    pub grace_secs: u64,
    /// Heartbeat interval for membership reconciliation.
    pub heartbeat_secs: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            grace_secs: 45,
            heartbeat_secs: 60,
        }
    }
}

impl PresenceConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}

/// Room membership change, as delivered by the chat platform.
#[derive(Debug, Clone)]
pub enum PresenceEvent {
    Joined { user: UserId, is_bot: bool },
    Left { user: UserId },
    /// Moved away to another room; equivalent to leaving the monitored one.
    Moved { user: UserId },
}

/// Read-side view of who is in the room right now (bots excluded).
#[async_trait]
pub trait RoomMembership: Send + Sync {
    async fn human_members(&self, room: RoomId) -> Vec<UserId>;
}

/// Stops the room's playback session when the grace period expires.
#[async_trait]
pub trait SessionStopper: Send + Sync {
    async fn stop_session(&self, room: RoomId);
}

#[async_trait]
impl SessionStopper for SessionRegistry {
    async fn stop_session(&self, room: RoomId) {
        self.destroy(room).await;
    }
}

struct MonitorInner {
    room: RoomId,
    config: PresenceConfig,
    membership: Arc<dyn RoomMembership>,
    stopper: Arc<dyn SessionStopper>,
    stats: Arc<dyn StatsSink>,
    notifier: Arc<dyn Notifier>,
    /// Per-user join timestamp, consumed into listening minutes on exit.
    records: StdMutex<HashMap<UserId, Instant>>,
    grace: StdMutex<Option<JoinHandle<()>>>,
    heartbeat: StdMutex<Option<JoinHandle<()>>>,
    /// Set once a countdown has expired and stopped the session; keeps
    /// heartbeats on the still-empty room from re-arming the countdown.
    /// Cleared when a human shows up again.
    stop_fired: AtomicBool,
    stopped: AtomicBool,
}

/// Occupancy monitor for one room. Cheap to clone.
#[derive(Clone)]
pub struct VoicePresenceMonitor {
    inner: Arc<MonitorInner>,
}

impl VoicePresenceMonitor {
    pub fn new(
        room: RoomId,
        config: PresenceConfig,
        membership: Arc<dyn RoomMembership>,
        stopper: Arc<dyn SessionStopper>,
        stats: Arc<dyn StatsSink>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                room,
                config,
                membership,
                stopper,
                stats,
                notifier,
                records: StdMutex::new(HashMap::new()),
                grace: StdMutex::new(None),
                heartbeat: StdMutex::new(None),
                stop_fired: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    /// Start the heartbeat. The first beat runs immediately so members
    /// already present when monitoring begins get a join record.
    pub fn start(&self) {
        let monitor = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                monitor.heartbeat().await;
                sleep(monitor.inner.config.heartbeat()).await;
            }
        });
        let mut slot = self.inner.heartbeat.lock().unwrap();
        if let Some(old) = slot.replace(handle) {
            old.abort();
        }
    }

    /// Feed one membership event.
    pub async fn handle_event(&self, event: PresenceEvent) {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return;
        }
        match event {
            PresenceEvent::Joined { user, is_bot } => self.on_join(user, is_bot),
            PresenceEvent::Left { user } | PresenceEvent::Moved { user } => {
                self.on_leave(user).await;
            }
        }
    }

    /// Humans currently known to be in the room.
    pub fn occupancy(&self) -> usize {
        self.inner.records.lock().unwrap().len()
    }

    /// Stop monitoring; flushes remaining listening time.
    pub async fn shutdown(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel_grace();
        if let Some(handle) = self.inner.heartbeat.lock().unwrap().take() {
            handle.abort();
        }

        let drained: Vec<(UserId, Instant)> =
            self.inner.records.lock().unwrap().drain().collect();
        for (user, joined) in drained {
            report_listening(
                self.inner.stats.clone(),
                user,
                joined.elapsed().as_secs() / 60,
            );
        }
        info!(room = %self.inner.room, "presence monitoring stopped");
    }

    fn on_join(&self, user: UserId, is_bot: bool) {
        if is_bot {
            return;
        }
        self.inner.stop_fired.store(false, Ordering::SeqCst);
        let inserted = {
            let mut records = self.inner.records.lock().unwrap();
            match records.entry(user) {
                Entry::Occupied(_) => false,
                Entry::Vacant(v) => {
                    v.insert(Instant::now());
                    true
                }
            }
        };
        if inserted {
            debug!(room = %self.inner.room, %user, "human joined");
        }
        // Any human in the room cancels a pending countdown.
        self.cancel_grace();
    }

    async fn on_leave(&self, user: UserId) {
        let joined = self.inner.records.lock().unwrap().remove(&user);
        if let Some(joined) = joined {
            let minutes = joined.elapsed().as_secs() / 60;
            debug!(room = %self.inner.room, %user, minutes, "human left");
            report_listening(self.inner.stats.clone(), user, minutes);
        }
        self.check_empty().await;
    }

    /// Reconcile with the live member list: pick up arrivals we never saw an
    /// event for, flush listening time for long-present users, and close
    /// records of users whose leave event was missed.
    async fn heartbeat(&self) {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return;
        }
        let members = self.inner.membership.human_members(self.inner.room).await;

        let mut flushes: Vec<(UserId, u64)> = Vec::new();
        {
            let mut records = self.inner.records.lock().unwrap();
            for user in &members {
                records.entry(*user).or_insert_with(Instant::now);
            }

            let present: HashSet<UserId> = members.iter().copied().collect();
            let mut gone: Vec<UserId> = Vec::new();
            for (user, joined) in records.iter_mut() {
                if !present.contains(user) {
                    gone.push(*user);
                    continue;
                }
                let elapsed = joined.elapsed();
                if elapsed.as_secs() >= 60 {
                    flushes.push((*user, elapsed.as_secs() / 60));
                    *joined = Instant::now();
                }
            }
            for user in gone {
                if let Some(joined) = records.remove(&user) {
                    flushes.push((user, joined.elapsed().as_secs() / 60));
                    warn!(room = %self.inner.room, %user, "leave event missed, record closed");
                }
            }
        }
        for (user, minutes) in flushes {
            report_listening(self.inner.stats.clone(), user, minutes);
        }

        if members.is_empty() {
            self.begin_grace();
        } else {
            self.inner.stop_fired.store(false, Ordering::SeqCst);
        }
    }

    async fn check_empty(&self) {
        let members = self.inner.membership.human_members(self.inner.room).await;
        if members.is_empty() {
            self.begin_grace();
        }
    }

    /// Start the countdown unless one is already running, or one already
    /// expired for this stretch of emptiness.
    fn begin_grace(&self) {
        if self.inner.stop_fired.load(Ordering::SeqCst) {
            return;
        }
        let mut slot = self.inner.grace.lock().unwrap();
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        info!(
            room = %self.inner.room,
            grace_secs = self.inner.config.grace_secs,
            "room empty, countdown started"
        );
        let monitor = self.clone();
        *slot = Some(tokio::spawn(async move {
            monitor
                .notify(Notice::DisconnectCountdown {
                    seconds: monitor.inner.config.grace_secs,
                })
                .await;
            sleep(monitor.inner.config.grace()).await;

            if monitor.inner.stopped.load(Ordering::SeqCst) {
                return;
            }
            // Someone may have slipped back in without cancelling us.
            let members = monitor
                .inner
                .membership
                .human_members(monitor.inner.room)
                .await;
            if !members.is_empty() {
                return;
            }

            info!(room = %monitor.inner.room, "grace expired, stopping session");
            monitor.inner.stop_fired.store(true, Ordering::SeqCst);
            monitor.notify(Notice::LeftEmpty).await;
            monitor.inner.stopper.stop_session(monitor.inner.room).await;
        }));
    }

    fn cancel_grace(&self) {
        if let Some(handle) = self.inner.grace.lock().unwrap().take() {
            if !handle.is_finished() {
                debug!(room = %self.inner.room, "countdown cancelled");
            }
            handle.abort();
        }
    }

    async fn notify(&self, notice: Notice) {
        if let Err(e) = self.inner.notifier.send(self.inner.room, notice).await {
            warn!(room = %self.inner.room, error = %e, "notice delivery failed");
        }
    }
}

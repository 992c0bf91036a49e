//! Per-room playback session
//!
//! One [`Session`] exists per active room and is the sole mutator of its own
//! state. Everything is event-driven: transport and player events land on
//! the session's tasks, which walk the `Idle → Buffering → Playing → Idle`
//! cycle. One lock serializes every advancement: the event handlers take it
//! with a try-lock (a completion racing a manual skip is dropped, not
//! queued), while `enqueue` waits its turn and re-checks the state before
//! starting playback, so the head track can never play twice.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use tokio::sync::broadcast;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ads::{AdCatalog, AdvertisementScheduler};
use crate::config::PlaybackConfig;
use crate::control::Control;
use crate::error::{Error, Result};
use crate::notify::{Notice, Notifier};
use crate::queue::PlaybackQueue;
use crate::source::SourceFactory;
use crate::stats::{self, StatsSink};
use crate::supervisor::ConnectionSupervisor;
use crate::track::Track;
use crate::transport::{AudioPlayer, ConnectionEvent, PlayerEvent, VoiceConnection, VoiceTransport};
use crate::types::RoomId;

/// Collaborator handles shared by every session in the process.
#[derive(Clone)]
pub struct SessionDeps {
    pub transport: Arc<dyn VoiceTransport>,
    pub sources: Arc<SourceFactory>,
    pub stats: Arc<dyn StatsSink>,
    pub notifier: Arc<dyn Notifier>,
    pub ads: Arc<dyn AdCatalog>,
    pub config: PlaybackConfig,
}

/// Playback phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Buffering,
    Playing,
}

/// How an advancement enters the queue.
enum AdvanceMode {
    /// Fresh start from Idle: play the head as-is.
    Start,
    /// Normal advancement: pop the head, or rotate it to the tail in loop
    /// mode.
    Next,
    /// Drop the head unconditionally (player fault, dead stream), loop mode
    /// or not: a broken track must never rotate back in.
    DropHead,
}

/// Called once when a session finishes tearing down, so the registry can
/// forget it.
pub(crate) type TeardownHook = Arc<dyn Fn(RoomId) + Send + Sync>;

struct SessionInner {
    room: RoomId,
    deps: SessionDeps,
    connection: StdMutex<Arc<dyn VoiceConnection>>,
    player: Arc<dyn AudioPlayer>,
    queue: StdMutex<PlaybackQueue>,
    state: StdMutex<PlaybackState>,
    /// At most one advancement in flight; held across the whole
    /// materialize-and-play sequence.
    advance_lock: AsyncMutex<()>,
    volume: AtomicU8,
    looping: AtomicBool,
    muted: AtomicBool,
    paused: AtomicBool,
    /// Set while an announcement occupies the player; its completion
    /// advances the queue without stats or ad counting.
    playing_ad: AtomicBool,
    scheduler: StdMutex<AdvertisementScheduler>,
    /// When the current track started, for the played/skipped ratio.
    started_at: StdMutex<Option<Instant>>,
    /// Pending teardown timer, aborted by a new enqueue.
    grace: StdMutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
    on_teardown: TeardownHook,
}

/// Handle to a per-room session. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Join the room's voice transport and start the event tasks.
    pub(crate) async fn create(
        room: RoomId,
        deps: SessionDeps,
        on_teardown: TeardownHook,
    ) -> Result<Session> {
        let connection = deps.transport.join(room).await?;
        let player = connection.player();
        let connection_events = connection.events();
        // Subscribe before the event tasks spawn: an event sent ahead of
        // their first poll must not be lost.
        let player_events = player.events();

        if let Err(e) = player.set_volume(deps.config.default_volume).await {
            warn!(%room, error = %e, "failed to apply initial volume");
        }

        let session = Session {
            inner: Arc::new(SessionInner {
                room,
                volume: AtomicU8::new(deps.config.default_volume),
                scheduler: StdMutex::new(AdvertisementScheduler::new(deps.config.ad_interval)),
                deps,
                connection: StdMutex::new(connection),
                player,
                queue: StdMutex::new(PlaybackQueue::new()),
                state: StdMutex::new(PlaybackState::Idle),
                advance_lock: AsyncMutex::new(()),
                looping: AtomicBool::new(false),
                muted: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                playing_ad: AtomicBool::new(false),
                started_at: StdMutex::new(None),
                grace: StdMutex::new(None),
                destroyed: AtomicBool::new(false),
                tasks: StdMutex::new(Vec::new()),
                on_teardown,
            }),
        };

        let player_task = tokio::spawn(player_event_loop(session.clone(), player_events));
        let supervisor_task = tokio::spawn(
            ConnectionSupervisor::new(session.clone()).run(connection_events),
        );
        {
            let mut tasks = session.inner.tasks.lock().unwrap();
            tasks.push(player_task);
            tasks.push(supervisor_task);
        }

        info!(%room, "session created");
        Ok(session)
    }

    pub fn room(&self) -> RoomId {
        self.inner.room
    }

    pub fn state(&self) -> PlaybackState {
        *self.inner.state.lock().unwrap()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    pub fn is_looping(&self) -> bool {
        self.inner.looping.load(Ordering::SeqCst)
    }

    pub fn volume(&self) -> u8 {
        self.inner.volume.load(Ordering::SeqCst)
    }

    pub fn queue_snapshot(&self) -> Vec<Track> {
        self.inner.queue.lock().unwrap().snapshot()
    }

    pub(crate) fn config(&self) -> &PlaybackConfig {
        &self.inner.deps.config
    }

    /// Append tracks; when the session is idle this kicks off playback.
    pub async fn enqueue(&self, tracks: Vec<Track>) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::SessionDestroyed(self.inner.room));
        }
        self.cancel_grace();

        let was_empty = {
            let mut queue = self.inner.queue.lock().unwrap();
            let was_empty = queue.is_empty();
            queue.push_many(tracks);
            was_empty
        };
        debug!(room = %self.inner.room, was_empty, "tracks enqueued");

        self.start_if_idle().await;
        Ok(())
    }

    /// Insert a track right behind the playing head ("play next").
    pub async fn enqueue_front(&self, track: Track) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::SessionDestroyed(self.inner.room));
        }
        self.cancel_grace();
        {
            let mut queue = self.inner.queue.lock().unwrap();
            queue.push_front_of_pending(track);
        }
        self.start_if_idle().await;
        Ok(())
    }

    /// Dispatch one of the fixed transport controls.
    pub async fn apply_control(&self, control: Control) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::SessionDestroyed(self.inner.room));
        }
        debug!(room = %self.inner.room, control = control.id(), "control dispatched");

        match control {
            Control::Skip => self.skip().await,
            Control::PlayPause => {
                let was_paused = self.inner.paused.fetch_xor(true, Ordering::SeqCst);
                if was_paused {
                    self.inner.player.resume().await
                } else {
                    self.inner.player.pause().await
                }
            }
            Control::Mute => {
                let was_muted = self.inner.muted.fetch_xor(true, Ordering::SeqCst);
                self.inner.player.set_muted(!was_muted).await
            }
            Control::VolumeUp => self.change_volume(i16::from(self.config().volume_step)).await,
            Control::VolumeDown => {
                self.change_volume(-i16::from(self.config().volume_step)).await
            }
            Control::Loop => {
                self.inner.looping.fetch_xor(true, Ordering::SeqCst);
                Ok(())
            }
            Control::Shuffle => {
                let playing = self.state() == PlaybackState::Playing;
                let mut queue = self.inner.queue.lock().unwrap();
                queue.shuffle(self.config().shuffle_policy, playing);
                Ok(())
            }
            Control::Stop => self.stop().await,
        }
    }

    /// Abandon the current track and move on. The ratio check in the
    /// completion path decides whether it counts as played or skipped.
    pub async fn skip(&self) -> Result<()> {
        if let Err(e) = self.inner.player.stop().await {
            warn!(room = %self.inner.room, error = %e, "player stop on skip failed");
        }
        self.handle_track_end().await;
        Ok(())
    }

    /// Forced stop: clear the queue, silence the player, start the grace
    /// timer. Absent a new enqueue before expiry the session is destroyed.
    pub async fn stop(&self) -> Result<()> {
        info!(room = %self.inner.room, "session stopped");
        {
            let mut queue = self.inner.queue.lock().unwrap();
            queue.clear();
        }
        if let Err(e) = self.inner.player.stop().await {
            warn!(room = %self.inner.room, error = %e, "player stop failed");
        }
        *self.inner.started_at.lock().unwrap() = None;
        self.inner.paused.store(false, Ordering::SeqCst);
        self.inner.playing_ad.store(false, Ordering::SeqCst);
        self.set_state(PlaybackState::Idle);
        self.begin_grace(false);
        Ok(())
    }

    /// Tear the session down now: stop audio, release the transport, tell
    /// the registry to forget this room. Idempotent.
    pub async fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(room = %self.inner.room, "session tearing down");

        self.cancel_grace();
        if let Err(e) = self.inner.player.stop().await {
            warn!(room = %self.inner.room, error = %e, "player stop during teardown failed");
        }
        let connection = self.inner.connection.lock().unwrap().clone();
        if let Err(e) = connection.destroy().await {
            warn!(room = %self.inner.room, error = %e, "transport destroy failed");
        }
        (self.inner.on_teardown)(self.inner.room);

        // The caller may be one of these tasks; abort from the outside so
        // teardown itself is never cut short.
        let tasks: Vec<JoinHandle<()>> = self.inner.tasks.lock().unwrap().drain(..).collect();
        tokio::spawn(async move {
            for task in tasks {
                task.abort();
            }
        });
    }

    // ------------------------------------------------------------------
    // Event handling
    // ------------------------------------------------------------------

    /// The current stream ended (completion event or manual skip).
    ///
    /// The advancement lock is held across the whole handler, announcement
    /// playback included: the session never passes through `Idle` between a
    /// completion and the next track, so a concurrently landing enqueue
    /// cannot restart the already-finished head.
    pub(crate) async fn handle_track_end(&self) {
        if self.is_destroyed() {
            return;
        }
        let Ok(_guard) = self.inner.advance_lock.try_lock() else {
            debug!(room = %self.inner.room, "completion already being handled");
            return;
        };

        // An announcement just finished: no stats, no ad counting, resume
        // normal advancement.
        if self.inner.playing_ad.swap(false, Ordering::SeqCst) {
            debug!(room = %self.inner.room, "announcement finished");
            self.advance(AdvanceMode::Next).await;
            return;
        }

        // Nothing in flight: a completion event after stop(), or a skip on
        // an idle session, must not feed the ad counter or re-arm grace.
        let Some(started) = self.inner.started_at.lock().unwrap().take() else {
            debug!(room = %self.inner.room, "no track in flight, completion ignored");
            return;
        };

        if let Some(track) = self.inner.queue.lock().unwrap().head().cloned() {
            self.report_outcome(&track, started.elapsed());
        }

        let ad_due = self.inner.scheduler.lock().unwrap().on_track_completed();
        if ad_due && self.play_announcement().await {
            // The queue advances when the announcement finishes.
            return;
        }

        self.advance(AdvanceMode::Next).await;
    }

    /// The player gave up on the current stream.
    pub(crate) async fn handle_player_fault(&self, reason: String) {
        if self.is_destroyed() {
            return;
        }
        let Ok(_guard) = self.inner.advance_lock.try_lock() else {
            debug!(room = %self.inner.room, "fault raced an advancement, dropped");
            return;
        };

        if self.inner.playing_ad.swap(false, Ordering::SeqCst) {
            warn!(room = %self.inner.room, reason, "announcement playback failed");
            self.advance(AdvanceMode::Next).await;
            return;
        }
        if self.inner.started_at.lock().unwrap().take().is_none() {
            debug!(room = %self.inner.room, reason, "player fault with no track in flight");
            return;
        }

        let title = self
            .inner
            .queue
            .lock()
            .unwrap()
            .head()
            .map(|t| t.display_title().to_string())
            .unwrap_or_default();
        warn!(room = %self.inner.room, title, reason, "player fault, dropping track");

        self.notify(Notice::TrackError { title, reason }).await;
        self.advance(AdvanceMode::DropHead).await;
    }

    /// Replace the dead connection after a transient disconnect.
    pub(crate) async fn rejoin(&self) -> Result<broadcast::Receiver<ConnectionEvent>> {
        let connection = self.inner.deps.transport.join(self.inner.room).await?;
        let events = connection.events();
        *self.inner.connection.lock().unwrap() = connection;
        info!(room = %self.inner.room, "transport rejoined");
        Ok(events)
    }

    // ------------------------------------------------------------------
    // Advancement
    // ------------------------------------------------------------------

    /// Kick playback when nothing is in flight.
    ///
    /// Waits for any advancement in progress and re-checks the state under
    /// the lock: an enqueue racing a completion must start the head at most
    /// once.
    async fn start_if_idle(&self) {
        if self.state() != PlaybackState::Idle {
            return;
        }
        let _guard = self.inner.advance_lock.lock().await;
        if self.state() != PlaybackState::Idle {
            return;
        }
        self.advance(AdvanceMode::Start).await;
    }

    /// Walk the queue to the next playable track. Caller holds the
    /// advancement lock.
    async fn advance(&self, mode: AdvanceMode) {
        let mut mode = mode;
        loop {
            let next = {
                let mut queue = self.inner.queue.lock().unwrap();
                match mode {
                    AdvanceMode::Start => {}
                    AdvanceMode::Next => {
                        if self.inner.looping.load(Ordering::SeqCst) {
                            queue.rotate_head_to_tail();
                        } else {
                            queue.pop_head();
                        }
                    }
                    AdvanceMode::DropHead => {
                        queue.pop_head();
                    }
                }
                queue.head().cloned()
            };

            let Some(track) = next else {
                self.set_state(PlaybackState::Idle);
                self.begin_grace(true);
                return;
            };

            self.set_state(PlaybackState::Buffering);
            let Some(stream) = self.inner.deps.sources.materialize(&track).await else {
                self.notify(Notice::TrackError {
                    title: track.display_title().to_string(),
                    reason: "no playable stream".into(),
                })
                .await;
                mode = AdvanceMode::DropHead;
                continue;
            };

            if let Err(e) = self.inner.player.play(stream).await {
                self.notify(Notice::TrackError {
                    title: track.display_title().to_string(),
                    reason: e.to_string(),
                })
                .await;
                mode = AdvanceMode::DropHead;
                continue;
            }

            *self.inner.started_at.lock().unwrap() = Some(Instant::now());
            self.inner.paused.store(false, Ordering::SeqCst);
            self.set_state(PlaybackState::Playing);
            info!(
                room = %self.inner.room,
                title = track.display_title(),
                duration_secs = track.duration_secs,
                "now playing"
            );
            self.notify(Notice::NowPlaying {
                title: track.display_title().to_string(),
                requested_by: track.requested_by,
                duration_secs: track.duration_secs,
                controls: &Control::ALL,
            })
            .await;
            return;
        }
    }

    /// Play a sponsor announcement instead of advancing. Returns false when
    /// there is nothing to play (empty catalog, no audio, dead stream), in
    /// which case the caller advances normally.
    async fn play_announcement(&self) -> bool {
        let Some(announcement) = self.inner.deps.ads.pick().await else {
            return false;
        };
        self.notify(Notice::Announcement(announcement.notice.clone()))
            .await;

        let Some(url) = announcement.choose_audio() else {
            // Visual-only announcement.
            return false;
        };
        let Some(stream) = self.inner.deps.sources.open_url(url).await else {
            return false;
        };
        if let Err(e) = self.inner.player.play(stream).await {
            warn!(room = %self.inner.room, error = %e, "announcement failed to start");
            return false;
        }

        self.inner.playing_ad.store(true, Ordering::SeqCst);
        self.set_state(PlaybackState::Playing);
        info!(room = %self.inner.room, url, "announcement playing");
        true
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn report_outcome(&self, track: &Track, elapsed: std::time::Duration) {
        let threshold = f64::from(self.config().played_ratio_percent);
        let played =
            elapsed.as_secs_f64() * 100.0 >= track.duration_secs as f64 * threshold;
        if played {
            stats::report_played(
                self.inner.deps.stats.clone(),
                track.requested_by,
                track.source.canonical.clone(),
                elapsed.as_secs() / 60,
                track.source.platform,
                track.display_title().to_string(),
            );
        } else {
            stats::report_skipped(
                self.inner.deps.stats.clone(),
                track.requested_by,
                track.source.canonical.clone(),
                track.display_title().to_string(),
            );
        }
    }

    async fn change_volume(&self, delta: i16) -> Result<()> {
        let current = i16::from(self.inner.volume.load(Ordering::SeqCst));
        let next = (current + delta).clamp(0, 100) as u8;
        self.inner.volume.store(next, Ordering::SeqCst);
        self.inner.player.set_volume(next).await
    }

    fn set_state(&self, state: PlaybackState) {
        *self.inner.state.lock().unwrap() = state;
    }

    /// Start (or restart) the teardown timer. `drained` distinguishes a
    /// naturally emptied queue (announced as QueueEnded) from a forced stop.
    fn begin_grace(&self, drained: bool) {
        let session = self.clone();
        let grace = self.config().stop_grace();
        let handle = tokio::spawn(async move {
            if drained {
                session.notify(Notice::QueueEnded).await;
            }
            tokio::time::sleep(grace).await;
            if session.is_destroyed() {
                return;
            }
            if !session.inner.queue.lock().unwrap().is_empty() {
                return;
            }
            info!(room = %session.inner.room, "grace period expired, leaving");
            session.notify(Notice::LeftInactive).await;
            session.destroy().await;
        });

        let mut grace_slot = self.inner.grace.lock().unwrap();
        if let Some(old) = grace_slot.replace(handle) {
            old.abort();
        }
    }

    fn cancel_grace(&self) {
        if let Some(handle) = self.inner.grace.lock().unwrap().take() {
            handle.abort();
        }
    }

    pub(crate) async fn notify(&self, notice: Notice) {
        if let Err(e) = self
            .inner
            .deps
            .notifier
            .send(self.inner.room, notice)
            .await
        {
            warn!(room = %self.inner.room, error = %e, "notice delivery failed");
        }
    }
}

/// Drives the session from player events until the session goes away.
async fn player_event_loop(session: Session, mut events: broadcast::Receiver<PlayerEvent>) {
    loop {
        match events.recv().await {
            Ok(PlayerEvent::Finished) => session.handle_track_end().await,
            Ok(PlayerEvent::Errored(reason)) => session.handle_player_fault(reason).await,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(room = %session.inner.room, missed, "player events lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
        if session.is_destroyed() {
            break;
        }
    }
}

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::time::sleep;

use voxplayback::{
    AdCatalog, Announcement, AudioPlayer, AudioStream, ConnectionEvent, Control, DisconnectCause,
    Error, Notice, Notifier, PlaybackConfig, PlaybackState, PlayerEvent, RoomId, SessionDeps,
    SessionRegistry, SourceFactory, StatsSink, StreamProvider, Track, UserId, VoiceConnection,
    VoiceTransport,
};
use voxresolve::{Platform, SourceRef};

const ROOM: RoomId = RoomId(42);
const REQUESTER: UserId = UserId(7);

// ----------------------------------------------------------------------
// Mock collaborators
// ----------------------------------------------------------------------

struct MockPlayer {
    events: broadcast::Sender<PlayerEvent>,
    played: Mutex<Vec<String>>,
    volumes: Mutex<Vec<u8>>,
}

impl MockPlayer {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            events: broadcast::channel(64).0,
            played: Mutex::new(Vec::new()),
            volumes: Mutex::new(Vec::new()),
        })
    }

    fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }

    fn finish(&self) {
        let _ = self.events.send(PlayerEvent::Finished);
    }

    fn fail(&self, reason: &str) {
        let _ = self.events.send(PlayerEvent::Errored(reason.into()));
    }
}

#[async_trait]
impl AudioPlayer for MockPlayer {
    async fn play(&self, stream: AudioStream) -> voxplayback::Result<()> {
        self.played.lock().unwrap().push(stream.url);
        Ok(())
    }

    async fn pause(&self) -> voxplayback::Result<()> {
        Ok(())
    }

    async fn resume(&self) -> voxplayback::Result<()> {
        Ok(())
    }

    async fn stop(&self) -> voxplayback::Result<()> {
        Ok(())
    }

    async fn set_volume(&self, volume: u8) -> voxplayback::Result<()> {
        self.volumes.lock().unwrap().push(volume);
        Ok(())
    }

    async fn set_muted(&self, _muted: bool) -> voxplayback::Result<()> {
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }
}

struct MockConnection {
    events: broadcast::Sender<ConnectionEvent>,
    player: Arc<MockPlayer>,
    destroyed: AtomicBool,
}

impl MockConnection {
    fn disconnect(&self, cause: DisconnectCause) {
        let _ = self.events.send(ConnectionEvent::Disconnected { cause });
    }
}

#[async_trait]
impl VoiceConnection for MockConnection {
    fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    fn player(&self) -> Arc<dyn AudioPlayer> {
        self.player.clone()
    }

    async fn destroy(&self) -> voxplayback::Result<()> {
        self.destroyed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct MockTransport {
    player: Arc<MockPlayer>,
    joins: AtomicU32,
    /// Joins beyond this count are refused (reconnect-bound tests).
    allow_joins: AtomicU32,
    last: Mutex<Option<Arc<MockConnection>>>,
}

impl MockTransport {
    fn new(player: Arc<MockPlayer>) -> Arc<Self> {
        Arc::new(Self {
            player,
            joins: AtomicU32::new(0),
            allow_joins: AtomicU32::new(u32::MAX),
            last: Mutex::new(None),
        })
    }

    fn joins(&self) -> u32 {
        self.joins.load(Ordering::SeqCst)
    }

    fn connection(&self) -> Arc<MockConnection> {
        self.last.lock().unwrap().clone().expect("no connection")
    }
}

#[async_trait]
impl VoiceTransport for MockTransport {
    async fn join(&self, _room: RoomId) -> voxplayback::Result<Arc<dyn VoiceConnection>> {
        let n = self.joins.fetch_add(1, Ordering::SeqCst) + 1;
        if n > self.allow_joins.load(Ordering::SeqCst) {
            return Err(Error::Transport("join refused".into()));
        }

        let connection = Arc::new(MockConnection {
            events: broadcast::channel(64).0,
            player: self.player.clone(),
            destroyed: AtomicBool::new(false),
        });
        *self.last.lock().unwrap() = Some(connection.clone());

        // Signalling completes shortly after the join returns.
        let events = connection.events.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(30)).await;
            let _ = events.send(ConnectionEvent::Ready);
        });

        Ok(connection)
    }
}

struct MockProvider {
    fail_urls: Mutex<HashSet<String>>,
}

impl MockProvider {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_urls: Mutex::new(HashSet::new()),
        })
    }

    fn fail_on(&self, url: &str) {
        self.fail_urls.lock().unwrap().insert(url.to_string());
    }
}

#[async_trait]
impl StreamProvider for MockProvider {
    async fn open(&self, url: &str) -> voxplayback::Result<AudioStream> {
        if self.fail_urls.lock().unwrap().contains(url) {
            return Err(Error::Stream(url.to_string()));
        }
        Ok(AudioStream {
            url: url.to_string(),
            handle: url.to_string(),
        })
    }

    async fn open_native(&self, native_id: &str) -> voxplayback::Result<AudioStream> {
        Ok(AudioStream {
            url: format!("native:{native_id}"),
            handle: native_id.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Stat {
    Played(String),
    Skipped(String),
}

struct MockStats {
    events: Mutex<Vec<Stat>>,
}

impl MockStats {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    fn events(&self) -> Vec<Stat> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatsSink for MockStats {
    async fn record_played(
        &self,
        _user: UserId,
        _reference: &str,
        _minutes: u64,
        _platform: Platform,
        title: &str,
    ) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(Stat::Played(title.into()));
        Ok(())
    }

    async fn record_skipped(
        &self,
        _user: UserId,
        _reference: &str,
        title: &str,
    ) -> anyhow::Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(Stat::Skipped(title.into()));
        Ok(())
    }

    async fn record_listening(&self, _user: UserId, _minutes: u64) -> anyhow::Result<()> {
        Ok(())
    }
}

struct MockNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl MockNotifier {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            notices: Mutex::new(Vec::new()),
        })
    }

    fn count_track_errors(&self) -> usize {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|n| matches!(n, Notice::TrackError { .. }))
            .count()
    }

    fn has_queue_ended(&self) -> bool {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .any(|n| matches!(n, Notice::QueueEnded))
    }

    fn announcement_count(&self) -> usize {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|n| matches!(n, Notice::Announcement(_)))
            .count()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, _room: RoomId, notice: Notice) -> anyhow::Result<()> {
        self.notices.lock().unwrap().push(notice);
        Ok(())
    }
}

struct MockAds {
    announcement: Option<Announcement>,
}

#[async_trait]
impl AdCatalog for MockAds {
    async fn pick(&self) -> Option<Announcement> {
        self.announcement.clone()
    }
}

/// Catalog that stalls in `pick`, exposing the window where a completion is
/// still being handled.
struct SlowAds {
    announcement: Announcement,
    delay: Duration,
}

#[async_trait]
impl AdCatalog for SlowAds {
    async fn pick(&self) -> Option<Announcement> {
        sleep(self.delay).await;
        Some(self.announcement.clone())
    }
}

// ----------------------------------------------------------------------
// Harness
// ----------------------------------------------------------------------

struct Harness {
    registry: SessionRegistry,
    transport: Arc<MockTransport>,
    player: Arc<MockPlayer>,
    provider: Arc<MockProvider>,
    stats: Arc<MockStats>,
    notifier: Arc<MockNotifier>,
}

fn harness_with(config: PlaybackConfig, ad: Option<Announcement>, secondary: bool) -> Harness {
    harness_full(config, Arc::new(MockAds { announcement: ad }), secondary)
}

fn harness_full(config: PlaybackConfig, ads: Arc<dyn AdCatalog>, secondary: bool) -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let player = MockPlayer::new();
    let transport = MockTransport::new(player.clone());
    let provider = MockProvider::new();
    let stats = MockStats::new();
    let notifier = MockNotifier::new();

    let mut sources = SourceFactory::new(provider.clone());
    if secondary {
        sources = sources.with_secondary(provider.clone());
    }

    let registry = SessionRegistry::new(SessionDeps {
        transport: transport.clone(),
        sources: Arc::new(sources),
        stats: stats.clone(),
        notifier: notifier.clone(),
        ads,
        config,
    });

    Harness {
        registry,
        transport,
        player,
        provider,
        stats,
        notifier,
    }
}

fn harness(config: PlaybackConfig) -> Harness {
    harness_with(config, None, false)
}

fn quick_config() -> PlaybackConfig {
    PlaybackConfig {
        ad_interval: 0,
        stop_grace_secs: 1,
        reconnect_max_attempts: 3,
        reconnect_backoff_step_secs: 0,
        ready_timeout_secs: 1,
        ..PlaybackConfig::default()
    }
}

fn track(name: &str, duration_secs: u64) -> Track {
    let url = format!("https://www.youtube.com/watch?v={name}");
    Track::new(
        name,
        SourceRef::parse(&url),
        Some(url),
        duration_secs,
        REQUESTER,
    )
}

fn url_of(name: &str) -> String {
    format!("https://www.youtube.com/watch?v={name}")
}

/// Let the event tasks drain.
async fn settle() {
    sleep(Duration::from_millis(120)).await;
}

// ----------------------------------------------------------------------
// Queue / session lifecycle
// ----------------------------------------------------------------------

#[tokio::test]
async fn drains_to_idle_and_leaves_after_grace() -> anyhow::Result<()> {
    let h = harness(quick_config());
    let session = h.registry.get_or_create(ROOM).await?;

    session.enqueue(vec![track("a", 180), track("b", 200)]).await?;
    assert_eq!(session.state(), PlaybackState::Playing);
    assert_eq!(h.player.played(), [url_of("a")]);

    h.player.finish();
    settle().await;
    assert_eq!(h.player.played(), [url_of("a"), url_of("b")]);

    h.player.finish();
    settle().await;
    assert_eq!(session.state(), PlaybackState::Idle);
    assert!(h.notifier.has_queue_ended());

    // Queue-ended grace expires with no new enqueue: session gone, transport
    // released.
    sleep(Duration::from_millis(1_300)).await;
    assert!(h.registry.get(ROOM).await.is_none());
    assert!(h.transport.connection().destroyed.load(Ordering::SeqCst));
    Ok(())
}

#[tokio::test]
async fn played_and_skipped_follow_the_elapsed_ratio() -> anyhow::Result<()> {
    let h = harness(quick_config());
    let session = h.registry.get_or_create(ROOM).await?;

    // 1s track allowed to run ~0.7s: above the 50% ratio, counts as played.
    session.enqueue(vec![track("long-enough", 1)]).await?;
    sleep(Duration::from_millis(700)).await;
    h.player.finish();
    settle().await;

    // 600s track finished immediately: skipped.
    session.enqueue(vec![track("cut-short", 600)]).await?;
    h.player.finish();
    settle().await;

    assert_eq!(
        h.stats.events(),
        [
            Stat::Played("long-enough".into()),
            Stat::Skipped("cut-short".into())
        ]
    );
    Ok(())
}

#[tokio::test]
async fn loop_mode_restores_original_order_after_full_cycle() -> anyhow::Result<()> {
    let h = harness(quick_config());
    let session = h.registry.get_or_create(ROOM).await?;

    session.apply_control(Control::Loop).await?;
    assert!(session.is_looping());
    session
        .enqueue(vec![track("a", 300), track("b", 300), track("c", 300)])
        .await?;

    for _ in 0..3 {
        h.player.finish();
        settle().await;
    }

    // After N advancements with N tracks, the queue is back in order and the
    // head is playing again.
    let titles: Vec<String> = session.queue_snapshot().iter().map(|t| t.title.clone()).collect();
    assert_eq!(titles, ["a", "b", "c"]);
    assert_eq!(
        h.player.played(),
        [url_of("a"), url_of("b"), url_of("c"), url_of("a")]
    );
    Ok(())
}

#[tokio::test]
async fn new_enqueue_during_grace_cancels_teardown() -> anyhow::Result<()> {
    let h = harness(quick_config());
    let session = h.registry.get_or_create(ROOM).await?;

    session.enqueue(vec![track("a", 300)]).await?;
    h.player.finish();
    settle().await;
    assert_eq!(session.state(), PlaybackState::Idle);

    sleep(Duration::from_millis(300)).await;
    session.enqueue(vec![track("b", 300)]).await?;

    sleep(Duration::from_millis(1_300)).await;
    assert!(h.registry.get(ROOM).await.is_some());
    assert_eq!(session.state(), PlaybackState::Playing);
    Ok(())
}

// ----------------------------------------------------------------------
// Failure handling
// ----------------------------------------------------------------------

#[tokio::test]
async fn player_fault_drops_the_track_even_in_loop_mode() -> anyhow::Result<()> {
    let h = harness(quick_config());
    let session = h.registry.get_or_create(ROOM).await?;

    session.apply_control(Control::Loop).await?;
    session.enqueue(vec![track("broken", 300), track("fine", 300)]).await?;

    h.player.fail("decoder gave up");
    settle().await;

    let titles: Vec<String> = session.queue_snapshot().iter().map(|t| t.title.clone()).collect();
    assert_eq!(titles, ["fine"], "faulted track must not rotate back in");
    assert_eq!(h.notifier.count_track_errors(), 1);
    assert_eq!(h.player.played().last().unwrap(), &url_of("fine"));
    Ok(())
}

#[tokio::test]
async fn unmaterializable_track_is_skipped_with_a_notice() -> anyhow::Result<()> {
    let h = harness(quick_config());
    h.provider.fail_on(&url_of("dead"));
    let session = h.registry.get_or_create(ROOM).await?;

    session.enqueue(vec![track("dead", 300), track("alive", 300)]).await?;

    assert_eq!(h.player.played(), [url_of("alive")]);
    assert_eq!(h.notifier.count_track_errors(), 1);
    assert_eq!(session.state(), PlaybackState::Playing);
    Ok(())
}

#[tokio::test]
async fn secondary_provider_rescues_a_failed_primary() -> anyhow::Result<()> {
    let h = harness_with(quick_config(), None, true);
    h.provider.fail_on(&url_of("flaky"));
    let session = h.registry.get_or_create(ROOM).await?;

    session.enqueue(vec![track("flaky", 300)]).await?;

    // The secondary provider re-derives the platform-native id.
    assert_eq!(h.player.played(), ["native:flaky".to_string()]);
    assert_eq!(h.notifier.count_track_errors(), 0);
    assert_eq!(session.state(), PlaybackState::Playing);
    Ok(())
}

// ----------------------------------------------------------------------
// Advertisement cadence
// ----------------------------------------------------------------------

#[tokio::test]
async fn one_announcement_after_every_interval_tracks() -> anyhow::Result<()> {
    let ad = Announcement {
        notice: "a word from our sponsor".into(),
        audio_urls: vec!["https://ads.example/spot.mp3".into()],
    };
    let config = PlaybackConfig {
        ad_interval: 2,
        ..quick_config()
    };
    let h = harness_with(config, Some(ad), false);
    let session = h.registry.get_or_create(ROOM).await?;

    session
        .enqueue(vec![
            track("t1", 300),
            track("t2", 300),
            track("t3", 300),
            track("t4", 300),
            track("t5", 300),
        ])
        .await?;

    // Six completions: t1, t2, ad, t3, t4, ad; t5 plays after the second ad.
    for _ in 0..6 {
        h.player.finish();
        settle().await;
    }

    assert_eq!(
        h.player.played(),
        [
            url_of("t1"),
            url_of("t2"),
            "https://ads.example/spot.mp3".to_string(),
            url_of("t3"),
            url_of("t4"),
            "https://ads.example/spot.mp3".to_string(),
            url_of("t5"),
        ]
    );
    assert_eq!(h.notifier.announcement_count(), 2);

    // Announcements never land in the visible queue.
    assert!(session
        .queue_snapshot()
        .iter()
        .all(|t| !t.title.contains("sponsor")));
    Ok(())
}

#[tokio::test]
async fn enqueue_during_completion_never_replays_the_finished_track() -> anyhow::Result<()> {
    let config = PlaybackConfig {
        ad_interval: 1,
        ..quick_config()
    };
    let ads = Arc::new(SlowAds {
        announcement: Announcement {
            notice: "a word from our sponsor".into(),
            audio_urls: vec!["https://ads.example/spot.mp3".into()],
        },
        delay: Duration::from_millis(300),
    });
    let h = harness_full(config, ads, false);
    let session = h.registry.get_or_create(ROOM).await?;

    session.enqueue(vec![track("t1", 300)]).await?;
    h.player.finish();
    // Completion handling is now stalled inside the catalog pick; an
    // enqueue landing in that window must not restart the finished head.
    sleep(Duration::from_millis(100)).await;
    session.enqueue(vec![track("t2", 300)]).await?;

    sleep(Duration::from_millis(400)).await;
    h.player.finish(); // announcement completes
    settle().await;

    assert_eq!(
        h.player.played(),
        [
            url_of("t1"),
            "https://ads.example/spot.mp3".to_string(),
            url_of("t2"),
        ]
    );
    assert_eq!(h.stats.events().len(), 1, "t1 reported exactly once");
    Ok(())
}

// ----------------------------------------------------------------------
// Controls
// ----------------------------------------------------------------------

#[tokio::test]
async fn skip_while_idle_is_a_no_op() -> anyhow::Result<()> {
    let ad = Announcement {
        notice: "a word from our sponsor".into(),
        audio_urls: vec!["https://ads.example/spot.mp3".into()],
    };
    let config = PlaybackConfig {
        ad_interval: 3,
        ..quick_config()
    };
    let h = harness_with(config, Some(ad), false);
    let session = h.registry.get_or_create(ROOM).await?;

    // Nothing playing: skips must not feed the ad counter, report stats or
    // announce a drained queue.
    for _ in 0..3 {
        session.apply_control(Control::Skip).await?;
    }
    settle().await;

    assert!(h.player.played().is_empty());
    assert_eq!(h.notifier.announcement_count(), 0);
    assert!(!h.notifier.has_queue_ended());
    assert!(h.stats.events().is_empty());
    Ok(())
}

#[tokio::test]
async fn volume_controls_clamp_to_bounds() -> anyhow::Result<()> {
    let h = harness(quick_config());
    let session = h.registry.get_or_create(ROOM).await?;

    session.apply_control(Control::VolumeUp).await?;
    assert_eq!(session.volume(), 100, "volume must not exceed 100");

    for _ in 0..3 {
        session.apply_control(Control::VolumeDown).await?;
    }
    assert_eq!(session.volume(), 70);

    for _ in 0..20 {
        session.apply_control(Control::VolumeDown).await?;
    }
    assert_eq!(session.volume(), 0);
    Ok(())
}

#[tokio::test]
async fn skip_advances_and_records_the_abandoned_track() -> anyhow::Result<()> {
    let h = harness(quick_config());
    let session = h.registry.get_or_create(ROOM).await?;

    session.enqueue(vec![track("skipped-one", 600), track("next", 300)]).await?;
    session.apply_control(Control::Skip).await?;
    settle().await;

    assert_eq!(h.player.played(), [url_of("skipped-one"), url_of("next")]);
    assert_eq!(h.stats.events(), [Stat::Skipped("skipped-one".into())]);
    Ok(())
}

#[tokio::test]
async fn shuffle_keep_head_leaves_the_playing_track_in_place() -> anyhow::Result<()> {
    let h = harness(quick_config());
    let session = h.registry.get_or_create(ROOM).await?;

    session
        .enqueue(vec![
            track("head", 300),
            track("b", 300),
            track("c", 300),
            track("d", 300),
            track("e", 300),
        ])
        .await?;

    for _ in 0..10 {
        session.apply_control(Control::Shuffle).await?;
        assert_eq!(session.queue_snapshot()[0].title, "head");
    }
    Ok(())
}

#[tokio::test]
async fn stop_clears_the_queue_and_starts_grace() -> anyhow::Result<()> {
    let h = harness(quick_config());
    let session = h.registry.get_or_create(ROOM).await?;

    session.enqueue(vec![track("a", 300), track("b", 300)]).await?;
    session.apply_control(Control::Stop).await?;

    assert!(session.queue_snapshot().is_empty());
    assert_eq!(session.state(), PlaybackState::Idle);

    sleep(Duration::from_millis(1_300)).await;
    assert!(h.registry.get(ROOM).await.is_none());
    Ok(())
}

// ----------------------------------------------------------------------
// Connection supervision
// ----------------------------------------------------------------------

#[tokio::test]
async fn fatal_disconnect_stops_the_session_immediately() -> anyhow::Result<()> {
    let h = harness(quick_config());
    let session = h.registry.get_or_create(ROOM).await?;
    session.enqueue(vec![track("a", 300)]).await?;

    h.transport
        .connection()
        .disconnect(DisconnectCause::Fatal("kicked from room".into()));
    settle().await;

    assert!(session.is_destroyed());
    assert!(h.registry.get(ROOM).await.is_none());
    assert_eq!(h.transport.joins(), 1, "no rejoin after a fatal cause");
    Ok(())
}

#[tokio::test]
async fn transient_disconnect_rejoins_with_backoff() -> anyhow::Result<()> {
    let h = harness(quick_config());
    let session = h.registry.get_or_create(ROOM).await?;
    session.enqueue(vec![track("a", 300)]).await?;

    let first = h.transport.connection();
    first.disconnect(DisconnectCause::Transient("network blip".into()));
    sleep(Duration::from_millis(500)).await;

    assert_eq!(h.transport.joins(), 2);
    assert!(!session.is_destroyed());
    assert!(h.registry.get(ROOM).await.is_some());
    Ok(())
}

#[tokio::test]
async fn reconnection_is_bounded_by_attempt_count() -> anyhow::Result<()> {
    let config = PlaybackConfig {
        reconnect_max_attempts: 2,
        ..quick_config()
    };
    let h = harness(config);
    let session = h.registry.get_or_create(ROOM).await?;
    session.enqueue(vec![track("a", 300)]).await?;

    // Every join after the initial one is refused.
    h.transport.allow_joins.store(1, Ordering::SeqCst);
    h.transport
        .connection()
        .disconnect(DisconnectCause::Transient("persistent outage".into()));
    sleep(Duration::from_millis(800)).await;

    assert_eq!(h.transport.joins(), 3, "1 initial join + 2 bounded attempts");
    assert!(session.is_destroyed());
    assert!(h.registry.get(ROOM).await.is_none());
    Ok(())
}

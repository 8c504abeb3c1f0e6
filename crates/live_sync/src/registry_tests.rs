use std::sync::atomic::AtomicU32;
use std::time::Duration;

use super::*;
use crate::channel::{ChannelEvent, ChannelStatus, ScriptedChannel};
use crate::session::SyncMode;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use league_core::ChangeKind;
use scoring::StoreError;
use tokio::time::sleep;

#[derive(Default)]
struct CountingTarget {
    refreshes: AtomicU32,
    busy: AtomicBool,
}

impl CountingTarget {
    fn count(&self) -> u32 {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RefreshTarget for CountingTarget {
    async fn refresh(&self) -> Result<(), StoreError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        None
    }
}

fn setup() -> (Arc<ScriptedChannel>, SyncRegistry, Arc<CountingTarget>) {
    let channel = Arc::new(ScriptedChannel::new());
    let registry = SyncRegistry::new(channel.clone(), SyncConfig::default());
    (channel, registry, Arc::new(CountingTarget::default()))
}

/// Let spawned drivers run; time is paused so this advances the clock by 1ms.
async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_notices_refreshes_once() {
    let (channel, registry, target) = setup();
    let _handle = registry.attach(MatchId::new(), target.clone());
    settle().await;

    channel.emit(ChannelEvent::Status(ChannelStatus::Subscribed));
    settle().await;
    assert_eq!(target.count(), 1);

    for _ in 0..4 {
        channel.emit(ChannelEvent::Notice(ChangeKind::Insert));
        sleep(Duration::from_millis(30)).await;
    }
    sleep(Duration::from_millis(400)).await;
    assert_eq!(target.count(), 1);

    sleep(Duration::from_millis(200)).await;
    assert_eq!(target.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_trips_to_polling() {
    let (channel, registry, target) = setup();
    let handle = registry.attach(MatchId::new(), target.clone());
    settle().await;
    assert_eq!(channel.subscribe_count(), 1);

    for _ in 0..5 {
        channel.emit(ChannelEvent::Status(ChannelStatus::Timeout));
        settle().await;
    }
    assert_eq!(channel.subscribe_count(), 5);
    assert!(!channel.is_subscribed());
    let status = handle.status();
    assert_eq!(status.mode, SyncMode::Polling);
    assert_eq!(status.failure_count, 5);

    // A sixth error after the trip is not acted on
    channel.emit(ChannelEvent::Status(ChannelStatus::Error));
    settle().await;
    assert_eq!(channel.subscribe_count(), 5);

    sleep(Duration::from_millis(5_000)).await;
    assert_eq!(target.count(), 1);
    sleep(Duration::from_millis(5_000)).await;
    assert_eq!(target.count(), 2);
    assert_eq!(handle.status().mode, SyncMode::Polling);
}

#[tokio::test(start_paused = true)]
async fn test_refused_subscribes_count_as_failures() {
    let (channel, registry, target) = setup();
    channel.refuse_next(10);
    let handle = registry.attach(MatchId::new(), target);
    settle().await;

    assert_eq!(channel.subscribe_count(), 5);
    assert_eq!(handle.status().mode, SyncMode::Polling);
    assert_eq!(handle.status().subscribe_attempts, 5);
}

#[tokio::test(start_paused = true)]
async fn test_closed_transport_degrades_to_polling() {
    let (channel, registry, target) = setup();
    let handle = registry.attach(MatchId::new(), target.clone());
    settle().await;
    channel.emit(ChannelEvent::Status(ChannelStatus::Subscribed));
    settle().await;
    assert_eq!(target.count(), 1);

    channel.close();
    channel.emit(ChannelEvent::Status(ChannelStatus::Closed));
    settle().await;
    assert_eq!(handle.status().mode, SyncMode::Polling);
    assert_eq!(channel.subscribe_count(), 5);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(target.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_attach_is_idempotent_per_match() {
    let (channel, registry, first) = setup();
    let second = Arc::new(CountingTarget::default());
    let id = MatchId::new();

    let a = registry.attach(id, first.clone());
    let b = registry.attach(id, second.clone());
    settle().await;
    assert_eq!(channel.subscribe_count(), 1);
    assert_eq!(registry.session_count(), 1);
    assert_eq!(registry.viewer_count(id), 2);

    channel.emit(ChannelEvent::Status(ChannelStatus::Subscribed));
    settle().await;
    assert_eq!(first.count(), 1);
    assert_eq!(second.count(), 1);

    a.detach();
    a.detach();
    settle().await;
    assert_eq!(registry.viewer_count(id), 1);
    assert!(channel.is_subscribed());

    drop(b);
    settle().await;
    assert_eq!(registry.session_count(), 0);
    assert!(!channel.is_subscribed());
    assert_eq!(channel.unsubscribe_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_stops_timers() {
    let (channel, registry, target) = setup();
    let handle = registry.attach(MatchId::new(), target.clone());
    settle().await;

    channel.emit(ChannelEvent::Notice(ChangeKind::Update));
    settle().await;
    handle.detach();
    settle().await;
    assert!(handle.status().torn_down);

    sleep(Duration::from_secs(60)).await;
    assert_eq!(target.count(), 0);
    handle.detach();
}

#[tokio::test(start_paused = true)]
async fn test_safety_poll_skips_busy_targets() {
    let (_channel, registry, target) = setup();
    let _handle = registry.attach(MatchId::new(), target.clone());

    sleep(Duration::from_millis(30_001)).await;
    assert_eq!(target.count(), 1);

    target.busy.store(true, Ordering::SeqCst);
    sleep(Duration::from_secs(30)).await;
    assert_eq!(target.count(), 1);

    target.busy.store(false, Ordering::SeqCst);
    sleep(Duration::from_secs(30)).await;
    assert_eq!(target.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_all_sessions() {
    let (channel, registry, target) = setup();
    let handle = registry.attach(MatchId::new(), target.clone());
    let _other = registry.attach(MatchId::new(), target);
    settle().await;
    assert_eq!(registry.session_count(), 2);

    registry.shutdown();
    settle().await;
    assert_eq!(registry.session_count(), 0);
    assert!(handle.status().torn_down);
    assert_eq!(channel.unsubscribe_count(), 2);
    handle.detach();
}

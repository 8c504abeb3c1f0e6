//! The task behind one subscription session.
//!
//! Waits on channel events, the debounce deadline, the fallback poll (after a
//! breaker trip only), the safety-net poll and the shutdown signal. All timers
//! are locals of [`SyncDriver::run`], so they end with it.

use std::future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::channel::{ChannelEvent, ChannelStatus, EventChannel, SubscriptionHandle};
use crate::config::SyncConfig;
use crate::session::{SessionAction, SubscriptionSession, SyncMode};
use crate::target::RefreshTarget;

/// Observable state of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncStatus {
    pub mode: SyncMode,
    pub failure_count: u32,
    pub refresh_count: u64,
    pub subscribe_attempts: u32,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub torn_down: bool,
}

pub(crate) struct Viewer {
    pub(crate) id: u64,
    pub(crate) target: Arc<dyn RefreshTarget>,
}

pub(crate) type Viewers = Arc<Mutex<Vec<Viewer>>>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Events = Option<mpsc::UnboundedReceiver<ChannelEvent>>;

pub(crate) struct SyncDriver {
    session: SubscriptionSession,
    channel: Arc<dyn EventChannel>,
    viewers: Viewers,
    status: watch::Sender<SyncStatus>,
    config: SyncConfig,
    handle: Option<SubscriptionHandle>,
}

impl SyncDriver {
    pub(crate) fn new(
        session: SubscriptionSession,
        channel: Arc<dyn EventChannel>,
        viewers: Viewers,
        status: watch::Sender<SyncStatus>,
        config: SyncConfig,
    ) -> Self {
        Self {
            session,
            channel,
            viewers,
            status,
            config,
            handle: None,
        }
    }

    pub(crate) async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        let mut fallback: Option<Interval> = None;
        let mut events = self.connect(&mut fallback);

        let period = self.config.safety_poll();
        let mut safety = interval_at(Instant::now() + period, period);
        safety.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let debounce = self.session.debounce_deadline();
            tokio::select! {
                _ = &mut shutdown => break,
                event = next_event(&mut events) => {
                    let event = event.unwrap_or(ChannelEvent::Status(ChannelStatus::Closed));
                    self.on_event(event, &mut events, &mut fallback).await;
                }
                _ = wait_until(debounce) => {
                    if self.session.take_due(Instant::now()) {
                        self.refresh_all("debounce").await;
                    }
                }
                _ = next_tick(&mut fallback) => self.refresh_all("fallback poll").await,
                _ = safety.tick() => {
                    if self.any_busy() {
                        debug!(topic = %self.session.topic(), "safety poll skipped, action in flight");
                    } else {
                        self.refresh_all("safety poll").await;
                    }
                }
            }
        }

        self.teardown();
    }

    async fn on_event(&mut self, event: ChannelEvent, events: &mut Events, fallback: &mut Option<Interval>) {
        let action = match event {
            ChannelEvent::Notice(kind) => {
                debug!(topic = %self.session.topic(), kind = ?kind, "change notice");
                self.session.on_notice(Instant::now())
            }
            ChannelEvent::Status(ChannelStatus::Subscribed) => self.session.on_subscribed(),
            ChannelEvent::Status(status) => {
                debug!(topic = %self.session.topic(), status = ?status, "channel failure");
                self.session.on_failure(Instant::now())
            }
        };

        match action {
            SessionAction::Refresh => {
                self.publish();
                self.refresh_all("subscribed").await;
            }
            SessionAction::Resubscribe => {
                *events = self.connect(fallback);
            }
            SessionAction::Trip => {
                *events = None;
                self.trip(fallback);
            }
            SessionAction::Debounce(_) | SessionAction::Ignore => {}
        }
        self.publish();
    }

    /// Replace the current subscription. Refused subscribes count as failures,
    /// so this ends either subscribed or tripped.
    fn connect(&mut self, fallback: &mut Option<Interval>) -> Events {
        loop {
            self.release_subscription();
            let (tx, rx) = mpsc::unbounded_channel();
            self.status.send_modify(|s| s.subscribe_attempts += 1);

            match self.channel.subscribe(self.session.topic(), tx) {
                Ok(handle) => {
                    self.handle = Some(handle);
                    return Some(rx);
                }
                Err(e) => {
                    warn!(topic = %self.session.topic(), error = %e, "subscribe failed");
                    match self.session.on_failure(Instant::now()) {
                        SessionAction::Resubscribe => continue,
                        SessionAction::Trip => self.trip(fallback),
                        _ => {}
                    }
                    self.publish();
                    return None;
                }
            }
        }
    }

    fn trip(&mut self, fallback: &mut Option<Interval>) {
        self.release_subscription();
        let period = self.config.fallback_poll();
        let mut poll = interval_at(Instant::now() + period, period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        *fallback = Some(poll);
        info!(
            topic = %self.session.topic(),
            failures = self.session.failure_count(),
            poll_ms = self.config.fallback_poll_ms,
            "circuit breaker tripped, polling"
        );
    }

    fn release_subscription(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.channel.unsubscribe(&handle);
        }
    }

    fn any_busy(&self) -> bool {
        lock(&self.viewers).iter().any(|v| v.target.is_busy())
    }

    async fn refresh_all(&self, reason: &'static str) {
        let targets: Vec<Arc<dyn RefreshTarget>> = lock(&self.viewers)
            .iter()
            .map(|v| Arc::clone(&v.target))
            .collect();

        for target in &targets {
            // Transient: the next notice or poll retries
            if let Err(e) = target.refresh().await {
                debug!(topic = %self.session.topic(), error = %e, "refresh failed");
            }
        }

        let synced = targets.iter().filter_map(|t| t.last_synced_at()).max();
        self.status.send_modify(|s| {
            s.refresh_count += 1;
            if synced.is_some() {
                s.last_synced_at = synced;
            }
        });
        debug!(topic = %self.session.topic(), reason, viewers = targets.len(), "refreshed");
    }

    fn publish(&self) {
        let mode = self.session.mode();
        let failures = self.session.failure_count();
        self.status.send_modify(|s| {
            s.mode = mode;
            s.failure_count = failures;
        });
    }

    fn teardown(&mut self) {
        if self.session.teardown() {
            self.release_subscription();
            self.status.send_modify(|s| s.torn_down = true);
            debug!(topic = %self.session.topic(), "session torn down");
        }
    }
}

async fn next_event(events: &mut Events) -> Option<ChannelEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => future::pending().await,
    }
}

async fn next_tick(poll: &mut Option<Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => future::pending().await,
    }
}

impl Drop for SyncDriver {
    fn drop(&mut self) {
        self.teardown();
    }
}

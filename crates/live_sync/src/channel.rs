//! Event boundary: best-effort change notifications per topic.
//!
//! Delivery is at-least-once and may drop notifications. Subscription health is
//! reported in-band through [`ChannelStatus`] events on the same sink.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use league_core::{ChangeKind, ChangeNotice, Topic};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ChannelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Subscribed,
    Error,
    Timeout,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    Notice(ChangeKind),
    Status(ChannelStatus),
}

pub type EventSink = mpsc::UnboundedSender<ChannelEvent>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    pub id: u64,
    pub topic: Topic,
}

/// Transport for change notifications.
pub trait EventChannel: Send + Sync {
    fn subscribe(&self, topic: &Topic, sink: EventSink) -> Result<SubscriptionHandle, ChannelError>;

    /// Unknown or already removed handles are ignored.
    fn unsubscribe(&self, handle: &SubscriptionHandle);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Adapts the data store's in-process broadcast feed to the event boundary.
///
/// Each subscription runs a forwarding task that filters by topic. A lagged
/// receiver has silently lost notifications, so it is reported as an error.
pub struct BroadcastChannel {
    feed: broadcast::Sender<ChangeNotice>,
    next_id: AtomicU64,
    tasks: Mutex<HashMap<u64, JoinHandle<()>>>,
}

impl BroadcastChannel {
    pub fn new(feed: broadcast::Sender<ChangeNotice>) -> Self {
        Self {
            feed,
            next_id: AtomicU64::new(1),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn active_subscriptions(&self) -> usize {
        lock(&self.tasks).len()
    }
}

impl EventChannel for BroadcastChannel {
    fn subscribe(&self, topic: &Topic, sink: EventSink) -> Result<SubscriptionHandle, ChannelError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut rx = self.feed.subscribe();
        let wanted = topic.clone();

        let task = tokio::spawn(async move {
            if sink.send(ChannelEvent::Status(ChannelStatus::Subscribed)).is_err() {
                return;
            }
            loop {
                let event = match rx.recv().await {
                    Ok(notice) if notice.topic == wanted => ChannelEvent::Notice(notice.kind),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(topic = %wanted, missed, "notification feed lagged");
                        ChannelEvent::Status(ChannelStatus::Error)
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        let _ = sink.send(ChannelEvent::Status(ChannelStatus::Closed));
                        break;
                    }
                };
                if sink.send(event).is_err() {
                    break;
                }
            }
        });

        lock(&self.tasks).insert(id, task);
        debug!(topic = %topic, id, "subscribed");
        Ok(SubscriptionHandle {
            id,
            topic: topic.clone(),
        })
    }

    fn unsubscribe(&self, handle: &SubscriptionHandle) {
        if let Some(task) = lock(&self.tasks).remove(&handle.id) {
            task.abort();
            debug!(topic = %handle.topic, id = handle.id, "unsubscribed");
        }
    }
}

impl Drop for BroadcastChannel {
    fn drop(&mut self) {
        for (_, task) in lock(&self.tasks).drain() {
            task.abort();
        }
    }
}

#[derive(Default)]
struct Script {
    next_id: u64,
    subscribes: u32,
    unsubscribes: u32,
    refuse: u32,
    closed: bool,
    active: HashSet<u64>,
    last_sink: Option<EventSink>,
}

/// Hand-driven channel: events are injected with [`ScriptedChannel::emit`].
///
/// Used to replay flaky transports in tests and in the demo. Nothing is sent on
/// subscribe; callers emit `Subscribed` themselves.
#[derive(Default)]
pub struct ScriptedChannel {
    script: Mutex<Script>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to the most recent subscriber, even one that has since
    /// been unsubscribed. Returns false if nobody is listening on that sink.
    pub fn emit(&self, event: ChannelEvent) -> bool {
        match &lock(&self.script).last_sink {
            Some(sink) => sink.send(event).is_ok(),
            None => false,
        }
    }

    /// Reject the next `n` subscribe calls.
    pub fn refuse_next(&self, n: u32) {
        lock(&self.script).refuse = n;
    }

    /// Shut the transport down for good: every later subscribe fails with
    /// [`ChannelError::Closed`].
    pub fn close(&self) {
        lock(&self.script).closed = true;
    }

    /// Total subscribe attempts, refused ones included.
    pub fn subscribe_count(&self) -> u32 {
        lock(&self.script).subscribes
    }

    pub fn unsubscribe_count(&self) -> u32 {
        lock(&self.script).unsubscribes
    }

    pub fn is_subscribed(&self) -> bool {
        !lock(&self.script).active.is_empty()
    }
}

impl EventChannel for ScriptedChannel {
    fn subscribe(&self, topic: &Topic, sink: EventSink) -> Result<SubscriptionHandle, ChannelError> {
        let mut script = lock(&self.script);
        script.subscribes += 1;
        if script.closed {
            return Err(ChannelError::Closed);
        }
        if script.refuse > 0 {
            script.refuse -= 1;
            return Err(ChannelError::Unavailable("refused".into()));
        }
        script.next_id += 1;
        let id = script.next_id;
        script.active.insert(id);
        script.last_sink = Some(sink);
        Ok(SubscriptionHandle {
            id,
            topic: topic.clone(),
        })
    }

    fn unsubscribe(&self, handle: &SubscriptionHandle) {
        let mut script = lock(&self.script);
        if script.active.remove(&handle.id) {
            script.unsubscribes += 1;
        }
    }
}

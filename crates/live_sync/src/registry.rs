//! One subscription session per viewed match.
//!
//! Attaching to a match that already has a session joins it instead of opening
//! a second subscription. The session is torn down when its last viewer
//! detaches. Switching a view to another match is a detach followed by an
//! attach.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use league_core::{MatchId, Topic};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info};

use crate::channel::EventChannel;
use crate::config::SyncConfig;
use crate::driver::{lock, SyncDriver, SyncStatus, Viewer, Viewers};
use crate::session::SubscriptionSession;
use crate::target::RefreshTarget;

struct SessionEntry {
    viewers: Viewers,
    status: watch::Receiver<SyncStatus>,
    shutdown: oneshot::Sender<()>,
}

struct RegistryInner {
    channel: Arc<dyn EventChannel>,
    config: SyncConfig,
    sessions: Mutex<HashMap<Topic, SessionEntry>>,
    next_viewer: AtomicU64,
}

impl RegistryInner {
    fn release(&self, topic: &Topic, viewer: u64) {
        let mut sessions = lock(&self.sessions);
        let Some(entry) = sessions.get(topic) else {
            return;
        };

        let remaining = {
            let mut viewers = lock(&entry.viewers);
            viewers.retain(|v| v.id != viewer);
            viewers.len()
        };
        if remaining > 0 {
            debug!(topic = %topic, remaining, "viewer detached");
            return;
        }

        if let Some(entry) = sessions.remove(topic) {
            let _ = entry.shutdown.send(());
            info!(topic = %topic, "sync session closed");
        }
    }
}

/// Device-wide set of live subscription sessions.
#[derive(Clone)]
pub struct SyncRegistry {
    inner: Arc<RegistryInner>,
}

impl SyncRegistry {
    pub fn new(channel: Arc<dyn EventChannel>, config: SyncConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                channel,
                config,
                sessions: Mutex::new(HashMap::new()),
                next_viewer: AtomicU64::new(1),
            }),
        }
    }

    /// Start keeping `target` fresh for `match_id`. Must be called from within
    /// a tokio runtime.
    pub fn attach(&self, match_id: MatchId, target: Arc<dyn RefreshTarget>) -> SyncHandle {
        let topic = Topic::for_match(match_id);
        let viewer_id = self.inner.next_viewer.fetch_add(1, Ordering::Relaxed);
        let viewer = Viewer {
            id: viewer_id,
            target,
        };

        let mut sessions = lock(&self.inner.sessions);
        let status = match sessions.get(&topic) {
            Some(entry) => {
                lock(&entry.viewers).push(viewer);
                debug!(topic = %topic, "joined existing sync session");
                entry.status.clone()
            }
            None => {
                let viewers: Viewers = Arc::new(Mutex::new(vec![viewer]));
                let (status_tx, status_rx) = watch::channel(SyncStatus::default());
                let (shutdown_tx, shutdown_rx) = oneshot::channel();

                let driver = SyncDriver::new(
                    SubscriptionSession::new(topic.clone(), self.inner.config),
                    Arc::clone(&self.inner.channel),
                    Arc::clone(&viewers),
                    status_tx,
                    self.inner.config,
                );
                tokio::spawn(driver.run(shutdown_rx));

                sessions.insert(
                    topic.clone(),
                    SessionEntry {
                        viewers,
                        status: status_rx.clone(),
                        shutdown: shutdown_tx,
                    },
                );
                info!(topic = %topic, "sync session opened");
                status_rx
            }
        };

        SyncHandle {
            inner: Arc::clone(&self.inner),
            topic,
            viewer_id,
            status,
            detached: AtomicBool::new(false),
        }
    }

    pub fn session_count(&self) -> usize {
        lock(&self.inner.sessions).len()
    }

    pub fn viewer_count(&self, match_id: MatchId) -> usize {
        lock(&self.inner.sessions)
            .get(&Topic::for_match(match_id))
            .map_or(0, |entry| lock(&entry.viewers).len())
    }

    pub fn status(&self, match_id: MatchId) -> Option<SyncStatus> {
        lock(&self.inner.sessions)
            .get(&Topic::for_match(match_id))
            .map(|entry| entry.status.borrow().clone())
    }

    /// Tear down every session. Outstanding handles become inert.
    pub fn shutdown(&self) {
        let drained: Vec<_> = lock(&self.inner.sessions).drain().collect();
        for (topic, entry) in drained {
            let _ = entry.shutdown.send(());
            debug!(topic = %topic, "sync session closed on shutdown");
        }
    }
}

/// A viewer's membership in a sync session. Detaches on drop.
pub struct SyncHandle {
    inner: Arc<RegistryInner>,
    topic: Topic,
    viewer_id: u64,
    status: watch::Receiver<SyncStatus>,
    detached: AtomicBool,
}

impl SyncHandle {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// Safe to call any number of times.
    pub fn detach(&self) {
        if self.detached.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.release(&self.topic, self.viewer_id);
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod registry_tests;

//! Subscription session bookkeeping.
//!
//! A [`SubscriptionSession`] owns no timers and performs no I/O. The driver
//! feeds it channel events with the current instant and carries out the
//! [`SessionAction`] it returns.

use league_core::Topic;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::SyncConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    EventDriven,
    /// Breaker tripped; only fixed-interval polling for the rest of the session
    Polling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// Refresh immediately
    Refresh,
    /// Refresh once the debounce deadline passes
    Debounce(Instant),
    /// Drop the current subscription and open a new one
    Resubscribe,
    /// Drop the subscription for good and start fallback polling
    Trip,
    Ignore,
}

#[derive(Debug, Clone)]
pub struct SubscriptionSession {
    topic: Topic,
    config: SyncConfig,
    failure_count: u32,
    window_start: Option<Instant>,
    debounce_deadline: Option<Instant>,
    mode: SyncMode,
    torn_down: bool,
}

impl SubscriptionSession {
    pub fn new(topic: Topic, config: SyncConfig) -> Self {
        Self {
            topic,
            config,
            failure_count: 0,
            window_start: None,
            debounce_deadline: None,
            mode: SyncMode::EventDriven,
            torn_down: false,
        }
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.debounce_deadline
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    fn listening(&self) -> bool {
        !self.torn_down && self.mode == SyncMode::EventDriven
    }

    /// The channel confirmed the subscription.
    pub fn on_subscribed(&mut self) -> SessionAction {
        if !self.listening() {
            return SessionAction::Ignore;
        }
        self.failure_count = 0;
        self.window_start = None;
        SessionAction::Refresh
    }

    /// Any insert, update or delete on the topic. Each notice pushes the
    /// deadline back, so a burst yields one refresh.
    pub fn on_notice(&mut self, now: Instant) -> SessionAction {
        if !self.listening() {
            return SessionAction::Ignore;
        }
        let deadline = now + self.config.debounce();
        self.debounce_deadline = Some(deadline);
        SessionAction::Debounce(deadline)
    }

    /// Clears and reports an expired debounce deadline.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.debounce_deadline {
            Some(deadline) if deadline <= now => {
                self.debounce_deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Error, timeout or close reported by the channel, or a refused subscribe.
    pub fn on_failure(&mut self, now: Instant) -> SessionAction {
        if !self.listening() {
            return SessionAction::Ignore;
        }

        match self.window_start {
            Some(start) if now.duration_since(start) <= self.config.failure_window() => {}
            _ => {
                self.window_start = Some(now);
                self.failure_count = 0;
            }
        }
        self.failure_count += 1;

        if self.failure_count >= self.config.failure_threshold {
            self.mode = SyncMode::Polling;
            self.debounce_deadline = None;
            SessionAction::Trip
        } else {
            SessionAction::Resubscribe
        }
    }

    /// Returns false if the session was already torn down.
    pub fn teardown(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        self.torn_down = true;
        self.debounce_deadline = None;
        true
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod session_tests;

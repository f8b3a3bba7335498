//! Station reconnect bookkeeping.
//!
//! The counter lives in one owned value that the connection supervisor feeds
//! with link events; it decides whether to retry, give up or reset.

use log::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay_ms: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Started,
    Disconnected,
    GotIp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectAction {
    /// Call connect now.
    Connect,
    /// Wait `delay_ms`, then call connect.
    Retry { attempt: u32, delay_ms: u32 },
    /// Retry budget spent; stay down until restart.
    GiveUp,
    Idle,
}

#[derive(Debug, Clone, Default)]
pub struct ReconnectState {
    policy: ReconnectPolicy,
    attempts: u32,
    exhausted: bool,
}

impl ReconnectState {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            exhausted: false,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn on_event(&mut self, event: LinkEvent) -> ReconnectAction {
        match event {
            LinkEvent::Started => {
                info!("WiFi started, attempting to connect...");
                ReconnectAction::Connect
            }
            LinkEvent::Disconnected => {
                if self.attempts < self.policy.max_attempts {
                    self.attempts += 1;
                    warn!(
                        "WiFi disconnected! retrying... (Attempt {}/{})",
                        self.attempts, self.policy.max_attempts
                    );
                    ReconnectAction::Retry {
                        attempt: self.attempts,
                        delay_ms: self.policy.delay_ms,
                    }
                } else {
                    if !self.exhausted {
                        error!(
                            "Max WiFi retry limit reached ({}). Not reconnecting until restart.",
                            self.policy.max_attempts
                        );
                    }
                    self.exhausted = true;
                    ReconnectAction::GiveUp
                }
            }
            LinkEvent::GotIp => {
                self.attempts = 0;
                self.exhausted = false;
                ReconnectAction::Idle
            }
        }
    }
}

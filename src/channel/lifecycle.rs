/// Connection lifecycle state machine
///
/// Pure bookkeeping for one channel: which connection epoch is current,
/// which reconnect timer token is live, and how many attempts have been
/// spent. Every input returns the side effects the owner must perform, so
/// the whole reconnection policy is testable without sockets or timers.
///
/// Stale inputs are the core concern here. A close from an epoch that is no
/// longer current, or a timer whose token was cancelled, produces no steps.
use std::time::Duration;

use super::policy::ReconnectPolicy;
use super::state::{ChannelStatus, ConnectionState};

pub type Epoch = u64;

/// Side effect requested by the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Open a new connection tagged with `epoch`
    Open { epoch: Epoch },

    /// Detach and close the connection of `epoch`
    Close { epoch: Epoch },

    /// Arm a reconnect timer; only a firing with this token counts
    ScheduleReconnect {
        token: u64,
        attempt: u32,
        delay: Duration,
    },

    /// Abort the timer armed with `token`
    CancelReconnect { token: u64 },

    /// Bounded policy gave up
    Exhausted { attempts: u32 },
}

#[derive(Debug)]
pub struct Lifecycle {
    policy: ReconnectPolicy,
    state: ConnectionState,
    current: Option<Epoch>,
    next_epoch: Epoch,
    pending: Option<u64>,
    next_token: u64,
    attempts: u32,
    exhausted: bool,
    offline: bool,
    last_error: Option<String>,
}

impl Lifecycle {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            current: None,
            next_epoch: 1,
            pending: None,
            next_token: 1,
            attempts: 0,
            exhausted: false,
            offline: true,
            last_error: None,
        }
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn current_epoch(&self) -> Option<Epoch> {
        self.current
    }

    pub fn pending_token(&self) -> Option<u64> {
        self.pending
    }

    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.current == Some(epoch)
    }

    pub fn status(&self) -> ChannelStatus {
        ChannelStatus {
            state: self.state,
            attempts: self.attempts,
            exhausted: self.exhausted,
            last_error: self.last_error.clone(),
        }
    }

    /// Explicit activation by a consumer
    ///
    /// Resets the attempt budget and clears exhaustion. No-op while a
    /// connection is connecting or open.
    pub fn connect(&mut self) -> Vec<Step> {
        if self.state.is_active() {
            return Vec::new();
        }

        let mut steps = Vec::new();
        if let Some(token) = self.pending.take() {
            steps.push(Step::CancelReconnect { token });
        }
        self.attempts = 0;
        self.exhausted = false;
        self.offline = false;
        steps.push(self.open_next());
        steps
    }

    /// Intentional teardown
    ///
    /// Cancels the pending timer and detaches the current epoch before
    /// closing it, so nothing that connection reports afterwards can
    /// trigger a reconnect.
    pub fn disconnect(&mut self) -> Vec<Step> {
        self.offline = true;

        let mut steps = Vec::new();
        if let Some(token) = self.pending.take() {
            steps.push(Step::CancelReconnect { token });
        }
        if let Some(epoch) = self.current.take() {
            steps.push(Step::Close { epoch });
        }
        self.state = ConnectionState::Disconnected;
        steps
    }

    /// Handshake completed for `epoch`; returns false when stale
    pub fn on_open(&mut self, epoch: Epoch) -> bool {
        if !self.is_current(epoch) {
            return false;
        }
        self.state = ConnectionState::Open;
        self.attempts = 0;
        self.exhausted = false;
        self.last_error = None;
        true
    }

    /// Non-fatal error on `epoch`; returns false when stale
    pub fn on_error(&mut self, epoch: Epoch, info: &str) -> bool {
        if !self.is_current(epoch) {
            return false;
        }
        self.last_error = Some(info.to_string());
        true
    }

    /// Terminal close of `epoch`
    pub fn on_close(&mut self, epoch: Epoch, code: Option<u16>, reason: Option<&str>) -> Vec<Step> {
        if !self.is_current(epoch) {
            return Vec::new();
        }
        self.current = None;
        self.state = ConnectionState::Disconnected;

        if self.last_error.is_none() {
            self.last_error = Some(describe_close(code, reason));
        }

        if self.offline {
            return Vec::new();
        }

        let attempt = self.attempts + 1;
        match self.policy.delay_for(attempt) {
            Some(delay) => {
                self.attempts = attempt;
                let token = self.next_token;
                self.next_token += 1;
                self.pending = Some(token);
                vec![Step::ScheduleReconnect {
                    token,
                    attempt,
                    delay,
                }]
            }
            None => {
                self.exhausted = true;
                vec![Step::Exhausted {
                    attempts: self.attempts,
                }]
            }
        }
    }

    /// Reconnect timer fired
    pub fn on_reconnect_due(&mut self, token: u64) -> Vec<Step> {
        if self.pending != Some(token) {
            return Vec::new();
        }
        self.pending = None;

        if self.offline || self.state.is_active() {
            return Vec::new();
        }
        vec![self.open_next()]
    }

    fn open_next(&mut self) -> Step {
        let epoch = self.next_epoch;
        self.next_epoch += 1;
        self.current = Some(epoch);
        self.state = ConnectionState::Connecting;
        Step::Open { epoch }
    }
}

fn describe_close(code: Option<u16>, reason: Option<&str>) -> String {
    match (code, reason.filter(|r| !r.is_empty())) {
        (Some(code), Some(reason)) => format!("connection closed ({}: {})", code, reason),
        (Some(code), None) => format!("connection closed ({})", code),
        (None, Some(reason)) => format!("connection closed: {}", reason),
        (None, None) => "connection closed".to_string(),
    }
}

// Relay client state machine. Performs no IO: the window loop executes the
// returned actions and feeds transport events back in.

use super::types::{Notice, ObjectEvent, RelayCommand, RelayInbound, RelayOutbound};
use crate::domain::errors::RelayError;
use crate::domain::object::SceneObject;
use rand::Rng;
use rand::rngs::StdRng;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const JOIN_CODE_LEN: usize = 6;
const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub fn generate_join_code(rng: &mut impl Rng) -> String {
    (0..JOIN_CODE_LEN)
        .map(|_| JOIN_CODE_ALPHABET[rng.gen_range(0..JOIN_CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn is_valid_join_code(code: &str) -> bool {
    code.len() == JOIN_CODE_LEN
        && code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed(Duration),
    /// `base * 2^(attempt-1)`, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

/// Bounded reconnect policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Backoff::Fixed(Duration::from_secs(3)),
        }
    }
}

impl RetryPolicy {
    /// Delay before reconnect attempt `attempt` (1-based), or None once the
    /// ceiling is exceeded.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        match self.backoff {
            Backoff::Fixed(delay) => Some(delay),
            Backoff::Exponential { base, max } => {
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                Some(base.saturating_mul(factor).min(max))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

/// Output of the relay state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayAction {
    Transport(RelayCommand),
    /// Registration accepted under `code`.
    Online { code: String },
    Merged { code: String, objects: Vec<SceneObject> },
    Forward { code: String, event: ObjectEvent },
    GroupLost { code: String },
    /// Reconnect attempts exhausted.
    Offline,
    Notify(Notice),
}

pub struct RelayClient {
    state: RelayState,
    code: String,
    policy: RetryPolicy,
    heartbeat_interval: Duration,
    rng: StdRng,
    /// Attempts made since the last successful registration.
    attempts: u32,
    next_heartbeat_ms: Option<u64>,
    reconnect_at_ms: Option<u64>,
}

impl RelayClient {
    pub fn new(policy: RetryPolicy, heartbeat_interval: Duration, mut rng: StdRng) -> Self {
        let code = generate_join_code(&mut rng);
        Self {
            state: RelayState::Disconnected,
            code,
            policy,
            heartbeat_interval,
            rng,
            attempts: 0,
            next_heartbeat_ms: None,
            reconnect_at_ms: None,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_connected(&self) -> bool {
        self.state == RelayState::Connected
    }

    pub fn connect(&mut self) -> Result<Vec<RelayAction>, RelayError> {
        if self.state != RelayState::Disconnected {
            return Err(RelayError::AlreadyConnected);
        }
        self.state = RelayState::Connecting;
        self.attempts = 0;
        info!(code = %self.code, "connecting to relay");
        Ok(vec![RelayAction::Transport(RelayCommand::Open)])
    }

    /// Explicit disconnect: cancels the heartbeat and any pending reconnect.
    pub fn disconnect(&mut self) -> Vec<RelayAction> {
        let was = self.state;
        self.state = RelayState::Disconnected;
        self.attempts = 0;
        self.next_heartbeat_ms = None;
        self.reconnect_at_ms = None;
        if was == RelayState::Disconnected {
            return Vec::new();
        }
        info!(code = %self.code, "disconnected from relay");
        vec![RelayAction::Transport(RelayCommand::Close)]
    }

    pub fn on_opened(&mut self) -> Vec<RelayAction> {
        if self.state != RelayState::Connecting {
            return Vec::new();
        }
        vec![self.send(RelayOutbound::Connect {
            code: self.code.clone(),
        })]
    }

    pub fn on_message(&mut self, message: RelayInbound, now_ms: u64) -> Vec<RelayAction> {
        match message {
            RelayInbound::Connected { code } => {
                if code != self.code {
                    warn!(expected = %self.code, got = %code, "relay confirmed a different code");
                    return Vec::new();
                }
                self.state = RelayState::Connected;
                self.attempts = 0;
                self.reconnect_at_ms = None;
                self.next_heartbeat_ms = Some(now_ms + self.heartbeat_millis());
                info!(%code, "relay connected");
                vec![
                    RelayAction::Online { code: code.clone() },
                    RelayAction::Notify(Notice::info(format!("Connected as {code}"))),
                ]
            }
            RelayInbound::ConnectError { message } => {
                // The only registration failure is a taken or rejected code.
                let old = std::mem::replace(&mut self.code, generate_join_code(&mut self.rng));
                warn!(%old, new = %self.code, %message, "join code rejected, retrying");
                vec![self.send(RelayOutbound::Connect {
                    code: self.code.clone(),
                })]
            }
            RelayInbound::MergeObjects { from_code, objects } => {
                info!(code = %from_code, count = objects.len(), "merged universe");
                vec![
                    RelayAction::Notify(Notice::info(format!("Merged with {from_code}"))),
                    RelayAction::Merged {
                        code: from_code,
                        objects,
                    },
                ]
            }
            RelayInbound::MergeError { message } => {
                warn!(%message, "merge rejected by relay");
                vec![RelayAction::Notify(Notice::error(message))]
            }
            RelayInbound::UniverseMerged { code } => {
                vec![RelayAction::Notify(Notice::info(format!("{code} merged with you")))]
            }
            RelayInbound::UniverseDisconnected { code } => vec![
                RelayAction::Notify(Notice::warning(format!("{code} disconnected"))),
                RelayAction::GroupLost { code },
            ],
            RelayInbound::Object { code, event } => {
                if !self.is_connected() {
                    return Vec::new();
                }
                vec![RelayAction::Forward { code, event }]
            }
        }
    }

    /// Transport closed or failed to open. Schedules a bounded reconnect, or
    /// goes offline once the policy is exhausted.
    pub fn on_closed(&mut self, reason: &str, now_ms: u64) -> Vec<RelayAction> {
        if self.state == RelayState::Disconnected {
            return Vec::new();
        }
        self.next_heartbeat_ms = None;
        self.attempts += 1;

        match self.policy.next_delay(self.attempts) {
            Some(delay) => {
                self.state = RelayState::Reconnecting {
                    attempt: self.attempts,
                };
                self.reconnect_at_ms = Some(now_ms + delay.as_millis() as u64);
                warn!(
                    reason,
                    attempt = self.attempts,
                    max = self.policy.max_attempts,
                    "relay connection lost, reconnecting"
                );
                vec![RelayAction::Notify(Notice::warning(format!(
                    "Relay connection lost, retrying ({}/{})",
                    self.attempts, self.policy.max_attempts
                )))]
            }
            None => {
                self.state = RelayState::Disconnected;
                self.reconnect_at_ms = None;
                warn!(reason, attempts = self.attempts, "relay offline");
                vec![
                    RelayAction::Offline,
                    RelayAction::Notify(Notice::error("Relay offline")),
                ]
            }
        }
    }

    /// Fires due timers: the heartbeat while connected, the reconnect while
    /// waiting to retry.
    pub fn poll(&mut self, now_ms: u64) -> Vec<RelayAction> {
        let mut actions = Vec::new();
        match self.state {
            RelayState::Connected => {
                if let Some(due) = self.next_heartbeat_ms
                    && now_ms >= due
                {
                    self.next_heartbeat_ms = Some(now_ms + self.heartbeat_millis());
                    actions.push(self.send(RelayOutbound::Heartbeat {
                        code: self.code.clone(),
                    }));
                }
            }
            RelayState::Reconnecting { attempt } => {
                if let Some(due) = self.reconnect_at_ms
                    && now_ms >= due
                {
                    debug!(attempt, "reopening relay connection");
                    self.reconnect_at_ms = None;
                    self.state = RelayState::Connecting;
                    actions.push(RelayAction::Transport(RelayCommand::Open));
                }
            }
            RelayState::Disconnected | RelayState::Connecting => {}
        }
        actions
    }

    pub fn request_merge(&mut self, code: &str) -> Result<Vec<RelayAction>, RelayError> {
        let code = code.trim().to_ascii_uppercase();
        if !is_valid_join_code(&code) {
            return Err(RelayError::InvalidCode(code));
        }
        if code == self.code {
            return Err(RelayError::SelfMerge);
        }
        if !self.is_connected() {
            return Err(RelayError::NotConnected);
        }
        Ok(vec![self.send(RelayOutbound::MergeRequest {
            from_code: self.code.clone(),
            to_code: code,
        })])
    }

    fn send(&self, message: RelayOutbound) -> RelayAction {
        RelayAction::Transport(RelayCommand::Send(message))
    }

    fn heartbeat_millis(&self) -> u64 {
        self.heartbeat_interval.as_millis() as u64
    }
}

use std::{env, time::Duration};

// Runtime/server constants.

pub fn http_port() -> u16 {
    env::var("RELAY_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3010)
}

/// How long a universe may stay silent before its code is released.
pub fn liveness() -> Duration {
    let millis = env::var("RELAY_LIVENESS_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(30_000);
    Duration::from_millis(millis)
}

pub const HUB_EVENT_CAPACITY: usize = 1024;
pub const OUTBOX_CAPACITY: usize = 256;
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

use std::{env, time::Duration};
use tracing::warn;
use url::Url;

// Runtime constants and environment settings (not gameplay tuning).

const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:3010/ws";

pub fn relay_url() -> String {
    let raw = env::var("RELAY_URL").unwrap_or_else(|_| DEFAULT_RELAY_URL.to_string());
    match Url::parse(&raw) {
        Ok(url) if matches!(url.scheme(), "ws" | "wss") => url.to_string(),
        Ok(url) => {
            warn!(scheme = url.scheme(), "RELAY_URL must be ws:// or wss://; using default");
            DEFAULT_RELAY_URL.to_string()
        }
        Err(e) => {
            warn!(error = %e, "invalid RELAY_URL; using default");
            DEFAULT_RELAY_URL.to_string()
        }
    }
}

/// Number of windows opened at startup.
pub fn window_count() -> usize {
    env_parse("UNIVERSE_WINDOWS", 2).max(1)
}

pub fn frame_interval() -> Duration {
    Duration::from_millis(env_parse("WINDOW_TICK_MS", 16).max(1))
}

pub fn protocol_interval() -> Duration {
    Duration::from_millis(env_parse("PROTOCOL_TICK_MS", 150).max(1))
}

pub fn relay_max_reconnects() -> u32 {
    env_parse("RELAY_MAX_RECONNECTS", 5)
}

pub fn relay_reconnect_delay() -> Duration {
    Duration::from_millis(env_parse("RELAY_RECONNECT_DELAY_MS", 3000))
}

pub fn relay_heartbeat_interval() -> Duration {
    Duration::from_millis(env_parse("RELAY_HEARTBEAT_MS", 10_000).max(1))
}

/// Connect every window to the relay on startup.
pub fn relay_autoconnect() -> bool {
    matches!(
        env::var("UNIVERSE_RELAY").as_deref(),
        Ok("1") | Ok("true")
    )
}

/// Directory the first window explores on startup, if any. `~` means home.
pub fn city_root() -> Option<String> {
    env::var("UNIVERSE_CITY").ok().filter(|p| !p.is_empty())
}

/// Objects each window creates on startup so overlaps have something to show.
pub fn seed_objects() -> usize {
    env_parse("UNIVERSE_SEED_OBJECTS", 1)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub const INPUT_CHANNEL_CAPACITY: usize = 1024;
pub const EFFECT_CHANNEL_CAPACITY: usize = 1024;
pub const BUS_CAPACITY: usize = 256;
pub const RELAY_COMMAND_CAPACITY: usize = 64;
pub const WINDOW_REQUEST_CAPACITY: usize = 8;

pub const WINDOW_WIDTH: i32 = 800;
pub const WINDOW_HEIGHT: i32 = 600;
// Horizontal step between startup windows; smaller than the width so neighbors overlap.
pub const WINDOW_STRIDE: i32 = 600;

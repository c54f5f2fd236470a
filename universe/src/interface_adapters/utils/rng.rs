use std::{
    sync::{
        OnceLock,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Process-unique, monotonically increasing id seeded from the wall clock,
/// so labels from separate runs rarely collide either.
pub fn rand_id() -> u64 {
    static COUNTER: OnceLock<AtomicU64> = OnceLock::new();
    let counter = COUNTER.get_or_init(|| AtomicU64::new(now_millis()));
    counter.fetch_add(1, Ordering::Relaxed)
}

/// Fresh label for a universe window.
pub fn window_label() -> String {
    format!("universe-{}", rand_id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_labels_are_unique() {
        let a = window_label();
        let b = window_label();
        assert_ne!(a, b);
        assert!(a.starts_with("universe-"));
    }
}

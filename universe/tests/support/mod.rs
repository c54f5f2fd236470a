// Shared harness: several window sessions wired through an in-memory bus.
#![allow(dead_code)]

use std::collections::BTreeSet;

use universe::domain::window::WindowRect;
use universe::use_cases::{
    SessionEffect, SessionSettings, UniverseSession, WindowContext, WindowInput,
};

// Step used by `advance`; below the 0.1 s frame clamp.
pub const STEP_MS: u64 = 50;

/// A desktop of windows sharing one bus, driven by a manual clock.
pub struct Desk {
    windows: Vec<UniverseSession>,
    now: u64,
    // Non-bus effects, kept for assertions.
    effects: Vec<(String, SessionEffect)>,
    // Windows that neither tick nor reach the bus, but still receive.
    stalled: BTreeSet<String>,
}

impl Desk {
    pub fn new(layout: &[(&str, WindowRect)]) -> Self {
        let windows = layout
            .iter()
            .enumerate()
            .map(|(i, (label, rect))| {
                let settings = SessionSettings {
                    seed: Some(i as u64 + 1),
                    ..SessionSettings::default()
                };
                UniverseSession::new(WindowContext::new(*label, *rect), settings, 0)
            })
            .collect();
        let mut desk = Self {
            windows,
            now: 0,
            effects: Vec::new(),
            stalled: BTreeSet::new(),
        };
        for window in &mut desk.windows {
            window.start(0);
        }
        desk.pump();
        desk
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn window(&self, label: &str) -> &UniverseSession {
        self.windows
            .iter()
            .find(|w| w.label() == label)
            .expect("window exists")
    }

    pub fn window_mut(&mut self, label: &str) -> &mut UniverseSession {
        self.windows
            .iter_mut()
            .find(|w| w.label() == label)
            .expect("window exists")
    }

    /// Feeds one input into a window and delivers whatever it publishes.
    pub fn input(&mut self, label: &str, input: WindowInput) {
        let now = self.now;
        self.window_mut(label).handle(input, now);
        self.pump();
    }

    /// Delivers bus publishes to every window, the sender included, until
    /// the desk is quiet.
    pub fn pump(&mut self) {
        loop {
            let mut published = Vec::new();
            for window in &mut self.windows {
                let label = window.label().to_string();
                let effects = window.take_effects();
                if self.stalled.contains(&label) {
                    continue;
                }
                for effect in effects {
                    match effect {
                        SessionEffect::Publish(envelope) => published.push(envelope),
                        other => self.effects.push((label.clone(), other)),
                    }
                }
            }
            if published.is_empty() {
                return;
            }
            for envelope in published {
                for window in &mut self.windows {
                    window.handle_bus(envelope.clone(), self.now);
                }
            }
        }
    }

    /// Moves the clock forward in frame-sized steps, ticking every window.
    pub fn advance(&mut self, ms: u64) {
        let target = self.now + ms;
        while self.now < target {
            self.now = (self.now + STEP_MS).min(target);
            let now = self.now;
            for window in &mut self.windows {
                if self.stalled.contains(window.label()) {
                    continue;
                }
                window.tick(now);
                window.frame(now);
            }
            self.pump();
        }
    }

    /// Closes a window: it publishes `window-close` and leaves the desk.
    pub fn close(&mut self, label: &str) {
        let now = self.now;
        self.window_mut(label).close(now);
        self.pump();
        self.windows.retain(|w| w.label() != label);
    }

    /// Opens another window mid-session.
    pub fn add_window(&mut self, label: &str, rect: WindowRect) {
        let settings = SessionSettings {
            seed: Some(self.windows.len() as u64 + 1),
            ..SessionSettings::default()
        };
        let mut window = UniverseSession::new(WindowContext::new(label, rect), settings, self.now);
        window.start(self.now);
        self.windows.push(window);
        self.pump();
    }

    /// Removes a window without a close message, as if its process died.
    pub fn drop_window(&mut self, label: &str) {
        self.windows.retain(|w| w.label() != label);
    }

    /// Freezes a window: its output is lost while peers' traffic still
    /// lands in its queue.
    pub fn stall(&mut self, label: &str) {
        self.stalled.insert(label.to_string());
    }

    pub fn resume(&mut self, label: &str) {
        self.stalled.remove(label);
    }

    pub fn take_effects(&mut self) -> Vec<(String, SessionEffect)> {
        std::mem::take(&mut self.effects)
    }
}

pub fn rect(x: i32, y: i32) -> WindowRect {
    WindowRect::new(x, y, 800, 600)
}

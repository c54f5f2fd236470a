// Directory of known window rectangles and the local overlap set.

use super::types::BusMessage;
use crate::domain::tuning::SyncTuning;
use crate::domain::window::{WindowRecord, WindowRect};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum TopologyEvent {
    Publish(BusMessage),
    OverlapChanged(BTreeSet<String>),
    PeerJoined(String),
    PeerLeft(String),
}

pub struct WindowTopology {
    label: String,
    records: BTreeMap<String, WindowRecord>,
    overlap: BTreeSet<String>,
    tuning: SyncTuning,
    last_announce_ms: Option<u64>,
    closed: bool,
}

impl WindowTopology {
    pub fn new(label: impl Into<String>, rect: WindowRect, now_ms: u64, tuning: SyncTuning) -> Self {
        let label = label.into();
        let mut records = BTreeMap::new();
        records.insert(
            label.clone(),
            WindowRecord {
                label: label.clone(),
                rect,
                timestamp: now_ms,
            },
        );
        Self {
            label,
            records,
            overlap: BTreeSet::new(),
            tuning,
            last_announce_ms: None,
            closed: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn local_rect(&self) -> Option<WindowRect> {
        self.records.get(&self.label).map(|r| r.rect)
    }

    pub fn overlap_set(&self) -> &BTreeSet<String> {
        &self.overlap
    }

    pub fn peers(&self) -> impl Iterator<Item = &WindowRecord> {
        self.records.values().filter(|r| r.label != self.label)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Publishes this window's current rectangle.
    pub fn announce(&mut self, now_ms: u64) -> Vec<TopologyEvent> {
        if self.closed {
            return Vec::new();
        }
        let Some(bounds) = self.local_rect() else {
            return Vec::new();
        };
        self.last_announce_ms = Some(now_ms);
        vec![TopologyEvent::Publish(BusMessage::WindowAnnounce {
            label: self.label.clone(),
            bounds,
        })]
    }

    /// Records a local move/resize. Changes within the jitter threshold are
    /// ignored so dragging a window does not flood the bus.
    pub fn report_move(&mut self, rect: WindowRect, now_ms: u64) -> Vec<TopologyEvent> {
        if self.closed {
            return Vec::new();
        }
        let threshold = self.tuning.move_threshold_px;
        let Some(record) = self.records.get_mut(&self.label) else {
            return Vec::new();
        };
        if !rect.differs_by_more_than(&record.rect, threshold) {
            return Vec::new();
        }
        record.rect = rect;
        record.timestamp = now_ms;
        self.last_announce_ms = Some(now_ms);

        let mut events = vec![TopologyEvent::Publish(BusMessage::WindowUpdate {
            label: self.label.clone(),
            bounds: rect,
        })];
        events.extend(self.recompute());
        events
    }

    pub fn on_peer_update(&mut self, label: &str, rect: WindowRect, now_ms: u64) -> Vec<TopologyEvent> {
        if label == self.label {
            return Vec::new();
        }
        let mut events = Vec::new();
        let record = WindowRecord {
            label: label.to_string(),
            rect,
            timestamp: now_ms,
        };
        if self.records.insert(label.to_string(), record).is_none() {
            info!(peer = label, "peer window joined");
            events.push(TopologyEvent::PeerJoined(label.to_string()));
        }
        events.extend(self.recompute());
        events
    }

    pub fn on_peer_removed(&mut self, label: &str) -> Vec<TopologyEvent> {
        if label == self.label || self.records.remove(label).is_none() {
            return Vec::new();
        }
        info!(peer = label, "peer window left");
        let mut events = vec![TopologyEvent::PeerLeft(label.to_string())];
        events.extend(self.recompute());
        events
    }

    /// Labels whose rectangles overlap `label`'s rectangle.
    pub fn overlaps_of(&self, label: &str) -> BTreeSet<String> {
        let Some(me) = self.records.get(label) else {
            return BTreeSet::new();
        };
        self.records
            .values()
            .filter(|r| r.label != label && r.rect.overlaps(&me.rect))
            .map(|r| r.label.clone())
            .collect()
    }

    /// Drops peers that have been silent longer than the liveness window.
    pub fn purge_stale(&mut self, now_ms: u64) -> Vec<TopologyEvent> {
        let window = self.tuning.liveness_window_ms;
        let stale: Vec<String> = self
            .peers()
            .filter(|r| now_ms.saturating_sub(r.timestamp) > window)
            .map(|r| r.label.clone())
            .collect();
        if stale.is_empty() {
            return Vec::new();
        }

        let mut events = Vec::new();
        for label in stale {
            debug!(peer = %label, "purging silent peer window");
            self.records.remove(&label);
            events.push(TopologyEvent::PeerLeft(label));
        }
        events.extend(self.recompute());
        events
    }

    /// Periodic work: re-announce when due and purge silent peers.
    pub fn tick(&mut self, now_ms: u64) -> Vec<TopologyEvent> {
        let mut events = Vec::new();
        let due = self
            .last_announce_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.tuning.announce_interval_ms);
        if due {
            events.extend(self.announce(now_ms));
        }
        events.extend(self.purge_stale(now_ms));
        events
    }

    /// Publishes `window-close` and stops announcing.
    pub fn close(&mut self) -> Vec<TopologyEvent> {
        if self.closed {
            return Vec::new();
        }
        self.closed = true;
        vec![TopologyEvent::Publish(BusMessage::WindowClose {
            label: self.label.clone(),
        })]
    }

    fn recompute(&mut self) -> Option<TopologyEvent> {
        let next = self.overlaps_of(&self.label);
        if next == self.overlap {
            return None;
        }
        debug!(window = %self.label, overlap = ?next, "overlap set changed");
        self.overlap = next.clone();
        Some(TopologyEvent::OverlapChanged(next))
    }
}

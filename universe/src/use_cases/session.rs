// One window's universe: owns every component and routes events between them.

use super::city::{CityAction, MAX_ENTRIES, ProceduralCityBuilder};
use super::relay::{RelayAction, RelayClient, RetryPolicy};
use super::scene_store::SceneObjectStore;
use super::sync::{ObjectSync, SyncEffect};
use super::topology::{TopologyEvent, WindowTopology};
use super::types::{
    BusEnvelope, BusMessage, HostRequest, Notice, RelayCommand, RelayTransportEvent,
    SessionEffect, WindowInput,
};
use super::viewport::{ViewportController, ViewportEffect};
use crate::domain::collision::{ColliderSource, CollisionField};
use crate::domain::errors::{FsError, SyncError};
use crate::domain::geometry::GeometryCatalog;
use crate::domain::input::{Joystick, Key, PointerEvent};
use crate::domain::math::Vec3;
use crate::domain::object::{
    ObjectId, ObjectKind, ObjectProps, PropsPatch, Rgb, Scale, SceneKey, SceneObject,
};
use crate::domain::ports::{DirEntry, WindowSpec};
use crate::domain::quality::{QualityPreset, QualitySettings};
use crate::domain::tuning::SyncTuning;
use crate::domain::view::ViewMode;
use crate::domain::window::WindowRect;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Colors new objects are drawn from.
const PALETTE: [u32; 6] = [0xff6b6b, 0x4ecdc4, 0xffe66d, 0x95e1d3, 0xf38181, 0xaa96da];
/// Horizontal spread of randomly placed new objects.
const SPAWN_SPREAD: f32 = 8.0;
/// New windows open offset from the one that asked for them.
const NEW_WINDOW_OFFSET: i32 = 40;

/// Identity of the window a session runs in.
#[derive(Debug, Clone)]
pub struct WindowContext {
    pub label: String,
    pub bounds: WindowRect,
}

impl WindowContext {
    pub fn new(label: impl Into<String>, bounds: WindowRect) -> Self {
        Self {
            label: label.into(),
            bounds,
        }
    }
}

/// Per-session knobs supplied by the runtime.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Reconnect schedule for the relay transport.
    pub relay_policy: RetryPolicy,

    /// How often a connected relay client sends a heartbeat.
    pub heartbeat_interval: Duration,

    /// Ghost fade/blend timings and topology intervals.
    pub sync: SyncTuning,

    /// Seed for join codes, spawn placement and cosmetic randomness. Tests
    /// pin it; the runtime leaves it unset.
    pub seed: Option<u64>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            relay_policy: RetryPolicy::default(),
            heartbeat_interval: Duration::from_secs(10),
            sync: SyncTuning::default(),
            seed: None,
        }
    }
}

pub struct UniverseSession {
    label: String,
    store: SceneObjectStore,
    field: CollisionField,
    viewport: ViewportController,
    topology: WindowTopology,
    sync: ObjectSync,
    relay: RelayClient,
    city: ProceduralCityBuilder,
    rng: StdRng,
    next_object: u64,
    /// Root of an exploration whose first listing is still in flight.
    pending_root: Option<String>,
    prompt: Option<String>,
    outbox: Vec<SessionEffect>,
}

impl UniverseSession {
    pub fn new(ctx: WindowContext, settings: SessionSettings, now_ms: u64) -> Self {
        let mut rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let relay_rng = StdRng::seed_from_u64(rng.next_u64());
        let city_rng = StdRng::seed_from_u64(rng.next_u64());
        let label = ctx.label;

        Self {
            store: SceneObjectStore::new(QualitySettings::default(), settings.sync),
            field: CollisionField::new(),
            viewport: ViewportController::new(label.clone(), aspect_of(ctx.bounds)),
            topology: WindowTopology::new(label.clone(), ctx.bounds, now_ms, settings.sync),
            sync: ObjectSync::new(label.clone()),
            relay: RelayClient::new(settings.relay_policy, settings.heartbeat_interval, relay_rng),
            city: ProceduralCityBuilder::new(label.clone(), city_rng),
            rng,
            next_object: 0,
            pending_root: None,
            prompt: None,
            outbox: Vec::new(),
            label,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn store(&self) -> &SceneObjectStore {
        &self.store
    }

    pub fn field(&self) -> &CollisionField {
        &self.field
    }

    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    pub fn topology(&self) -> &WindowTopology {
        &self.topology
    }

    pub fn sync(&self) -> &ObjectSync {
        &self.sync
    }

    pub fn relay(&self) -> &RelayClient {
        &self.relay
    }

    pub fn city(&self) -> &ProceduralCityBuilder {
        &self.city
    }

    /// Hotspot prompt to show, if the player stands in one.
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    /// Drains effects produced since the last call.
    pub fn take_effects(&mut self) -> Vec<SessionEffect> {
        std::mem::take(&mut self.outbox)
    }

    /// Announces this window and asks peers for their objects.
    pub fn start(&mut self, now_ms: u64) {
        info!(window = %self.label, "universe started");
        let events = self.topology.announce(now_ms);
        self.apply_topology(events, now_ms);
        self.publish(BusMessage::ObjectRequest);
    }

    /// Routes one queued input. Errors surface as notices, never as panics.
    pub fn handle(&mut self, input: WindowInput, now_ms: u64) {
        match input {
            WindowInput::Bus(envelope) => self.handle_bus(envelope, now_ms),
            WindowInput::Bounds(rect) => self.report_bounds(rect, now_ms),
            WindowInput::KeyDown(key) => self.key_down(key),
            WindowInput::KeyUp(key) => self.viewport.on_key_up(key),
            WindowInput::Pointer(event) => self.pointer(event),
            WindowInput::Joystick(joystick) => self.set_joystick(joystick),
            WindowInput::Tap => self.viewport.tap(),
            WindowInput::CaptureChanged(granted) => self.viewport.on_capture_changed(granted),
            WindowInput::Modal(open) => self.viewport.set_paused(open),
            WindowInput::AddObject(kind) => {
                let _ = self.add_object(kind, now_ms);
            }
            WindowInput::RemoveObject(id) => {
                let _ = self.remove_object(&id);
            }
            WindowInput::UpdateObject { id, patch } => {
                let _ = self.update_object(&id, patch);
            }
            WindowInput::ToggleViewMode => self.toggle_view_mode(),
            WindowInput::SetQuality(preset) => self.set_quality(preset),
            WindowInput::OpenWindow => self.open_window(now_ms),
            WindowInput::LoadCity(path) => self.load_city(path),
            WindowInput::PickCity => self.outbox.push(SessionEffect::PickDirectory),
            WindowInput::DirectoryPicked(result) => self.on_directory_picked(result),
            WindowInput::DirectoryListed { path, result } => {
                self.on_directory_listed(&path, result, now_ms)
            }
            WindowInput::RelayConnect => self.relay_connect(),
            WindowInput::RelayDisconnect => self.relay_disconnect(),
            WindowInput::RequestMerge(code) => self.request_merge(&code),
            WindowInput::Relay(event) => self.on_relay_event(event, now_ms),
        }
    }

    pub fn handle_bus(&mut self, envelope: BusEnvelope, now_ms: u64) {
        let BusEnvelope { sender, message } = envelope;
        if sender == self.label {
            return;
        }
        match message {
            BusMessage::Object(event) => self.sync.on_bus_event(&sender, event, &mut self.store),
            BusMessage::ObjectRequest => {
                let effects = self.sync.on_request_sync();
                self.apply_sync(effects);
            }
            BusMessage::WindowAnnounce { label, bounds }
            | BusMessage::WindowUpdate { label, bounds } => {
                let events = self.topology.on_peer_update(&label, bounds, now_ms);
                self.apply_topology(events, now_ms);
            }
            BusMessage::WindowClose { label } => {
                let events = self.topology.on_peer_removed(&label);
                self.apply_topology(events, now_ms);
            }
        }
    }

    /// The host reported new outer bounds for this window.
    pub fn report_bounds(&mut self, rect: WindowRect, now_ms: u64) {
        self.viewport.set_aspect(aspect_of(rect));
        let events = self.topology.report_move(rect, now_ms);
        self.apply_topology(events, now_ms);
    }

    /// Protocol tick: topology liveness, sync buffers and relay timers.
    pub fn tick(&mut self, now_ms: u64) {
        let events = self.topology.tick(now_ms);
        self.apply_topology(events, now_ms);
        self.sync.tick();
        let actions = self.relay.poll(now_ms);
        self.apply_relay(actions);
    }

    /// Render frame: camera and physics, ghost fades, hotspot interaction.
    /// Returns the integrated step, or None when throttled.
    pub fn frame(&mut self, now_ms: u64) -> Option<f32> {
        let dt = self
            .viewport
            .frame(Duration::from_millis(now_ms), &mut self.store, &self.field)?;
        self.store.advance(dt);

        if self.viewport.view_mode() != ViewMode::FirstPerson || !self.city.is_loaded() {
            self.prompt = None;
            return Some(dt);
        }
        let confirm = self.viewport.take_confirm();
        let joystick_active = self.viewport.input().joystick.is_some();
        let position = self.viewport.player().position;
        let poll = self.city.poll(position, confirm, joystick_active, now_ms);
        self.prompt = poll.prompt;
        if let Some(action) = poll.action {
            self.on_city_action(action);
        }
        Some(dt)
    }

    pub fn add_object(&mut self, kind: ObjectKind, now_ms: u64) -> Result<ObjectId, SyncError> {
        self.next_object += 1;
        let id = ObjectId(format!("obj_{}_{}_{}", self.label, now_ms, self.next_object));
        let position = Vec3::new(
            self.rng.gen_range(-SPAWN_SPREAD..SPAWN_SPREAD),
            self.rng.gen_range(1.0..4.0),
            self.rng.gen_range(-SPAWN_SPREAD..SPAWN_SPREAD),
        );
        let color = Rgb(PALETTE[self.rng.gen_range(0..PALETTE.len())]);
        let object = SceneObject {
            id: id.clone(),
            kind,
            position,
            properties: ObjectProps::primitive(color, Scale::Uniform(1.0)),
            owner_id: self.label.clone(),
            created_at: now_ms,
        };

        match self.sync.create(object, &mut self.store) {
            Ok(effects) => {
                self.apply_sync(effects);
                self.refresh_collider(&id);
                Ok(id)
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    pub fn remove_object(&mut self, id: &ObjectId) -> Result<(), SyncError> {
        match self.sync.remove(id, &mut self.store) {
            Ok(effects) => {
                self.field.clear_source(&ColliderSource::Object(id.clone()));
                self.apply_sync(effects);
                Ok(())
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    pub fn update_object(&mut self, id: &ObjectId, patch: PropsPatch) -> Result<(), SyncError> {
        match self.sync.update(id, patch, &mut self.store) {
            Ok(effects) => {
                self.refresh_collider(id);
                self.apply_sync(effects);
                Ok(())
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    pub fn move_object(&mut self, id: &ObjectId, position: Vec3) -> Result<(), SyncError> {
        match self.sync.move_object(id, position, &mut self.store) {
            Ok(effects) => {
                self.refresh_collider(id);
                self.apply_sync(effects);
                Ok(())
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    pub fn key_down(&mut self, key: Key) {
        let effects = self.viewport.on_key_down(key, &mut self.store);
        self.apply_viewport(effects);
    }

    pub fn pointer(&mut self, event: PointerEvent) {
        let effects = self.viewport.on_pointer(event, &self.store);
        self.apply_viewport(effects);
    }

    pub fn set_joystick(&mut self, joystick: Option<Joystick>) {
        self.viewport.set_joystick(joystick);
    }

    pub fn toggle_view_mode(&mut self) {
        let effects = self.viewport.toggle_view_mode(&mut self.store);
        self.apply_viewport(effects);
    }

    pub fn set_quality(&mut self, preset: QualityPreset) {
        self.viewport.set_quality(preset, &mut self.store);
    }

    /// Asks the host for another universe window next to this one.
    pub fn open_window(&mut self, now_ms: u64) {
        self.next_object += 1;
        let label = format!("universe-{now_ms}-{}", self.next_object);
        let Some(rect) = self.topology.local_rect() else {
            return;
        };
        let spec = WindowSpec {
            url: format!("index.html?window={label}"),
            title: "Universe".to_string(),
            rect: WindowRect::new(
                rect.x.saturating_add(NEW_WINDOW_OFFSET),
                rect.y.saturating_add(NEW_WINDOW_OFFSET),
                rect.width,
                rect.height,
            ),
            label,
        };
        info!(window = %self.label, new = %spec.label, "opening window");
        self.outbox
            .push(SessionEffect::Host(HostRequest::CreateWindow(spec)));
    }

    /// Starts a new exploration rooted at `path`.
    pub fn load_city(&mut self, path: impl Into<String>) {
        let path = path.into();
        self.pending_root = Some(path.clone());
        self.outbox.push(SessionEffect::LoadDirectory(path));
    }

    pub fn on_directory_picked(&mut self, result: Result<String, FsError>) {
        match result {
            Ok(path) => self.load_city(path),
            Err(FsError::Cancelled) => debug!("directory picker dismissed"),
            Err(e) => self.notify(Notice::error(format!("Cannot pick directory: {e}"))),
        }
    }

    /// A listing requested by `load_city` or a hotspot arrived. Failures
    /// leave the current level untouched.
    pub fn on_directory_listed(
        &mut self,
        path: &str,
        result: Result<Vec<DirEntry>, FsError>,
        now_ms: u64,
    ) {
        let starts_exploration = self.pending_root.as_deref() == Some(path);
        if starts_exploration {
            self.pending_root = None;
        }
        let entries = match result {
            Ok(entries) => entries,
            Err(e) => {
                warn!(window = %self.label, path, error = %e, "directory listing failed");
                self.notify(Notice::error(format!("Cannot open {path}: {e}")));
                return;
            }
        };

        if starts_exploration {
            self.city.set_root(path);
        }
        let level = self
            .city
            .build(path, entries, &mut self.store, &mut self.field, now_ms);
        if level.truncated > 0 {
            self.notify(Notice::warning(format!(
                "Showing the first {MAX_ENTRIES} entries, {} hidden",
                level.truncated
            )));
        }
        self.viewport
            .spawn_player(level.spawn, level.spawn_yaw, &mut self.store);
        let effects = self.viewport.enter_first_person(&mut self.store);
        self.apply_viewport(effects);
        self.prompt = None;
    }

    pub fn relay_connect(&mut self) {
        match self.relay.connect() {
            Ok(actions) => self.apply_relay(actions),
            Err(e) => self.notify(Notice::warning(e.to_string())),
        }
    }

    pub fn relay_disconnect(&mut self) {
        let actions = self.relay.disconnect();
        self.apply_relay(actions);
        self.go_offline();
    }

    pub fn request_merge(&mut self, code: &str) {
        match self.relay.request_merge(code) {
            Ok(actions) => self.apply_relay(actions),
            Err(e) => {
                debug!(code, error = %e, "merge request rejected locally");
                self.notify(Notice::warning(e.to_string()));
            }
        }
    }

    pub fn on_relay_event(&mut self, event: RelayTransportEvent, now_ms: u64) {
        let actions = match event {
            RelayTransportEvent::Opened => self.relay.on_opened(),
            RelayTransportEvent::Message(message) => self.relay.on_message(message, now_ms),
            RelayTransportEvent::Closed { reason } => {
                // Server-side merges do not survive the socket.
                self.go_offline();
                self.relay.on_closed(&reason, now_ms)
            }
        };
        self.apply_relay(actions);
    }

    /// Publishes `window-close` and drops the relay connection.
    pub fn close(&mut self, now_ms: u64) {
        let events = self.topology.close();
        self.apply_topology(events, now_ms);
        let actions = self.relay.disconnect();
        self.apply_relay(actions);
        info!(window = %self.label, "universe closed");
    }

    fn on_city_action(&mut self, action: CityAction) {
        match action {
            CityAction::Enter(path) => {
                self.outbox.push(SessionEffect::LoadDirectory(path));
            }
            CityAction::Back { from, root } => {
                self.outbox.push(SessionEffect::LoadParent { from, root });
            }
            CityAction::Open(path) => {
                self.outbox
                    .push(SessionEffect::Host(HostRequest::OpenPath(path)));
            }
        }
    }

    fn apply_topology(&mut self, events: Vec<TopologyEvent>, now_ms: u64) {
        for event in events {
            match event {
                TopologyEvent::Publish(message) => self.publish(message),
                TopologyEvent::OverlapChanged(overlap) => {
                    self.sync.on_overlap_set_changed(overlap, &mut self.store);
                }
                TopologyEvent::PeerJoined(_) => {
                    // Let the newcomer learn our rectangle and objects. A peer
                    // we purged may still know us and never rejoin on its
                    // side, so ask for its objects too.
                    let announce = self.topology.announce(now_ms);
                    self.apply_topology(announce, now_ms);
                    let effects = self.sync.on_request_sync();
                    self.apply_sync(effects);
                    self.publish(BusMessage::ObjectRequest);
                }
                TopologyEvent::PeerLeft(label) => self.sync.forget_peer(&label, &mut self.store),
            }
        }
    }

    fn apply_sync(&mut self, effects: Vec<SyncEffect>) {
        for effect in effects {
            match effect {
                SyncEffect::Bus(message) => self.publish(message),
                SyncEffect::Relay(message) => {
                    self.outbox
                        .push(SessionEffect::Relay(RelayCommand::Send(message)));
                }
            }
        }
    }

    fn apply_viewport(&mut self, effects: Vec<ViewportEffect>) {
        for effect in effects {
            match effect {
                ViewportEffect::RequestPointerCapture => self
                    .outbox
                    .push(SessionEffect::Host(HostRequest::RequestPointerCapture)),
                ViewportEffect::ReleasePointerCapture => self
                    .outbox
                    .push(SessionEffect::Host(HostRequest::ReleasePointerCapture)),
                ViewportEffect::ObjectMoved { id, position } => {
                    let _ = self.move_object(&id, position);
                }
                ViewportEffect::ModeChanged(mode) => {
                    debug!(window = %self.label, ?mode, "view mode changed");
                    if mode == ViewMode::Orbit {
                        self.prompt = None;
                    }
                }
            }
        }
    }

    fn apply_relay(&mut self, actions: Vec<RelayAction>) {
        for action in actions {
            match action {
                RelayAction::Transport(command) => self.outbox.push(SessionEffect::Relay(command)),
                RelayAction::Online { code } => {
                    self.sync.set_relay_code(Some(code));
                    // Fill the relay's cache before anyone merges with us.
                    let effects = self.sync.republish_to_relay();
                    self.apply_sync(effects);
                }
                RelayAction::Merged { code, objects } => {
                    self.sync.merge_group(&code, objects, &mut self.store);
                }
                RelayAction::Forward { code, event } => {
                    self.sync.on_relay_event(&code, event, &mut self.store);
                }
                RelayAction::GroupLost { code } => self.sync.leave_group(&code, &mut self.store),
                RelayAction::Offline => self.go_offline(),
                RelayAction::Notify(notice) => self.notify(notice),
            }
        }
    }

    fn go_offline(&mut self) {
        self.sync.set_relay_code(None);
        let groups: Vec<String> = self.sync.merged_groups().iter().cloned().collect();
        for code in groups {
            self.sync.leave_group(&code, &mut self.store);
        }
    }

    /// Keeps an owned object's collider in step with its position and solidity.
    fn refresh_collider(&mut self, id: &ObjectId) {
        let source = ColliderSource::Object(id.clone());
        let Some(object) = self.store.object(&SceneKey::local(id.clone())) else {
            self.field.clear_source(&source);
            return;
        };
        if object.properties.is_solid {
            let bounds = GeometryCatalog::bounds(object.kind, object.position, &object.properties);
            self.field.set(source, bounds);
        } else {
            self.field.clear_source(&source);
        }
    }

    fn publish(&mut self, message: BusMessage) {
        self.outbox.push(SessionEffect::Publish(BusEnvelope {
            sender: self.label.clone(),
            message,
        }));
    }

    fn notify(&mut self, notice: Notice) {
        self.outbox.push(SessionEffect::Notify(notice));
    }

    fn reject(&mut self, error: SyncError) -> SyncError {
        warn!(window = %self.label, %error, "object operation rejected");
        self.notify(Notice::warning(error.to_string()));
        error
    }
}

fn aspect_of(rect: WindowRect) -> f32 {
    if rect.height <= 0 {
        return 1.0;
    }
    rect.width as f32 / rect.height as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::input::Key;
    use crate::use_cases::types::{ObjectEvent, RelayInbound, RelayOutbound};

    fn session(label: &str, rect: WindowRect) -> UniverseSession {
        let settings = SessionSettings {
            seed: Some(11),
            ..SessionSettings::default()
        };
        UniverseSession::new(WindowContext::new(label, rect), settings, 0)
    }

    fn published(effects: &[SessionEffect]) -> Vec<&BusMessage> {
        effects
            .iter()
            .filter_map(|e| match e {
                SessionEffect::Publish(envelope) => Some(&envelope.message),
                _ => None,
            })
            .collect()
    }

    fn relay_sends(effects: &[SessionEffect]) -> Vec<&RelayOutbound> {
        effects
            .iter()
            .filter_map(|e| match e {
                SessionEffect::Relay(RelayCommand::Send(message)) => Some(message),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn when_started_then_announce_and_object_request_are_published() {
        let mut s = session("a", WindowRect::new(0, 0, 800, 600));
        s.start(0);
        let effects = s.take_effects();
        let messages = published(&effects);
        assert!(matches!(messages[0], BusMessage::WindowAnnounce { .. }));
        assert_eq!(messages[1], &BusMessage::ObjectRequest);
    }

    #[test]
    fn when_object_is_added_then_it_is_broadcast_and_collides() {
        let mut s = session("a", WindowRect::new(0, 0, 800, 600));
        let id = s.add_object(ObjectKind::Cube, 42).expect("add");

        assert!(id.as_str().starts_with("obj_a_42_"));
        assert_eq!(s.field().count_from(&ColliderSource::Object(id.clone())), 1);
        let effects = s.take_effects();
        assert!(matches!(
            published(&effects).as_slice(),
            [BusMessage::Object(ObjectEvent::Add { .. })]
        ));

        s.update_object(
            &id,
            PropsPatch {
                is_solid: Some(false),
                ..PropsPatch::default()
            },
        )
        .expect("update");
        assert_eq!(s.field().count_from(&ColliderSource::Object(id.clone())), 0);

        s.remove_object(&id).expect("remove");
        assert!(s.store().is_empty());
    }

    #[test]
    fn when_removing_unknown_object_then_a_notice_is_raised() {
        let mut s = session("a", WindowRect::new(0, 0, 800, 600));
        let err = s.remove_object(&ObjectId::from("nope")).unwrap_err();
        assert_eq!(err, SyncError::UnknownObject(ObjectId::from("nope")));
        assert!(
            s.take_effects()
                .iter()
                .any(|e| matches!(e, SessionEffect::Notify(_)))
        );
    }

    #[test]
    fn when_a_peer_joins_then_we_reannounce_resend_and_ask_for_its_objects() {
        let mut s = session("a", WindowRect::new(0, 0, 800, 600));
        s.add_object(ObjectKind::Sphere, 1).expect("add");
        s.take_effects();

        s.handle_bus(
            BusEnvelope {
                sender: "b".to_string(),
                message: BusMessage::WindowAnnounce {
                    label: "b".to_string(),
                    bounds: WindowRect::new(700, 500, 800, 600),
                },
            },
            10,
        );
        let effects = s.take_effects();
        let messages = published(&effects);
        assert!(matches!(messages[0], BusMessage::WindowAnnounce { .. }));
        assert!(matches!(messages[1], BusMessage::Object(ObjectEvent::Add { .. })));
        assert_eq!(messages.last(), Some(&&BusMessage::ObjectRequest));
        assert!(s.topology().overlap_set().contains("b"));
    }

    #[test]
    fn when_city_listing_fails_then_previous_level_is_kept() {
        let mut s = session("a", WindowRect::new(0, 0, 800, 600));
        s.load_city("/home/u");
        assert_eq!(
            s.take_effects(),
            vec![SessionEffect::LoadDirectory("/home/u".to_string())]
        );
        let entries = vec![DirEntry {
            name: "docs".to_string(),
            path: "/home/u/docs".to_string(),
            is_directory: Some(true),
        }];
        s.on_directory_listed("/home/u", Ok(entries), 0);
        let objects = s.store().len();
        assert_eq!(s.viewport().view_mode(), ViewMode::FirstPerson);

        s.take_effects();
        s.on_directory_listed("/home/u/docs", Err(FsError::NotFound("/home/u/docs".into())), 10);
        assert_eq!(s.store().len(), objects);
        assert_eq!(s.city().current(), Some("/home/u"));
        assert!(matches!(
            s.take_effects().as_slice(),
            [SessionEffect::Notify(Notice { .. })]
        ));
    }

    #[test]
    fn when_relay_registers_then_owned_objects_are_mirrored() {
        let mut s = session("a", WindowRect::new(0, 0, 800, 600));
        s.add_object(ObjectKind::Torus, 1).expect("add");
        s.relay_connect();
        s.on_relay_event(RelayTransportEvent::Opened, 5);
        let code = s.relay().code().to_string();
        s.take_effects();

        s.on_relay_event(
            RelayTransportEvent::Message(RelayInbound::Connected { code: code.clone() }),
            10,
        );
        let effects = s.take_effects();
        let sends = relay_sends(&effects);
        assert!(matches!(
            sends.as_slice(),
            [RelayOutbound::Object { code: c, event: ObjectEvent::Add { .. } }] if *c == code
        ));
    }

    #[test]
    fn when_relay_socket_closes_then_merged_ghosts_fade() {
        let mut s = session("a", WindowRect::new(0, 0, 800, 600));
        s.relay_connect();
        s.on_relay_event(RelayTransportEvent::Opened, 0);
        let code = s.relay().code().to_string();
        s.on_relay_event(RelayTransportEvent::Message(RelayInbound::Connected { code }), 0);

        let remote = SceneObject {
            id: ObjectId::from("r1"),
            kind: ObjectKind::Sphere,
            position: Vec3::ZERO,
            properties: ObjectProps::primitive(Rgb(0xffffff), Scale::Uniform(1.0)),
            owner_id: "x".to_string(),
            created_at: 0,
        };
        s.on_relay_event(
            RelayTransportEvent::Message(RelayInbound::MergeObjects {
                from_code: "ZZZZZZ".to_string(),
                objects: vec![remote],
            }),
            0,
        );
        assert_eq!(s.store().ghost_count(), 1);

        s.on_relay_event(
            RelayTransportEvent::Closed {
                reason: "reset".to_string(),
            },
            0,
        );
        assert!(s.sync().merged_groups().is_empty());
        let ghost = SceneKey::relay("ZZZZZZ", ObjectId::from("r1"));
        assert!(s.store().get(&ghost).is_some_and(|e| e.is_fading_out()));
    }

    #[test]
    fn cancel_key_returns_to_orbit_and_releases_capture() {
        let mut s = session("a", WindowRect::new(0, 0, 800, 600));
        s.toggle_view_mode();
        assert_eq!(
            s.take_effects(),
            vec![SessionEffect::Host(HostRequest::RequestPointerCapture)]
        );
        s.key_down(Key::Cancel);
        assert_eq!(s.viewport().view_mode(), ViewMode::Orbit);
        assert_eq!(
            s.take_effects(),
            vec![SessionEffect::Host(HostRequest::ReleasePointerCapture)]
        );
    }
}

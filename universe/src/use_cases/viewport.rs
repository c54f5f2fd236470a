// Camera and interaction state machine for one window.

use super::scene_store::{Placement, SceneObjectStore};
use crate::domain::collision::CollisionField;
use crate::domain::geometry::GeometryCatalog;
use crate::domain::input::{InputState, Joystick, Key, Ndc, PointerButton, PointerEvent};
use crate::domain::math::Vec3;
use crate::domain::object::{ObjectId, ObjectKind, ObjectProps, Rgb, Scale, SceneKey, SceneObject};
use crate::domain::quality::{FrameThrottle, QualityPreset, QualitySettings};
use crate::domain::systems::{movement, orbit};
use crate::domain::tuning::{CameraTuning, PlayerTuning};
use crate::domain::view::{
    Camera, ControlState, DragState, FirstPersonState, Kinematics, LookMode, OrbitCamera, ViewMode,
};
use std::time::Duration;
use tracing::{debug, info};

/// Longest step the physics integrates in one frame; longer gaps (a hidden
/// window, a debugger pause) are clamped.
const MAX_FRAME_SECONDS: f32 = 0.1;

pub const AVATAR_ID: &str = "player";

#[derive(Debug, Clone, PartialEq)]
pub enum ViewportEffect {
    RequestPointerCapture,
    ReleasePointerCapture,
    /// A locally owned object was dragged; route through sync.
    ObjectMoved { id: ObjectId, position: Vec3 },
    ModeChanged(ViewMode),
}

pub struct ViewportController {
    owner: String,
    state: ControlState,
    orbit: OrbitCamera,
    player: Kinematics,
    input: InputState,
    camera_tuning: CameraTuning,
    player_tuning: PlayerTuning,
    aspect: f32,
    quality: QualitySettings,
    throttle: FrameThrottle,
}

impl ViewportController {
    pub fn new(owner: impl Into<String>, aspect: f32) -> Self {
        let camera_tuning = CameraTuning::default();
        let quality = QualitySettings::default();
        Self {
            owner: owner.into(),
            state: ControlState::Idle,
            orbit: OrbitCamera {
                target: Vec3::ZERO,
                yaw: 0.0,
                pitch: camera_tuning.start_pitch,
                distance: camera_tuning.start_distance,
            },
            player: Kinematics::at(Vec3::new(0.0, 2.0, 8.0)),
            input: InputState::default(),
            camera_tuning,
            player_tuning: PlayerTuning::default(),
            aspect,
            quality,
            throttle: FrameThrottle::new(quality.frame_interval),
        }
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn view_mode(&self) -> ViewMode {
        self.state.view_mode()
    }

    pub fn orbit(&self) -> &OrbitCamera {
        &self.orbit
    }

    pub fn player(&self) -> &Kinematics {
        &self.player
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn quality(&self) -> QualitySettings {
        self.quality
    }

    pub fn avatar_key() -> SceneKey {
        SceneKey::local(ObjectId::from(AVATAR_ID))
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    /// Camera pose for the renderer. In first person it is locked to the
    /// avatar's eye even while paused.
    pub fn camera(&self) -> Camera {
        let fov = self.camera_tuning.fov_y;
        match self.state {
            ControlState::FirstPerson(_) => Camera::from_angles(
                self.eye_position(),
                self.player.yaw,
                self.player.pitch,
                fov,
                self.aspect,
            ),
            _ => Camera::looking_at(self.orbit.eye(), self.orbit.target, fov, self.aspect),
        }
    }

    pub fn eye_position(&self) -> Vec3 {
        self.player.position + Vec3::new(0.0, self.player_tuning.eye_height, 0.0)
    }

    /// Places the avatar, e.g. at a level's spawn point.
    pub fn spawn_player(&mut self, position: Vec3, yaw: f32, store: &mut SceneObjectStore) {
        self.player = Kinematics {
            position,
            velocity_y: 0.0,
            grounded: false,
            yaw,
            pitch: 0.0,
        };
        store.set_position(&Self::avatar_key(), position);
    }

    pub fn toggle_view_mode(&mut self, store: &mut SceneObjectStore) -> Vec<ViewportEffect> {
        match self.state {
            ControlState::FirstPerson(_) => self.exit_first_person(store),
            _ => self.enter_first_person(store),
        }
    }

    pub fn enter_first_person(&mut self, store: &mut SceneObjectStore) -> Vec<ViewportEffect> {
        if matches!(self.state, ControlState::FirstPerson(_)) {
            return Vec::new();
        }
        self.state = ControlState::FirstPerson(FirstPersonState {
            look: LookMode::AwaitingCapture,
            paused: false,
        });
        self.input = InputState::default();
        let avatar = self.avatar_object();
        if store.insert_local(avatar, Placement::Fixed).is_err() {
            store.set_position(&Self::avatar_key(), self.player.position);
        }
        info!(owner = %self.owner, "entered first person");
        vec![
            ViewportEffect::RequestPointerCapture,
            ViewportEffect::ModeChanged(ViewMode::FirstPerson),
        ]
    }

    pub fn exit_first_person(&mut self, store: &mut SceneObjectStore) -> Vec<ViewportEffect> {
        if !matches!(self.state, ControlState::FirstPerson(_)) {
            return Vec::new();
        }
        self.state = ControlState::Idle;
        self.input = InputState::default();
        store.remove(&Self::avatar_key());
        info!(owner = %self.owner, "returned to orbit");
        vec![
            ViewportEffect::ReleasePointerCapture,
            ViewportEffect::ModeChanged(ViewMode::Orbit),
        ]
    }

    /// Host answered a capture request, or capture was lost.
    pub fn on_capture_changed(&mut self, captured: bool) {
        if let ControlState::FirstPerson(fp) = &mut self.state {
            fp.look = if captured {
                LookMode::Pointer
            } else {
                LookMode::Keyboard
            };
            debug!(look = ?fp.look, "pointer capture changed");
        }
    }

    /// An external modal took (or released) focus.
    pub fn set_paused(&mut self, paused: bool) {
        if let ControlState::FirstPerson(fp) = &mut self.state {
            fp.paused = paused;
            if paused {
                self.input.clear_movement();
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.state, ControlState::FirstPerson(FirstPersonState { paused: true, .. }))
    }

    pub fn on_key_down(&mut self, key: Key, store: &mut SceneObjectStore) -> Vec<ViewportEffect> {
        if key == Key::Cancel {
            return self.exit_first_person(store);
        }
        if self.is_paused() && key.is_movement() {
            return Vec::new();
        }
        self.input.press(key);
        Vec::new()
    }

    pub fn on_key_up(&mut self, key: Key) {
        self.input.release(key);
    }

    pub fn set_joystick(&mut self, joystick: Option<Joystick>) {
        self.input.joystick = joystick;
    }

    pub fn tap(&mut self) {
        self.input.tap = true;
    }

    /// Consumes a pending confirm (interact key or touch tap).
    pub fn take_confirm(&mut self) -> bool {
        let key = self.input.take(Key::Interact);
        let tap = std::mem::take(&mut self.input.tap);
        key || tap
    }

    pub fn on_pointer(&mut self, event: PointerEvent, store: &SceneObjectStore) -> Vec<ViewportEffect> {
        match (event, self.state.clone()) {
            (PointerEvent::Move { dx, dy, .. }, ControlState::FirstPerson(fp)) => {
                if fp.look == LookMode::Pointer && !fp.paused {
                    movement::apply_pointer_look(&mut self.player, dx, dy, &self.player_tuning);
                }
            }
            (_, ControlState::FirstPerson(_)) => {}
            (
                PointerEvent::Down {
                    at,
                    button,
                    modifier,
                },
                ControlState::Idle,
            ) => {
                self.state = if button == PointerButton::Secondary || modifier {
                    ControlState::Panning
                } else {
                    match self.pick(at, store) {
                        Some((key, _)) => self.start_drag(key, at, store),
                        None => ControlState::Orbiting,
                    }
                };
            }
            (PointerEvent::Down { .. }, _) => {}
            (PointerEvent::Move { dx, dy, .. }, ControlState::Orbiting) => {
                orbit::rotate(&mut self.orbit, dx, dy, &self.camera_tuning);
            }
            (PointerEvent::Move { dx, dy, .. }, ControlState::Panning) => {
                let camera = self.camera();
                orbit::pan(&mut self.orbit, &camera, dx, dy, &self.camera_tuning);
            }
            (PointerEvent::Move { at, .. }, ControlState::Dragging(drag)) => {
                return self.drag_to(&drag, at).into_iter().collect();
            }
            (PointerEvent::Move { .. }, ControlState::Idle) => {}
            (PointerEvent::Up, _) => self.state = ControlState::Idle,
            (PointerEvent::Wheel { delta }, _) => {
                orbit::zoom(&mut self.orbit, delta, &self.camera_tuning);
            }
        }
        Vec::new()
    }

    /// Nearest draggable object under the pointer, with the hit point.
    /// Ghosts, level geometry and the avatar are never picked.
    pub fn pick(&self, at: Ndc, store: &SceneObjectStore) -> Option<(SceneKey, Vec3)> {
        let ray = self.camera().ray_through(at.x, at.y);
        store
            .iter()
            .filter(|(key, entry)| {
                !key.is_ghost()
                    && entry.placement == Placement::Free
                    && entry.object.kind != ObjectKind::Avatar
            })
            .filter_map(|(key, entry)| {
                let bounds = GeometryCatalog::bounds(
                    entry.object.kind,
                    entry.object.position,
                    &entry.object.properties,
                );
                bounds.ray_hit(&ray).map(|t| (key, t))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(key, t)| (key.clone(), ray.at(t)))
    }

    pub fn set_quality(&mut self, preset: QualityPreset, store: &mut SceneObjectStore) {
        self.quality = QualitySettings::for_preset(preset);
        self.throttle.set_interval(self.quality.frame_interval);
        store.set_quality(self.quality);
        info!(?preset, "quality preset applied");
    }

    /// Per-frame update. Returns the integrated step in seconds, or None when
    /// the frame throttle skipped this call.
    pub fn frame(
        &mut self,
        now: Duration,
        store: &mut SceneObjectStore,
        field: &CollisionField,
    ) -> Option<f32> {
        let elapsed = self.throttle.accept(now)?;
        let dt = elapsed.as_secs_f32().min(MAX_FRAME_SECONDS);

        let ControlState::FirstPerson(fp) = self.state else {
            return Some(dt);
        };

        let intent = if fp.paused {
            movement::MoveIntent::default()
        } else {
            if fp.look != LookMode::Pointer {
                let yaw_dir = axis(&self.input, Key::LookRight, Key::LookLeft);
                let pitch_dir = axis(&self.input, Key::LookDown, Key::LookUp);
                movement::apply_keyboard_look(
                    &mut self.player,
                    yaw_dir,
                    pitch_dir,
                    dt,
                    &self.player_tuning,
                );
            }
            movement::MoveIntent {
                forward: axis(&self.input, Key::Back, Key::Forward),
                strafe: axis(&self.input, Key::Left, Key::Right),
                joystick: self.input.joystick,
                jump: self.input.is_held(Key::Jump),
                sprint: self.input.is_held(Key::Sprint),
            }
        };

        movement::tick_player(&mut self.player, &intent, dt, &self.player_tuning, field);
        store.set_position(&Self::avatar_key(), self.player.position);
        Some(dt)
    }

    fn start_drag(&self, key: SceneKey, at: Ndc, store: &SceneObjectStore) -> ControlState {
        let Some(object) = store.object(&key) else {
            return ControlState::Orbiting;
        };
        let plane_y = object.position.y;
        // Grab point on the drag plane, so the object does not jump under the cursor.
        let grab = self
            .camera()
            .ray_through(at.x, at.y)
            .intersect_horizontal_plane(plane_y)
            .unwrap_or(object.position);
        ControlState::Dragging(DragState {
            key,
            offset: Vec3::new(grab.x - object.position.x, 0.0, grab.z - object.position.z),
            plane_y,
        })
    }

    fn drag_to(&self, drag: &DragState, at: Ndc) -> Option<ViewportEffect> {
        let ray = self.camera().ray_through(at.x, at.y);
        let hit = ray.intersect_horizontal_plane(drag.plane_y)?;
        let target = hit - drag.offset;
        let position = Vec3::new(
            target.x,
            drag.plane_y.max(self.camera_tuning.min_drag_height),
            target.z,
        );
        if !position.is_finite() {
            return None;
        }
        Some(ViewportEffect::ObjectMoved {
            id: drag.key.id.clone(),
            position,
        })
    }

    fn avatar_object(&self) -> SceneObject {
        let mut properties = ObjectProps::primitive(Rgb(0x00ffcc), Scale::Uniform(1.0));
        properties.is_solid = false;
        SceneObject {
            id: ObjectId::from(AVATAR_ID),
            kind: ObjectKind::Avatar,
            position: self.player.position,
            properties,
            owner_id: self.owner.clone(),
            created_at: 0,
        }
    }
}

fn axis(input: &InputState, negative: Key, positive: Key) -> f32 {
    let mut value = 0.0;
    if input.is_held(positive) {
        value += 1.0;
    }
    if input.is_held(negative) {
        value -= 1.0;
    }
    value
}

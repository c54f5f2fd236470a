use crate::domain::collision::{Aabb, CollisionField};
use crate::domain::input::Joystick;
use crate::domain::math::Vec3;
use crate::domain::tuning::PlayerTuning;
use crate::domain::view::Kinematics;

/// Movement intent for one frame, already resolved from keys and touch input.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveIntent {
    /// -1 (back) ..= 1 (forward) from keys.
    pub forward: f32,
    /// -1 (left) ..= 1 (right) from keys.
    pub strafe: f32,
    pub joystick: Option<Joystick>,
    pub jump: bool,
    pub sprint: bool,
}

/// Collision volume of the avatar standing at `feet`.
pub fn body_at(feet: Vec3, cfg: &PlayerTuning) -> Aabb {
    Aabb::new(
        Vec3::new(feet.x - cfg.half_width, feet.y, feet.z - cfg.half_width),
        Vec3::new(
            feet.x + cfg.half_width,
            feet.y + cfg.body_height,
            feet.z + cfg.half_width,
        ),
    )
}

/// Planar move direction in world space. Keyboard diagonals are normalized;
/// joystick input is already magnitude-limited and passes through.
pub fn planar_direction(k: &Kinematics, intent: &MoveIntent) -> Vec3 {
    let forward = k.forward();
    let right = k.right();

    let keys = forward * intent.forward + right * intent.strafe;
    let keys = if keys.length() > 1.0 {
        keys.normalize_or_zero()
    } else {
        keys
    };

    match intent.joystick {
        Some(joy) => keys + forward * (-joy.dy) + right * joy.dx,
        None => keys,
    }
}

pub fn tick_player(
    k: &mut Kinematics,
    intent: &MoveIntent,
    dt: f32,
    cfg: &PlayerTuning,
    field: &CollisionField,
) {
    let speed = if intent.sprint {
        cfg.sprint_speed
    } else {
        cfg.walk_speed
    };
    let step = planar_direction(k, intent) * (speed * dt);

    // X and Z are tested independently so the avatar slides along walls.
    if step.x != 0.0 {
        let next = Vec3::new(k.position.x + step.x, k.position.y, k.position.z);
        if !field.intersects(&body_at(next, cfg)) {
            k.position = next;
        }
    }
    if step.z != 0.0 {
        let next = Vec3::new(k.position.x, k.position.y, k.position.z + step.z);
        if !field.intersects(&body_at(next, cfg)) {
            k.position = next;
        }
    }

    if intent.jump && k.grounded {
        k.velocity_y = cfg.jump_impulse;
        k.grounded = false;
    }
    k.velocity_y += cfg.gravity * dt;

    let mut next_y = k.position.y + k.velocity_y * dt;
    let mut on_floor = false;
    if next_y <= cfg.floor_y {
        next_y = cfg.floor_y;
        on_floor = true;
    }

    let next = Vec3::new(k.position.x, next_y, k.position.z);
    if field.intersects(&body_at(next, cfg)) {
        // Blocked vertically: landing on a box top or bumping a ceiling.
        if k.velocity_y <= 0.0 {
            k.grounded = true;
        }
        k.velocity_y = 0.0;
    } else {
        k.position = next;
        if on_floor {
            k.velocity_y = 0.0;
            k.grounded = true;
        } else {
            k.grounded = false;
        }
    }
}

pub fn apply_pointer_look(k: &mut Kinematics, dx: f32, dy: f32, cfg: &PlayerTuning) {
    k.yaw -= dx * cfg.pointer_sensitivity;
    k.pitch = (k.pitch - dy * cfg.pointer_sensitivity).clamp(-cfg.max_pitch, cfg.max_pitch);
}

/// `yaw_dir`/`pitch_dir` are -1, 0 or 1 from the arrow keys.
pub fn apply_keyboard_look(
    k: &mut Kinematics,
    yaw_dir: f32,
    pitch_dir: f32,
    dt: f32,
    cfg: &PlayerTuning,
) {
    k.yaw += yaw_dir * cfg.keyboard_look_rate * dt;
    k.pitch = (k.pitch + pitch_dir * cfg.keyboard_look_rate * dt)
        .clamp(-cfg.max_pitch, cfg.max_pitch);
}

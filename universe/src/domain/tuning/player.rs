/// Gameplay tuning for the first-person avatar.
///
/// Keep this separate from runtime configuration (tick rates, buffer sizes, etc.).

#[derive(Debug, Clone, Copy)]
pub struct PlayerTuning {
    /// Walking speed in world units per second.
    pub walk_speed: f32,

    /// Speed while the sprint key is held.
    pub sprint_speed: f32,

    /// Vertical acceleration in units per second squared (negative is down).
    pub gravity: f32,

    /// Upward velocity applied by a jump.
    pub jump_impulse: f32,

    /// Lowest height the avatar's feet may reach.
    pub floor_y: f32,

    /// Camera height above the avatar's feet.
    pub eye_height: f32,

    /// Half width of the avatar's collision volume on X and Z.
    pub half_width: f32,

    /// Full height of the avatar's collision volume.
    pub body_height: f32,

    /// Mouse-look sensitivity in radians per pixel.
    pub pointer_sensitivity: f32,

    /// Arrow-key look speed in radians per second.
    pub keyboard_look_rate: f32,

    /// Pitch limit in radians, symmetric around the horizon.
    pub max_pitch: f32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            walk_speed: 9.0,
            sprint_speed: 18.0,
            gravity: -30.0,
            jump_impulse: 10.0,
            floor_y: 0.1,
            eye_height: 1.6,
            half_width: 0.3,
            body_height: 1.8,
            pointer_sensitivity: 0.002,
            keyboard_look_rate: 2.0,
            max_pitch: 1.5,
        }
    }
}

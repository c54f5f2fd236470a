/// Orbit camera and object drag tuning.

#[derive(Debug, Clone, Copy)]
pub struct CameraTuning {
    /// Orbit rotation in radians per dragged pixel.
    pub rotate_sensitivity: f32,

    /// Pan distance per pixel, multiplied by the current orbit distance.
    pub pan_sensitivity: f32,

    /// Distance change per wheel unit, relative to the current distance.
    pub zoom_sensitivity: f32,

    pub min_distance: f32,
    pub max_distance: f32,

    /// Orbit pitch limit in radians.
    pub max_pitch: f32,

    /// Initial orbit distance.
    pub start_distance: f32,

    /// Initial orbit pitch (camera above the target).
    pub start_pitch: f32,

    /// Vertical field of view in radians.
    pub fov_y: f32,

    /// Dragged objects never go below this height.
    pub min_drag_height: f32,
}

impl Default for CameraTuning {
    fn default() -> Self {
        Self {
            rotate_sensitivity: 0.005,
            pan_sensitivity: 0.0015,
            zoom_sensitivity: 0.001,
            min_distance: 5.0,
            max_distance: 30.0,
            max_pitch: 1.5,
            start_distance: 13.0,
            start_pitch: 0.39,
            fov_y: 60f32.to_radians(),
            min_drag_height: 0.5,
        }
    }
}

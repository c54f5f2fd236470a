// Camera and interaction state for one window's viewport.

use crate::domain::math::{Ray, Vec3};
use crate::domain::object::SceneKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Orbit,
    FirstPerson,
}

/// How first-person look is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookMode {
    /// Capture requested, host has not answered yet; arrow keys work meanwhile.
    AwaitingCapture,
    /// Pointer captured: mouse deltas drive yaw/pitch.
    Pointer,
    /// Capture denied or lost: arrow keys drive yaw/pitch.
    Keyboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirstPersonState {
    pub look: LookMode,
    /// An external modal has focus; movement keys are ignored.
    pub paused: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragState {
    pub key: SceneKey,
    /// Grab point minus object position, on the drag plane.
    pub offset: Vec3,
    /// Height of the horizontal drag plane.
    pub plane_y: f32,
}

/// The single interaction state. Illegal mixes (dragging in first person,
/// panning while orbiting) cannot be expressed.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlState {
    Idle,
    Orbiting,
    Panning,
    Dragging(DragState),
    FirstPerson(FirstPersonState),
}

impl ControlState {
    pub fn view_mode(&self) -> ViewMode {
        match self {
            ControlState::FirstPerson(_) => ViewMode::FirstPerson,
            _ => ViewMode::Orbit,
        }
    }
}

/// Spherical orbit around a target point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
}

impl OrbitCamera {
    pub fn eye(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        self.target + Vec3::new(sy * cp, sp, cy * cp) * self.distance
    }
}

/// First-person avatar physics state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics {
    pub position: Vec3,
    pub velocity_y: f32,
    pub grounded: bool,
    pub yaw: f32,
    pub pitch: f32,
}

impl Kinematics {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            velocity_y: 0.0,
            grounded: false,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    /// Horizontal forward direction for the current yaw (yaw 0 looks down -Z).
    pub fn forward(&self) -> Vec3 {
        Vec3::new(-self.yaw.sin(), 0.0, -self.yaw.cos())
    }

    /// Horizontal right direction, `forward x up`.
    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::UP).normalize_or_zero()
    }
}

/// Resolved camera pose the renderer reads each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
}

impl Camera {
    pub fn looking_at(eye: Vec3, target: Vec3, fov_y: f32, aspect: f32) -> Self {
        let forward = (target - eye).normalize_or_zero();
        let right = forward.cross(Vec3::UP).normalize_or_zero();
        Self {
            eye,
            forward,
            up: right.cross(forward).normalize_or_zero(),
            fov_y,
            aspect,
        }
    }

    pub fn from_angles(eye: Vec3, yaw: f32, pitch: f32, fov_y: f32, aspect: f32) -> Self {
        let (sp, cp) = pitch.sin_cos();
        let forward = Vec3::new(-yaw.sin() * cp, sp, -yaw.cos() * cp);
        Self::looking_at(eye, eye + forward, fov_y, aspect)
    }

    pub fn right(&self) -> Vec3 {
        self.forward.cross(self.up).normalize_or_zero()
    }

    /// Ray from the eye through a pointer position in normalized device coordinates.
    pub fn ray_through(&self, ndc_x: f32, ndc_y: f32) -> Ray {
        let half_h = (self.fov_y / 2.0).tan();
        let half_w = half_h * self.aspect;
        let direction = (self.forward + self.right() * (ndc_x * half_w) + self.up * (ndc_y * half_h))
            .normalize_or_zero();
        Ray {
            origin: self.eye,
            direction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaw_zero_faces_negative_z_with_right_on_positive_x() {
        let k = Kinematics::at(Vec3::ZERO);
        assert_eq!(k.forward(), Vec3::new(-0.0, 0.0, -1.0));
        let right = k.right();
        assert!((right.x - 1.0).abs() < 1e-6 && right.z.abs() < 1e-6);
    }

    #[test]
    fn centered_ray_follows_camera_forward() {
        let camera = Camera::looking_at(Vec3::new(0.0, 5.0, 10.0), Vec3::ZERO, 1.0, 1.5);
        let ray = camera.ray_through(0.0, 0.0);
        assert!((ray.direction.dot(camera.forward) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn orbit_eye_sits_at_distance_from_target() {
        let orbit = OrbitCamera {
            target: Vec3::new(1.0, 0.0, 1.0),
            yaw: 0.7,
            pitch: 0.3,
            distance: 12.0,
        };
        assert!((orbit.eye().distance(orbit.target) - 12.0).abs() < 1e-4);
    }
}

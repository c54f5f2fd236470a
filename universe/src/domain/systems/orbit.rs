use crate::domain::tuning::CameraTuning;
use crate::domain::view::{Camera, OrbitCamera};

pub fn rotate(orbit: &mut OrbitCamera, dx: f32, dy: f32, cfg: &CameraTuning) {
    orbit.yaw -= dx * cfg.rotate_sensitivity;
    orbit.pitch = (orbit.pitch + dy * cfg.rotate_sensitivity).clamp(-cfg.max_pitch, cfg.max_pitch);
}

/// Moves the orbit target in the camera's screen plane; the pan step grows
/// with distance so the scene tracks the pointer at any zoom.
pub fn pan(orbit: &mut OrbitCamera, camera: &Camera, dx: f32, dy: f32, cfg: &CameraTuning) {
    let scale = cfg.pan_sensitivity * orbit.distance;
    orbit.target = orbit.target + camera.right() * (-dx * scale) + camera.up * (dy * scale);
}

/// Positive `delta` (wheel down) zooms out.
pub fn zoom(orbit: &mut OrbitCamera, delta: f32, cfg: &CameraTuning) {
    let factor = (1.0 + delta * cfg.zoom_sensitivity).max(0.01);
    orbit.distance = (orbit.distance * factor).clamp(cfg.min_distance, cfg.max_distance);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::math::Vec3;

    fn orbit() -> OrbitCamera {
        OrbitCamera {
            target: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.4,
            distance: 13.0,
        }
    }

    #[test]
    fn zoom_stays_within_distance_limits() {
        let cfg = CameraTuning::default();
        let mut o = orbit();
        zoom(&mut o, 100_000.0, &cfg);
        assert_eq!(o.distance, cfg.max_distance);
        zoom(&mut o, -100_000.0, &cfg);
        assert_eq!(o.distance, cfg.min_distance);
    }

    #[test]
    fn rotate_clamps_pitch() {
        let cfg = CameraTuning::default();
        let mut o = orbit();
        rotate(&mut o, 10.0, 10_000.0, &cfg);
        assert_eq!(o.pitch, cfg.max_pitch);
        assert!((o.yaw + 0.05).abs() < 1e-6);
    }

    #[test]
    fn pan_moves_target_but_not_distance() {
        let cfg = CameraTuning::default();
        let mut o = orbit();
        let camera = Camera::looking_at(o.eye(), o.target, cfg.fov_y, 1.0);
        pan(&mut o, &camera, 100.0, 0.0, &cfg);
        assert!(o.target.distance(Vec3::ZERO) > 1.0);
        assert_eq!(o.distance, 13.0);
    }
}

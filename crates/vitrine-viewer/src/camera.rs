//! Camera state and the eased transition between two framings.

use std::time::Duration;

use glam::{Mat4, Vec3};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraState {
    pub position: Vec3,
    pub target: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    /// Orbit controls zoom limits.
    pub min_distance: f32,
    pub max_distance: f32,
}

impl CameraState {
    /// Start-up camera before anything is framed.
    pub fn initial(fov_y: f32) -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 30.0),
            target: Vec3::ZERO,
            fov_y,
            near: 0.1,
            far: 5000.0,
            min_distance: 1.0,
            max_distance: 5000.0,
        }
    }

    pub fn distance(&self) -> f32 {
        self.position.distance(self.target)
    }

    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        let view = Mat4::look_at_rh(self.position, self.target, Vec3::Y);
        let proj = Mat4::perspective_rh(self.fov_y, aspect, self.near, self.far);
        proj * view
    }
}

pub fn ease_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

/// Interpolates position and target from one camera to another. Clip
/// planes and orbit limits switch to the destination immediately.
#[derive(Debug, Clone, Copy)]
pub struct CameraTween {
    pub from: CameraState,
    pub to: CameraState,
    pub duration: Duration,
}

impl CameraTween {
    pub fn new(from: CameraState, to: CameraState, duration: Duration) -> Self {
        Self { from, to, duration }
    }

    pub fn progress(&self, elapsed: Duration) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }

    pub fn is_finished(&self, elapsed: Duration) -> bool {
        elapsed >= self.duration
    }

    pub fn sample(&self, elapsed: Duration) -> CameraState {
        let eased = ease_out_cubic(self.progress(elapsed));
        CameraState {
            position: self.from.position.lerp(self.to.position, eased),
            target: self.from.target.lerp(self.to.target, eased),
            ..self.to
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ease_out_cubic() {
        assert_eq!(ease_out_cubic(0.0), 0.0);
        assert_eq!(ease_out_cubic(1.0), 1.0);
        assert!((ease_out_cubic(0.5) - 0.875).abs() < 1e-6);
        assert_eq!(ease_out_cubic(2.0), 1.0);
    }

    #[test]
    fn test_tween_endpoints_and_midpoint() {
        let from = CameraState::initial(1.0);
        let to = CameraState {
            position: Vec3::new(10.0, 10.0, 10.0),
            target: Vec3::new(0.0, 1.0, 0.0),
            near: 0.5,
            ..from
        };
        let tween = CameraTween::new(from, to, Duration::from_millis(1000));

        assert_eq!(tween.sample(Duration::ZERO).position, from.position);
        assert_eq!(tween.sample(Duration::from_millis(1000)).position, to.position);
        assert_eq!(tween.sample(Duration::from_millis(5000)).target, to.target);

        let mid = tween.sample(Duration::from_millis(500));
        let expected = from.position.lerp(to.position, 0.875);
        assert!(mid.position.abs_diff_eq(expected, 1e-4));
        assert_eq!(mid.near, 0.5);
        assert!(!tween.is_finished(Duration::from_millis(999)));
        assert!(tween.is_finished(Duration::from_millis(1000)));
    }

    #[test]
    fn test_zero_duration_jumps() {
        let from = CameraState::initial(1.0);
        let to = CameraState {
            position: Vec3::ONE,
            ..from
        };
        let tween = CameraTween::new(from, to, Duration::ZERO);
        assert_eq!(tween.sample(Duration::ZERO).position, Vec3::ONE);
    }
}

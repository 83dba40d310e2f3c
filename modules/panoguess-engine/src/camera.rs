use crate::traits::Camera;

/// Restricts the viewer camera to a baseline captured when the round loaded.
/// Applied on every camera-change notification, for the whole round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraLock {
    baseline: Camera,
    lock_orientation: bool,
    lock_fov: bool,
}

impl CameraLock {
    pub fn new(baseline: Camera, lock_orientation: bool, lock_fov: bool) -> Self {
        Self {
            baseline,
            lock_orientation,
            lock_fov,
        }
    }

    pub fn baseline(&self) -> Camera {
        self.baseline
    }

    /// Camera to push back to the viewer, or `None` if `reported` is allowed.
    pub fn correct(&self, reported: Camera) -> Option<Camera> {
        let mut corrected = reported;
        if self.lock_orientation {
            corrected.yaw = self.baseline.yaw;
            corrected.pitch = self.baseline.pitch;
        }
        if self.lock_fov {
            corrected.fov = self.baseline.fov;
        }
        (corrected != reported).then_some(corrected)
    }
}

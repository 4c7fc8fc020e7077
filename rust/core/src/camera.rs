//! Seam towards the renderer's camera

use crate::packet::{Vec3, WorldUpdate};
use parking_lot::Mutex;

/// Position and 2-axis orientation handed to the camera, angles in radians
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
}

impl CameraPose {
    /// Producer angles are degrees with yaw growing the opposite way to the
    /// renderer's.
    pub fn from_world_update(update: &WorldUpdate) -> Self {
        Self {
            position: update.origin,
            yaw: -update.view_angles.yaw.to_radians(),
            pitch: update.view_angles.pitch.to_radians(),
        }
    }
}

/// Receives one pose per world update, from the consumer thread
pub trait CameraSink: Send + Sync {
    fn update_pose(&self, pose: CameraPose);
}

impl<F> CameraSink for F
where
    F: Fn(CameraPose) + Send + Sync,
{
    fn update_pose(&self, pose: CameraPose) {
        self(pose)
    }
}

/// Latest pose, readable from the render loop
#[derive(Debug, Default)]
pub struct SharedCamera {
    pose: Mutex<Option<CameraPose>>,
}

impl SharedCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until the first world update arrives
    pub fn pose(&self) -> Option<CameraPose> {
        *self.pose.lock()
    }
}

impl CameraSink for SharedCamera {
    fn update_pose(&self, pose: CameraPose) {
        *self.pose.lock() = Some(pose);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::ViewAngles;

    #[test]
    fn test_pose_conversion() {
        let update = WorldUpdate {
            view_angles: ViewAngles {
                pitch: 90.0,
                yaw: 180.0,
                roll: 33.0,
            },
            origin: Vec3::new(1.0, 2.0, 3.0),
            curtime: 1.0,
        };
        let pose = CameraPose::from_world_update(&update);

        assert_eq!(pose.position, Vec3::new(1.0, 2.0, 3.0));
        assert!((pose.pitch - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert!((pose.yaw + std::f32::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn test_shared_camera_keeps_latest() {
        let camera = SharedCamera::new();
        assert!(camera.pose().is_none());

        camera.update_pose(CameraPose { yaw: 1.0, ..Default::default() });
        camera.update_pose(CameraPose { yaw: 2.0, ..Default::default() });
        assert_eq!(camera.pose().map(|p| p.yaw), Some(2.0));
    }
}

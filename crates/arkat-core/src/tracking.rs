//! Per-frame tracking data delivered by the tracking subsystem

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest accepted deviation of a rotation quaternion's norm from 1.0
const ROTATION_NORM_TOLERANCE: f32 = 1e-2;

/// Stable identifier of a registered reference target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetIndex(pub u32);

impl std::fmt::Display for TargetIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Confidence classification of a target's pose for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    /// Target is not being tracked
    #[default]
    NotTracking,
    /// Pose is extrapolated from an earlier observation and may be stale
    LastKnownPose,
    /// Pose was confirmed against the current camera image
    FullTracking,
}

impl std::fmt::Display for TrackingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotTracking => "not_tracking",
            Self::LastKnownPose => "last_known_pose",
            Self::FullTracking => "full_tracking",
        };
        f.write_str(name)
    }
}

/// Rigid 6-DOF pose: translation in meters and a unit rotation quaternion `[x, y, z, w]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    #[serde(default)]
    pub translation: [f32; 3],
    #[serde(default = "identity_rotation")]
    pub rotation: [f32; 4],
}

fn identity_rotation() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        translation: [0.0, 0.0, 0.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
    };

    pub fn new(translation: [f32; 3], rotation: [f32; 4]) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        Self {
            translation: [x, y, z],
            ..Self::IDENTITY
        }
    }

    pub fn is_finite(&self) -> bool {
        self.translation.iter().all(|v| v.is_finite()) && self.rotation.iter().all(|v| v.is_finite())
    }

    /// Euclidean norm of the rotation quaternion
    pub fn rotation_norm(&self) -> f32 {
        self.rotation.iter().map(|v| v * v).sum::<f32>().sqrt()
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A malformed event inside a tracking frame
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("target {0} reported a non-finite pose")]
    NonFinitePose(TargetIndex),
    #[error("target {index} reported a rotation with norm {norm}")]
    DenormalizedRotation { index: TargetIndex, norm: f32 },
}

/// One target's tracking update for a single frame
///
/// Produced fresh by the tracking subsystem every frame and never retained
/// past the frame that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub index: TargetIndex,
    pub state: TrackingState,
    #[serde(default)]
    pub center_pose: Pose,
}

impl TrackingEvent {
    pub fn new(index: TargetIndex, state: TrackingState, center_pose: Pose) -> Self {
        Self {
            index,
            state,
            center_pose,
        }
    }

    /// Check that the pose can be used to place content
    pub fn validate(&self) -> Result<(), FrameError> {
        if !self.center_pose.is_finite() {
            return Err(FrameError::NonFinitePose(self.index));
        }
        let norm = self.center_pose.rotation_norm();
        if (norm - 1.0).abs() > ROTATION_NORM_TOLERANCE {
            return Err(FrameError::DenormalizedRotation {
                index: self.index,
                norm,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_from_json() {
        let json = r#"{
            "index": 0,
            "state": "full_tracking",
            "center_pose": { "translation": [0.1, 0.0, -0.5], "rotation": [0.0, 0.0, 0.0, 1.0] }
        }"#;
        let event: TrackingEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.index, TargetIndex(0));
        assert_eq!(event.state, TrackingState::FullTracking);
        assert_eq!(event.center_pose.translation, [0.1, 0.0, -0.5]);
    }

    #[test]
    fn test_pose_defaults_to_identity() {
        let event: TrackingEvent =
            serde_json::from_str(r#"{ "index": 3, "state": "not_tracking" }"#).unwrap();
        assert_eq!(event.center_pose, Pose::IDENTITY);
        assert!(event.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_poses() {
        let nan = TrackingEvent::new(
            TargetIndex(1),
            TrackingState::FullTracking,
            Pose::from_translation(f32::NAN, 0.0, 0.0),
        );
        assert_eq!(nan.validate(), Err(FrameError::NonFinitePose(TargetIndex(1))));

        let skewed = TrackingEvent::new(
            TargetIndex(1),
            TrackingState::FullTracking,
            Pose::new([0.0; 3], [0.0, 0.0, 0.0, 2.0]),
        );
        assert!(matches!(
            skewed.validate(),
            Err(FrameError::DenormalizedRotation { .. })
        ));
    }
}

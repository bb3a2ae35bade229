pub mod replay;

use core::fmt::Debug;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::TextureFrame;

/// Number of keypoints the short-range face detector reports per face.
pub const NUM_KEY_POINTS: usize = 6;

/// Index of each keypoint inside a [`KeypointSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceKeypoint {
    RightEye = 0,
    LeftEye = 1,
    NoseTip = 2,
    MouthCenter = 3,
    RightEarTragion = 4,
    LeftEarTragion = 5,
}

impl FaceKeypoint {
    pub const ALL: [FaceKeypoint; NUM_KEY_POINTS] = [
        FaceKeypoint::RightEye,
        FaceKeypoint::LeftEye,
        FaceKeypoint::NoseTip,
        FaceKeypoint::MouthCenter,
        FaceKeypoint::RightEarTragion,
        FaceKeypoint::LeftEarTragion,
    ];
}

/// A landmark in normalized image coordinates, origin at the top-left corner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

pub type KeypointSet = [Keypoint; NUM_KEY_POINTS];

/// Face rectangle in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeBoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationData {
    pub relative_keypoints: KeypointSet,
    #[serde(default)]
    pub relative_bounding_box: Option<RelativeBoundingBox>,
}

/// One detected face. Detectors may emit a face without location data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    pub score: f32,
    #[serde(default)]
    pub location_data: Option<LocationData>,
}

impl FaceDetection {
    pub fn new(score: f32, keypoints: KeypointSet) -> Self {
        Self {
            score,
            location_data: Some(LocationData {
                relative_keypoints: keypoints,
                relative_bounding_box: None,
            }),
        }
    }

    pub fn without_location(score: f32) -> Self {
        Self {
            score,
            location_data: None,
        }
    }

    pub fn has_location_data(&self) -> bool {
        self.location_data.is_some()
    }

    pub fn keypoints(&self) -> Option<&KeypointSet> {
        self.location_data
            .as_ref()
            .map(|location| &location.relative_keypoints)
    }

    pub fn keypoint(&self, keypoint: FaceKeypoint) -> Option<Keypoint> {
        self.keypoints().map(|points| points[keypoint as usize])
    }
}

/// All faces found in one input frame, in detector order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionResult {
    timestamp: Duration,
    faces: Vec<FaceDetection>,
}

impl DetectionResult {
    pub fn new(timestamp: Duration, faces: Vec<FaceDetection>) -> Self {
        Self { timestamp, faces }
    }

    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn multi_face_detections(&self) -> &[FaceDetection] {
        &self.faces
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

#[derive(Debug, Error)]
#[error("face detection error: {message}")]
pub struct DetectorError {
    pub message: String,
}

impl DetectorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A face detector fed one frame at a time by the detection worker.
pub trait FaceDetector: Send {
    fn process(&mut self, frame: &TextureFrame) -> Result<DetectionResult, DetectorError>;

    /// Releases model resources; called once when the session pauses.
    fn close(&mut self) {}
}

impl Debug for dyn FaceDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaceDetector").finish_non_exhaustive()
    }
}

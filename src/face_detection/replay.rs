// replays recorded detections so the overlay can run without a model
use std::fs;
use std::path::Path;

use crate::camera::TextureFrame;
use crate::error::{Error, Result};
use crate::face_detection::{
    DetectionResult, DetectorError, FaceDetection, FaceDetector, Keypoint, KeypointSet,
    LocationData, RelativeBoundingBox, NUM_KEY_POINTS,
};

// keypoint offsets from the face center, in face widths
const FACE_LAYOUT: [(f32, f32); NUM_KEY_POINTS] = [
    (-0.3, -0.25), // right eye
    (0.3, -0.25),  // left eye
    (0.0, 0.05),   // nose tip
    (0.0, 0.35),   // mouth center
    (-0.75, -0.1), // right ear tragion
    (0.75, -0.1),  // left ear tragion
];
const ORBIT_FACE_WIDTH: f32 = 0.25;
const ORBIT_STEP: f32 = 0.05;

enum Track {
    Recorded(Vec<Vec<FaceDetection>>),
    Orbit,
}

pub struct ReplayDetector {
    track: Track,
    min_detection_confidence: f32,
}

impl ReplayDetector {
    /// Reads a JSON array of frames, each an array of faces.
    pub fn from_path(path: &Path, min_detection_confidence: f32) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::ReplayIo {
            path: path.to_path_buf(),
            source,
        })?;
        let frames: Vec<Vec<FaceDetection>> = serde_json::from_str(&text)?;
        tracing::info!(path = %path.display(), frames = frames.len(), "loaded detection replay");
        Ok(Self::from_frames(frames, min_detection_confidence))
    }

    pub fn from_frames(frames: Vec<Vec<FaceDetection>>, min_detection_confidence: f32) -> Self {
        Self {
            track: Track::Recorded(frames),
            min_detection_confidence,
        }
    }

    /// One face circling the frame center.
    pub fn orbit(min_detection_confidence: f32) -> Self {
        Self {
            track: Track::Orbit,
            min_detection_confidence,
        }
    }

    fn faces_for(&self, sequence: u64) -> Vec<FaceDetection> {
        match &self.track {
            Track::Recorded(frames) if frames.is_empty() => Vec::new(),
            Track::Recorded(frames) => frames[(sequence % frames.len() as u64) as usize].clone(),
            Track::Orbit => vec![orbit_face(sequence)],
        }
    }
}

fn orbit_face(sequence: u64) -> FaceDetection {
    let angle = sequence as f32 * ORBIT_STEP;
    let center_x = 0.5 + 0.2 * angle.cos();
    let center_y = 0.5 + 0.15 * angle.sin();

    let mut keypoints: KeypointSet = [Keypoint::default(); NUM_KEY_POINTS];
    for (keypoint, (dx, dy)) in keypoints.iter_mut().zip(FACE_LAYOUT) {
        *keypoint = Keypoint::new(
            center_x + dx * ORBIT_FACE_WIDTH,
            center_y + dy * ORBIT_FACE_WIDTH,
        );
    }

    FaceDetection {
        score: 0.95,
        location_data: Some(LocationData {
            relative_keypoints: keypoints,
            relative_bounding_box: Some(RelativeBoundingBox {
                xmin: center_x - ORBIT_FACE_WIDTH / 2.0,
                ymin: center_y - ORBIT_FACE_WIDTH / 2.0,
                width: ORBIT_FACE_WIDTH,
                height: ORBIT_FACE_WIDTH,
            }),
        }),
    }
}

impl FaceDetector for ReplayDetector {
    fn process(
        &mut self,
        frame: &TextureFrame,
    ) -> std::result::Result<DetectionResult, DetectorError> {
        let faces = self
            .faces_for(frame.sequence)
            .into_iter()
            .filter(|face| face.score >= self.min_detection_confidence)
            .collect();
        Ok(DetectionResult::new(frame.timestamp, faces))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;

    use image::DynamicImage;

    use super::*;
    use crate::face_detection::FaceKeypoint;

    fn frame(sequence: u64) -> TextureFrame {
        TextureFrame {
            sequence,
            timestamp: Duration::from_millis(sequence),
            image: Arc::new(DynamicImage::new_rgb8(2, 2)),
        }
    }

    #[test]
    fn recorded_track_cycles_and_filters_by_confidence() {
        let keypoints = [Keypoint::new(0.4, 0.6); NUM_KEY_POINTS];
        let frames = vec![
            vec![FaceDetection::new(0.9, keypoints), FaceDetection::new(0.2, keypoints)],
            vec![],
        ];
        let mut detector = ReplayDetector::from_frames(frames, 0.5);

        let first = detector.process(&frame(0)).unwrap();
        assert_eq!(first.multi_face_detections().len(), 1);
        assert_eq!(first.timestamp(), Duration::from_millis(0));
        assert!(detector.process(&frame(1)).unwrap().is_empty());
        assert_eq!(detector.process(&frame(2)).unwrap().multi_face_detections().len(), 1);
    }

    #[test]
    fn orbit_face_stays_inside_the_frame() {
        let mut detector = ReplayDetector::orbit(0.5);
        for sequence in (0..400).step_by(7) {
            let result = detector.process(&frame(sequence)).unwrap();
            let face = &result.multi_face_detections()[0];
            for keypoint in face.keypoints().unwrap() {
                assert!((0.0..=1.0).contains(&keypoint.x), "x = {}", keypoint.x);
                assert!((0.0..=1.0).contains(&keypoint.y), "y = {}", keypoint.y);
            }
            let right = face.keypoint(FaceKeypoint::RightEye).unwrap();
            let left = face.keypoint(FaceKeypoint::LeftEye).unwrap();
            assert!(right.x < left.x);
        }
    }

    #[test]
    fn replay_file_is_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[[{{"score": 0.9, "location_data": {{"relative_keypoints": [
                {{"x": 0.1, "y": 0.1}}, {{"x": 0.2, "y": 0.1}}, {{"x": 0.15, "y": 0.15}},
                {{"x": 0.15, "y": 0.2}}, {{"x": 0.05, "y": 0.12}}, {{"x": 0.25, "y": 0.12}}
            ]}}}}, {{"score": 0.8}}]]"#
        )
        .unwrap();

        let mut detector = ReplayDetector::from_path(file.path(), 0.5).unwrap();
        let result = detector.process(&frame(0)).unwrap();
        assert_eq!(result.multi_face_detections().len(), 2);
        assert!(!result.multi_face_detections()[1].has_location_data());
    }

    #[test]
    fn malformed_replay_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"not": "frames"}}"#).unwrap();
        assert!(matches!(
            ReplayDetector::from_path(file.path(), 0.5),
            Err(Error::ReplayFormat(_))
        ));

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            ReplayDetector::from_path(&missing, 0.5),
            Err(Error::ReplayIo { .. })
        ));
    }
}

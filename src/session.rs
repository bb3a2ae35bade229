//! Lifecycle of one live detection session: camera -> detector -> overlay.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::bounded;
use serde::{Deserialize, Serialize};

use crate::camera::FrameSource;
use crate::config::CameraConfig;
use crate::error::Result;
use crate::face_detection::FaceDetector;
use crate::pipeline::{spawn_detection_worker, FrameSink, PipelineStats, RenderRequester};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
}

/// Answers whether the camera may be opened.
pub trait PermissionGate {
    fn camera(&self) -> Permission;
}

impl PermissionGate for Permission {
    fn camera(&self) -> Permission {
        *self
    }
}

impl PermissionGate for CameraConfig {
    fn camera(&self) -> Permission {
        self.permission
    }
}

pub struct Session {
    permission: Permission,
    camera: Option<Box<dyn FrameSource>>,
    worker: Option<JoinHandle<()>>,
    stats: Arc<PipelineStats>,
}

impl Session {
    /// Opens the camera and starts detection on its frames.
    ///
    /// The camera and detector are only built once the gate grants access.
    /// Without camera permission the session is created inactive and neither
    /// factory runs; the overlay simply stays empty.
    pub fn resume<C, D>(
        gate: &impl PermissionGate,
        camera: C,
        detector: D,
        requester: RenderRequester,
        frame_queue: usize,
    ) -> Result<Session>
    where
        C: FnOnce() -> Result<Box<dyn FrameSource>>,
        D: FnOnce() -> Result<Box<dyn FaceDetector>>,
    {
        let stats = Arc::clone(requester.stats());
        let permission = gate.camera();
        if permission == Permission::Denied {
            tracing::warn!("camera permission denied, face detection disabled");
            return Ok(Session {
                permission,
                camera: None,
                worker: None,
                stats,
            });
        }

        let detector = detector()?;
        let mut camera = camera()?;

        let (sender, receiver) = bounded(frame_queue.max(1));
        let worker = spawn_detection_worker(detector, receiver, requester)?;

        if let Err(err) = camera.start(FrameSink::new(sender, Arc::clone(&stats))) {
            // the sink is gone, so the worker sees a closed queue and exits
            tracing::error!("failed to start camera: {}", err);
            if worker.join().is_err() {
                tracing::error!("detection worker panicked");
            }
            return Err(err);
        }

        tracing::info!("session resumed");
        Ok(Session {
            permission,
            camera: Some(camera),
            worker: Some(worker),
            stats,
        })
    }

    pub fn is_active(&self) -> bool {
        self.worker.is_some()
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    /// Closes the camera, then waits for the detector to drain and close.
    pub fn pause(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            camera.close();
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("detection worker panicked");
            }
            tracing::info!("session paused");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.pause();
    }
}

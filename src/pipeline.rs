//! Message passing between the capture thread, the detection worker and the
//! render surface.
//!
//! ```text
//! FrameSource --FrameSink--> [frame queue] --> DetectionWorker
//!     --RenderRequester--> [render queue] --> RenderInbox (render thread)
//! ```
//!
//! Both queues are bounded. A full frame queue drops the new frame (the
//! detector is still busy with an older one); a full render queue evicts the
//! oldest pending request so the surface always sees the latest result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::camera::TextureFrame;
use crate::error::Result;
use crate::face_detection::{DetectionResult, FaceDetector};

/// Pipeline counters, updated from any thread.
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub frames_captured: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub results_delivered: AtomicU64,
    pub renders_superseded: AtomicU64,
    pub detector_errors: AtomicU64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            results_delivered: self.results_delivered.load(Ordering::Relaxed),
            renders_superseded: self.renders_superseded.load(Ordering::Relaxed),
            detector_errors: self.detector_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_captured: u64,
    pub frames_dropped: u64,
    pub results_delivered: u64,
    pub renders_superseded: u64,
    pub detector_errors: u64,
}

/// Sending half of the frame queue, handed to a [`crate::camera::FrameSource`].
pub struct FrameSink {
    sender: Sender<TextureFrame>,
    stats: Arc<PipelineStats>,
}

impl FrameSink {
    pub fn new(sender: Sender<TextureFrame>, stats: Arc<PipelineStats>) -> Self {
        Self { sender, stats }
    }

    /// Offers a frame to the detector. Returns `false` once the pipeline has
    /// shut down and the source should stop capturing.
    pub fn push(&self, frame: TextureFrame) -> bool {
        self.stats.frames_captured.fetch_add(1, Ordering::Relaxed);
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                tracing::trace!(sequence = frame.sequence, "detector busy, dropping frame");
                self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// The render data handed to the surface for one detection.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub result: DetectionResult,
    /// The frame the result was computed on, for drawing the input image.
    pub frame: TextureFrame,
}

type Waker = Arc<dyn Fn() + Send + Sync>;

/// Creates the render queue between the detection worker and the surface.
pub fn render_channel(
    capacity: usize,
    stats: Arc<PipelineStats>,
) -> (RenderRequester, RenderInbox) {
    let (sender, receiver) = bounded(capacity.max(1));
    let requester = RenderRequester {
        sender,
        evict: receiver.clone(),
        waker: None,
        stats,
    };
    (requester, RenderInbox { receiver })
}

/// Producer side of the render queue: stores the latest result and schedules
/// a render tick.
#[derive(Clone)]
pub struct RenderRequester {
    sender: Sender<RenderRequest>,
    evict: Receiver<RenderRequest>,
    waker: Option<Waker>,
    stats: Arc<PipelineStats>,
}

impl RenderRequester {
    /// Called after every delivery, typically to ask the UI for a repaint.
    pub fn with_waker(mut self, waker: impl Fn() + Send + Sync + 'static) -> Self {
        self.waker = Some(Arc::new(waker));
        self
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    pub fn request_render(&self, request: RenderRequest) {
        let mut pending = request;
        loop {
            match self.sender.try_send(pending) {
                Ok(()) => break,
                Err(TrySendError::Full(request)) => {
                    if self.evict.try_recv().is_ok() {
                        self.stats.renders_superseded.fetch_add(1, Ordering::Relaxed);
                    }
                    pending = request;
                }
                // unreachable while `evict` keeps the queue open
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
        self.stats.results_delivered.fetch_add(1, Ordering::Relaxed);
        if let Some(waker) = &self.waker {
            waker();
        }
    }
}

/// Consumer side of the render queue, polled from the render thread.
pub struct RenderInbox {
    receiver: Receiver<RenderRequest>,
}

impl RenderInbox {
    /// Drains the queue and returns the newest request, if any arrived.
    pub fn take_latest(&self) -> Option<RenderRequest> {
        self.receiver.try_iter().last()
    }
}

/// Runs `detector` on its own thread until the frame queue disconnects.
pub fn spawn_detection_worker(
    mut detector: Box<dyn FaceDetector>,
    frames: Receiver<TextureFrame>,
    requester: RenderRequester,
) -> Result<thread::JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("face-detection".to_string())
        .spawn(move || {
            for frame in frames.iter() {
                match detector.process(&frame) {
                    Ok(result) => {
                        tracing::trace!(
                            sequence = frame.sequence,
                            faces = result.multi_face_detections().len(),
                            "detection result"
                        );
                        requester.request_render(RenderRequest { result, frame });
                    }
                    Err(err) => {
                        // the overlay keeps its last result for this frame
                        tracing::error!(sequence = frame.sequence, "{}", err);
                        requester
                            .stats()
                            .detector_errors
                            .fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            detector.close();
            tracing::debug!("detection worker stopped");
        })?;
    Ok(handle)
}

// frame sources feeding the detection pipeline
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use image::{DynamicImage, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pipeline::FrameSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    Front,
    Back,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraOptions {
    pub facing: CameraFacing,
    pub width: u32,
    pub height: u32,
    pub fps: f32,
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            facing: CameraFacing::Front,
            width: 640,
            height: 480,
            fps: 30.0,
        }
    }
}

/// A captured frame. The pixels are shared, so cloning a frame is cheap.
#[derive(Debug, Clone)]
pub struct TextureFrame {
    pub sequence: u64,
    /// Capture time relative to the start of the stream.
    pub timestamp: Duration,
    pub image: Arc<DynamicImage>,
}

impl TextureFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

pub trait FrameSource: Send {
    /// Starts pushing frames into `sink` until [`FrameSource::close`] is called
    /// or the sink is disconnected.
    fn start(&mut self, sink: FrameSink) -> Result<()>;

    /// Stops the stream and drops the sink. Calling it twice is harmless.
    fn close(&mut self);
}

/// Stands in for a device camera: emits a fixed test card at the configured
/// resolution and frame rate from its own capture thread.
pub struct SyntheticCamera {
    options: CameraOptions,
    running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl SyntheticCamera {
    pub fn new(options: CameraOptions) -> Self {
        Self {
            options,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    pub fn options(&self) -> &CameraOptions {
        &self.options
    }
}

fn test_card(width: u32, height: u32) -> DynamicImage {
    // dark diagonal gradient, close enough to a dim room for a preview
    let image = RgbImage::from_fn(width, height, |x, y| {
        let shade = ((x + y) * 64 / (width + height).max(1)) as u8;
        Rgb([24 + shade, 28 + shade, 36 + shade])
    });
    DynamicImage::ImageRgb8(image)
}

impl FrameSource for SyntheticCamera {
    fn start(&mut self, sink: FrameSink) -> Result<()> {
        if self.thread.is_some() {
            return Err(Error::Camera("camera stream already started".into()));
        }

        let image = Arc::new(test_card(self.options.width, self.options.height));
        let frame_interval = Duration::from_secs_f32(1.0 / self.options.fps);
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);

        tracing::info!(
            facing = ?self.options.facing,
            width = self.options.width,
            height = self.options.height,
            fps = self.options.fps,
            "opening camera stream"
        );

        let thread = thread::Builder::new()
            .name("camera".to_string())
            .spawn(move || {
                let started = Instant::now();
                let mut sequence = 0;
                while running.load(Ordering::SeqCst) {
                    let frame = TextureFrame {
                        sequence,
                        timestamp: started.elapsed(),
                        image: Arc::clone(&image),
                    };
                    if !sink.push(frame) {
                        tracing::debug!("frame sink disconnected, stopping camera");
                        break;
                    }
                    sequence += 1;
                    thread::sleep(frame_interval);
                }
            })?;

        self.thread = Some(thread);
        Ok(())
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("camera thread panicked");
            }
            tracing::info!("camera stream closed");
        }
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        self.close();
    }
}

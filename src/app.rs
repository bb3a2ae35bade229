use std::sync::{Arc, Mutex};
use std::time::Duration;

use eframe::glow;
use image::DynamicImage;

use crate::camera::{FrameSource, SyntheticCamera};
use crate::config::{Config, DetectorConfig};
use crate::error::Result;
use crate::face_detection::replay::ReplayDetector;
use crate::face_detection::FaceDetector;
use crate::pipeline::{render_channel, PipelineStats, RenderRequester};
use crate::renderer::gl::{detect_glsl, enable_program_point_size};
use crate::renderer::shader::{GlslVersion, ShaderAssets};
use crate::renderer::{keypoint_projection, PointsRenderer};
use crate::session::{Permission, PermissionGate, Session};
use crate::surface::OverlaySurface;
use crate::utils::TimeSeries;

const DETECTION_WINDOW: usize = 90;

type SharedSurface = Arc<Mutex<OverlaySurface<glow::Context>>>;

pub struct FaceDetectionApp {
    config: Config,
    surface: SharedSurface,
    requester: RenderRequester,
    stats: Arc<PipelineStats>,
    session: Option<Session>,
    detections: TimeSeries,
    texture: Option<egui::TextureHandle>,
    last_image: Option<Arc<DynamicImage>>,
    frame_size: [f32; 2],
    status: Option<String>,
}

pub fn build_detector(config: &DetectorConfig) -> Result<Box<dyn FaceDetector>> {
    let detector = match &config.replay_path {
        Some(path) => ReplayDetector::from_path(path, config.min_detection_confidence)?,
        None => ReplayDetector::orbit(config.min_detection_confidence),
    };
    Ok(Box::new(detector))
}

impl FaceDetectionApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: Config) -> Self {
        let stats = Arc::new(PipelineStats::default());
        let (requester, inbox) = render_channel(config.pipeline.render_queue, Arc::clone(&stats));
        let egui_ctx = cc.egui_ctx.clone();
        let requester = requester.with_waker(move || egui_ctx.request_repaint());

        let glsl = match (config.surface.glsl, cc.gl.as_ref()) {
            (Some(glsl), _) => glsl,
            (None, Some(gl)) => detect_glsl(gl),
            (None, None) => GlslVersion::Gl330,
        };
        tracing::info!(
            ?glsl,
            asset_root = %config.surface.asset_root.display(),
            "creating overlay"
        );
        let renderer = PointsRenderer::<glow::Context>::new(
            ShaderAssets::new(&config.surface.asset_root, glsl),
            config.overlay,
        );
        let mut surface = OverlaySurface::new(renderer, inbox);

        let mut status = None;
        match cc.gl.as_ref() {
            _ if config.camera.camera() == Permission::Denied => {
                tracing::warn!("camera permission denied, overlay not created");
            }
            Some(gl) => {
                if let Err(err) = surface.attach(gl) {
                    tracing::error!("overlay disabled: {}", err);
                    status = Some(format!("Overlay disabled: {}", err));
                }
            }
            None => {
                tracing::error!("no glow context available, overlay disabled");
                status = Some("Overlay disabled: no OpenGL context".to_string());
            }
        }

        let mut app = Self {
            frame_size: [config.camera.width as f32, config.camera.height as f32],
            config,
            surface: Arc::new(Mutex::new(surface)),
            requester,
            stats,
            session: None,
            detections: TimeSeries::new(DETECTION_WINDOW),
            texture: None,
            last_image: None,
            status,
        };
        app.resume_session();
        app
    }

    fn is_running(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_active)
    }

    fn resume_session(&mut self) {
        let camera_options = self.config.camera.options();
        let detector_config = &self.config.detector;

        match Session::resume(
            &self.config.camera,
            || -> Result<Box<dyn FrameSource>> {
                Ok(Box::new(SyntheticCamera::new(camera_options)))
            },
            || build_detector(detector_config),
            self.requester.clone(),
            self.config.pipeline.frame_queue,
        ) {
            Ok(session) => self.session = Some(session),
            Err(err) => {
                tracing::error!("failed to resume session: {}", err);
                self.status = Some(err.to_string());
            }
        }
    }

    fn pause_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.pause();
        }
        // the worker is joined, nothing new can arrive
        match self.surface.lock() {
            Ok(mut surface) => surface.clear(),
            Err(_) => tracing::error!("overlay surface lock poisoned while pausing"),
        }
        self.detections.clear();
        self.texture = None;
        self.last_image = None;
    }

    /// Takes the newest render request off the queue and refreshes the preview.
    fn poll_results(&mut self, ctx: &egui::Context) {
        let request = match self.surface.lock() {
            Ok(mut surface) => surface.poll(),
            Err(_) => {
                tracing::error!("overlay surface lock poisoned, skipping results");
                None
            }
        };
        let Some(request) = request else {
            return;
        };

        let face_found = if request.result.is_empty() { 0.0 } else { 1.0 };
        self.detections
            .push(face_found, request.result.timestamp().as_millis());
        self.frame_size = [request.frame.width() as f32, request.frame.height() as f32];

        if self.config.surface.render_input_image {
            self.update_texture(ctx, &request.frame.image);
        }
    }

    fn update_texture(&mut self, ctx: &egui::Context, image: &Arc<DynamicImage>) {
        if self
            .last_image
            .as_ref()
            .is_some_and(|last| Arc::ptr_eq(last, image))
        {
            return;
        }

        let rgba = image.to_rgba8();
        let color_image = egui::ColorImage::from_rgba_unmultiplied(
            [rgba.width() as usize, rgba.height() as usize],
            rgba.as_raw(),
        );
        match &mut self.texture {
            Some(texture) => texture.set(color_image, egui::TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture(
                    "camera-frame",
                    color_image,
                    egui::TextureOptions::LINEAR,
                ));
            }
        }
        self.last_image = Some(Arc::clone(image));
    }

    fn side_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Session");

        let permission = self.config.camera.camera();
        ui.label(format!(
            "Camera permission: {}",
            match permission {
                Permission::Granted => "granted",
                Permission::Denied => "denied",
            }
        ));

        if self.is_running() {
            if ui.button("Pause").clicked() {
                self.pause_session();
            }
        } else if ui.button("Resume").clicked() {
            self.pause_session();
            self.resume_session();
        }

        ui.separator();
        ui.heading("Pipeline");
        let snapshot = self.stats.snapshot();
        ui.add(egui::Label::new(format!("Frames captured: {}", snapshot.frames_captured)));
        ui.add(egui::Label::new(format!("Frames dropped: {}", snapshot.frames_dropped)));
        ui.add(egui::Label::new(format!("Results delivered: {}", snapshot.results_delivered)));
        ui.add(egui::Label::new(format!("Renders superseded: {}", snapshot.renders_superseded)));
        ui.add(egui::Label::new(format!("Detector errors: {}", snapshot.detector_errors)));

        ui.separator();
        ui.heading("Detection");
        let rate = self.detections.rate().unwrap_or(0.0);
        let presence = self.detections.mean().unwrap_or(0.0);
        ui.label(format!("Results/s: {:.1}", rate));
        ui.label(format!("Face present: {:.0}%", presence * 100.0));

        if let Some(status) = &self.status {
            ui.separator();
            ui.colored_label(egui::Color32::LIGHT_RED, status);
        }
    }

    fn central_panel(&mut self, ui: &mut egui::Ui) {
        if self.config.camera.camera() == Permission::Denied {
            ui.label("Camera permission denied.");
            return;
        }

        // fit the frame to the panel width, keeping its aspect ratio
        let [frame_width, frame_height] = self.frame_size;
        let width = ui.available_width();
        let size = egui::vec2(width, width * frame_height / frame_width.max(1.0));
        let mirror = self.config.surface.mirror;

        let rect = match (&self.texture, self.config.surface.render_input_image) {
            (Some(texture), true) => {
                let uv = if mirror {
                    egui::Rect::from_min_max(egui::pos2(1.0, 0.0), egui::pos2(0.0, 1.0))
                } else {
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0))
                };
                ui.add(egui::Image::new(texture, size).uv(uv)).rect
            }
            _ => {
                let (rect, _) = ui.allocate_exact_size(size, egui::Sense::hover());
                ui.painter().rect_filled(rect, 0.0, egui::Color32::BLACK);
                rect
            }
        };

        let surface = Arc::clone(&self.surface);
        let projection = keypoint_projection(mirror);
        let callback = egui::PaintCallback {
            rect,
            callback: Arc::new(egui_glow::CallbackFn::new(move |_info, painter| {
                let gl: &glow::Context = painter.gl();
                enable_program_point_size(gl);
                match surface.lock() {
                    Ok(mut surface) => {
                        if let Err(err) = surface.redraw(gl, &projection) {
                            tracing::error!("overlay draw failed: {}", err);
                        }
                    }
                    Err(_) => tracing::error!("overlay surface lock poisoned"),
                }
            })),
        };
        ui.painter().add(callback);
    }
}

impl eframe::App for FaceDetectionApp {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        self.poll_results(ctx);

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Quit").clicked() {
                        frame.close();
                    }
                });
            });
        });

        egui::SidePanel::left("side_panel").show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| self.side_panel(ui));
        });

        egui::CentralPanel::default().show(ctx, |ui| self.central_panel(ui));

        // keep the counters fresh while no results arrive
        ctx.request_repaint_after(Duration::from_millis(500));
    }

    fn on_exit(&mut self, gl: Option<&glow::Context>) {
        self.pause_session();
        match self.surface.lock() {
            Ok(mut surface) => surface.detach(gl),
            Err(_) => tracing::error!("overlay surface lock poisoned during shutdown"),
        }
    }
}

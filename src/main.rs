use facedetection_live::app::FaceDetectionApp;
use facedetection_live::config::Config;
use facedetection_live::telemetry::{get_subscriber, init_subscriber};
use facedetection_live::{Error, Result};

fn main() -> Result<()> {
    init_subscriber(get_subscriber("info"))?;

    let config = Config::get()?;
    tracing::debug!(?config, "loaded configuration");

    let native_options = eframe::NativeOptions {
        initial_window_size: Some(egui::vec2(config.surface.width, config.surface.height)),
        renderer: eframe::Renderer::Glow,
        ..Default::default()
    };

    let title = config.surface.title.clone();
    eframe::run_native(
        &title,
        native_options,
        Box::new(move |cc| Box::new(FaceDetectionApp::new(cc, config))),
    )
    .map_err(|err| Error::Window(err.to_string()))
}

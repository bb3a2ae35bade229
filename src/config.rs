use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::camera::{CameraFacing, CameraOptions};
use crate::error::{Error, Result};
use crate::renderer::shader::GlslVersion;
use crate::renderer::PointStyle;
use crate::session::Permission;

pub const CONFIG_FILE: &str = "facedetection.json";
pub const CONFIG_PATH_ENV: &str = "FACEDETECTION_CONFIG";
const ENV_PREFIX: &str = "FACEDETECTION";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub surface: SurfaceConfig,
    pub overlay: PointStyle,
    pub camera: CameraConfig,
    pub detector: DetectorConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SurfaceConfig {
    pub title: String,
    pub width: f32,
    pub height: f32,
    /// Directory the `shaders/` assets are resolved against.
    pub asset_root: PathBuf,
    /// Forces a shader dialect instead of asking the context.
    pub glsl: Option<GlslVersion>,
    /// Flip the preview and overlay horizontally (selfie view).
    pub mirror: bool,
    pub render_input_image: bool,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            title: "Face Detection Live".to_string(),
            width: 960.,
            height: 720.,
            asset_root: PathBuf::from("assets"),
            glsl: None,
            mirror: true,
            render_input_image: true,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    pub facing: CameraFacing,
    pub width: u32,
    pub height: u32,
    pub fps: f32,
    /// Outcome of the camera permission check on hosts without a runtime prompt.
    pub permission: Permission,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            facing: CameraFacing::Front,
            width: 640,
            height: 480,
            fps: 30.,
            permission: Permission::Granted,
        }
    }
}

impl CameraConfig {
    pub fn options(&self) -> CameraOptions {
        CameraOptions {
            facing: self.facing,
            width: self.width,
            height: self.height,
            fps: self.fps,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    /// Recorded detections to replay; the built-in track is used when unset.
    pub replay_path: Option<PathBuf>,
    pub min_detection_confidence: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            replay_path: None,
            min_detection_confidence: 0.5,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub frame_queue: usize,
    pub render_queue: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_queue: 1,
            render_queue: 2,
        }
    }
}

impl Config {
    /// Loads the configuration from `$FACEDETECTION_CONFIG` (or `./facedetection.json`
    /// when unset) layered with `FACEDETECTION__SECTION__KEY` environment variables.
    /// A missing file is not an error.
    pub fn get() -> Result<Config> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
        Self::load(&path)
    }

    pub fn load(path: &Path) -> Result<Config> {
        let config = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?)
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Config>()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.surface.width <= 0. || self.surface.height <= 0. {
            return Err(Error::InvalidConfig(
                "surface width and height must be positive".into(),
            ));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(Error::InvalidConfig(
                "camera width and height must be non-zero".into(),
            ));
        }
        if !(self.camera.fps > 0.) {
            return Err(Error::InvalidConfig("camera fps must be positive".into()));
        }
        if self.pipeline.frame_queue == 0 || self.pipeline.render_queue == 0 {
            return Err(Error::InvalidConfig(
                "pipeline queue capacities must be non-zero".into(),
            ));
        }
        if !(self.overlay.point_size > 0.) {
            return Err(Error::InvalidConfig("point size must be positive".into()));
        }
        if self.overlay.color.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(Error::InvalidConfig(
                "overlay color components must lie in [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.detector.min_detection_confidence) {
            return Err(Error::InvalidConfig(
                "min detection confidence must lie in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.overlay.point_size, 16.0);
        assert_eq!(config.overlay.color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(config.camera.facing, CameraFacing::Front);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert_eq!(config.surface.asset_root, PathBuf::from("assets"));
    }

    #[test]
    fn file_overrides_selected_keys() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{
                "camera": {{ "facing": "back", "fps": 15.0, "permission": "denied" }},
                "overlay": {{ "point_size": 8.0 }},
                "surface": {{ "glsl": "gles300" }}
            }}"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.camera.facing, CameraFacing::Back);
        assert_eq!(config.camera.fps, 15.0);
        assert_eq!(config.camera.permission, Permission::Denied);
        // untouched keys keep their defaults
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.overlay.point_size, 8.0);
        assert_eq!(config.overlay.color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(config.surface.glsl, Some(GlslVersion::Gles300));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = Config::default();
        config.pipeline.render_queue = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.overlay.color = [1.5, 0.0, 0.0, 1.0];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.camera.fps = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.detector.min_detection_confidence = 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_file_is_reported() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{ "pipeline": {{ "frame_queue": 0 }} }}"#).unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(Error::InvalidConfig(_))
        ));
    }
}

use std::path::PathBuf;

use thiserror::Error;

use crate::renderer::shader::ShaderStage;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read shader asset {path}: {source}")]
    ShaderAsset {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error compiling {stage} shader: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    #[error("error linking shader program: {0}")]
    ProgramLink(String),

    #[error("shader program has no active {kind} `{name}`")]
    MissingHandle {
        kind: &'static str,
        name: &'static str,
    },

    #[error("GPU resource allocation failed: {0}")]
    GpuResource(String),

    #[error("render called before setup_rendering")]
    RendererNotReady,

    #[error("failed to read detection replay {path}: {source}")]
    ReplayIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed detection replay: {0}")]
    ReplayFormat(#[from] serde_json::Error),

    #[error("camera error: {0}")]
    Camera(String),

    #[error("window error: {0}")]
    Window(String),

    #[error("failed to install tracing subscriber: {0}")]
    Telemetry(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod app;
pub mod camera;
pub mod config;
pub mod error;
pub mod face_detection;
pub mod pipeline;
pub mod renderer;
pub mod session;
pub mod surface;
pub mod telemetry;
pub mod utils;

pub use error::{Error, Result};

//! Keypoint overlay: draws every detected face's keypoints as point sprites.

pub mod gl;
pub mod recording;
pub mod shader;

use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::face_detection::{DetectionResult, KeypointSet, NUM_KEY_POINTS};

use self::gl::PointsGl;
use self::shader::{ShaderAssets, ShaderProgram};

/// Two floats (x, y) per keypoint.
pub const FACE_VERTEX_COUNT: usize = NUM_KEY_POINTS * 2;

/// Uniform values uploaded on every render pass.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct PointStyle {
    pub point_size: f32,
    pub color: [f32; 4],
}

impl Default for PointStyle {
    fn default() -> Self {
        Self {
            point_size: 16.0,
            color: [1.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Draws detection results on a GL context owned by the caller.
pub trait ResultGlRenderer<G: PointsGl> {
    /// Builds the GPU state. Must run on the render thread with `gl` current.
    fn setup_rendering(&mut self, gl: &G) -> Result<()>;

    /// Draws `result`; `None` draws nothing.
    fn render_result(
        &mut self,
        gl: &G,
        result: Option<&DetectionResult>,
        projection: &Matrix4<f32>,
    ) -> Result<()>;

    /// Deletes the GPU state while the context is still alive.
    fn release(&mut self, gl: &G);

    /// Forgets the GPU state after the context was lost.
    fn invalidate(&mut self);
}

/// Interleaves a face's keypoints as `[x0, y0, x1, y1, ...]` in index order.
pub fn face_vertices(keypoints: &KeypointSet) -> [f32; FACE_VERTEX_COUNT] {
    let mut points = [0.0; FACE_VERTEX_COUNT];
    for (i, keypoint) in keypoints.iter().enumerate() {
        points[2 * i] = keypoint.x;
        points[2 * i + 1] = keypoint.y;
    }
    points
}

/// Maps normalized keypoint space (origin top-left, y down) onto clip space.
/// `mirror` flips x for front camera previews.
pub fn keypoint_projection(mirror: bool) -> Matrix4<f32> {
    let (left, right) = if mirror { (1.0, 0.0) } else { (0.0, 1.0) };
    Matrix4::new_orthographic(left, right, 1.0, 0.0, -1.0, 1.0)
}

struct GpuResources<G: PointsGl> {
    program: ShaderProgram<G>,
    vertex_buffer: G::Buffer,
    // absent on GLES 2, where client state lives on the context
    vertex_array: Option<G::VertexArray>,
}

enum RendererState<G: PointsGl> {
    Uninitialized,
    Ready(GpuResources<G>),
}

pub struct PointsRenderer<G: PointsGl> {
    assets: ShaderAssets,
    style: PointStyle,
    state: RendererState<G>,
}

impl<G: PointsGl> PointsRenderer<G> {
    pub fn new(assets: ShaderAssets, style: PointStyle) -> Self {
        Self {
            assets,
            style,
            state: RendererState::Uninitialized,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, RendererState::Ready(_))
    }

    pub fn style(&self) -> &PointStyle {
        &self.style
    }

    fn create_resources(&self, gl: &G) -> Result<GpuResources<G>> {
        let program = ShaderProgram::build(gl, &self.assets)?;

        let vertex_buffer = match gl.create_buffer() {
            Ok(buffer) => buffer,
            Err(err) => {
                program.delete(gl);
                return Err(Error::GpuResource(err));
            }
        };

        let vertex_array = match gl.create_vertex_array() {
            Ok(vertex_array) => Some(vertex_array),
            Err(err) => {
                tracing::debug!("drawing without a vertex array object: {}", err);
                None
            }
        };

        Ok(GpuResources {
            program,
            vertex_buffer,
            vertex_array,
        })
    }
}

impl<G: PointsGl> ResultGlRenderer<G> for PointsRenderer<G> {
    fn setup_rendering(&mut self, gl: &G) -> Result<()> {
        if self.is_ready() {
            tracing::debug!("point renderer already set up, keeping existing program");
            return Ok(());
        }

        let resources = self.create_resources(gl).map_err(|err| {
            tracing::error!("point renderer setup failed: {}", err);
            err
        })?;
        gl.use_program(None);

        tracing::info!(
            program = ?resources.program.program,
            vertex_array = resources.vertex_array.is_some(),
            "point renderer ready"
        );
        self.state = RendererState::Ready(resources);
        Ok(())
    }

    fn render_result(
        &mut self,
        gl: &G,
        result: Option<&DetectionResult>,
        projection: &Matrix4<f32>,
    ) -> Result<()> {
        let Some(result) = result else {
            return Ok(());
        };
        let RendererState::Ready(resources) = &self.state else {
            return Err(Error::RendererNotReady);
        };
        let program = &resources.program;

        let mut matrix = [0.0; 16];
        matrix.copy_from_slice(projection.as_slice());

        gl.use_program(Some(program.program));
        if resources.vertex_array.is_some() {
            gl.bind_vertex_array(resources.vertex_array);
        }
        gl.uniform_matrix4(&program.u_projection_matrix, &matrix);
        gl.uniform_1f(&program.u_point_size, self.style.point_size);
        gl.uniform_4f(&program.u_color, self.style.color);

        for face in result.multi_face_detections() {
            let Some(keypoints) = face.keypoints() else {
                continue;
            };

            let points = face_vertices(keypoints);
            gl.upload_vertices(resources.vertex_buffer, bytemuck::cast_slice(&points[..]));
            gl.enable_vertex_attrib(program.a_position);
            gl.vertex_attrib_f32(program.a_position, 2);
            gl.draw_points(0, NUM_KEY_POINTS as i32);
            gl.disable_vertex_attrib(program.a_position);
        }

        if resources.vertex_array.is_some() {
            gl.bind_vertex_array(None);
        }
        gl.use_program(None);
        Ok(())
    }

    fn release(&mut self, gl: &G) {
        if let RendererState::Ready(resources) =
            std::mem::replace(&mut self.state, RendererState::Uninitialized)
        {
            if let Some(vertex_array) = resources.vertex_array {
                gl.delete_vertex_array(vertex_array);
            }
            gl.delete_buffer(resources.vertex_buffer);
            resources.program.delete(gl);
            tracing::info!("point renderer released");
        }
    }

    fn invalidate(&mut self) {
        if self.is_ready() {
            tracing::info!("rendering context lost, dropping point renderer handles");
        }
        self.state = RendererState::Uninitialized;
    }
}

//! A headless [`PointsGl`] backend that records every call instead of
//! talking to a driver.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;

use crate::renderer::gl::PointsGl;
use crate::renderer::shader::{ShaderStage, A_POSITION, U_COLOR, U_POINT_SIZE, U_PROJECTION_MATRIX};

#[derive(Debug, Clone, PartialEq)]
pub enum GlCall {
    CreateShader { stage: ShaderStage, shader: u32 },
    CompileShader { shader: u32 },
    DeleteShader(u32),
    CreateProgram(u32),
    LinkProgram { program: u32, shaders: Vec<u32> },
    DetachShader { program: u32, shader: u32 },
    DeleteProgram(u32),
    UseProgram(Option<u32>),
    UniformMatrix4 { location: u32, value: [f32; 16] },
    Uniform1f { location: u32, value: f32 },
    Uniform4f { location: u32, value: [f32; 4] },
    CreateBuffer(u32),
    DeleteBuffer(u32),
    CreateVertexArray(u32),
    DeleteVertexArray(u32),
    BindVertexArray(Option<u32>),
    UploadVertices { buffer: u32, vertices: Vec<f32> },
    EnableVertexAttrib(u32),
    VertexAttribF32 { index: u32, components: i32 },
    DrawPoints { first: i32, count: i32 },
    DisableVertexAttrib(u32),
}

/// Recording context. Shaders compile when their source defines `main`,
/// unless a failure is injected with the builder methods.
#[derive(Debug)]
pub struct RecordingGl {
    calls: RefCell<Vec<GlCall>>,
    next_handle: Cell<u32>,
    live: RefCell<HashSet<u32>>,
    failing_stage: Option<ShaderStage>,
    failing_link: bool,
    missing_handles: Vec<&'static str>,
    vertex_arrays: bool,
    current_program: Cell<Option<u32>>,
}

impl Default for RecordingGl {
    fn default() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            next_handle: Cell::new(1),
            live: RefCell::new(HashSet::new()),
            failing_stage: None,
            failing_link: false,
            missing_handles: Vec::new(),
            vertex_arrays: true,
            current_program: Cell::new(None),
        }
    }
}

impl RecordingGl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_compile(mut self, stage: ShaderStage) -> Self {
        self.failing_stage = Some(stage);
        self
    }

    pub fn failing_link(mut self) -> Self {
        self.failing_link = true;
        self
    }

    /// Makes the linked program report `name` as inactive.
    pub fn without_handle(mut self, name: &'static str) -> Self {
        self.missing_handles.push(name);
        self
    }

    /// Behaves like a GLES 2 context without vertex array objects.
    pub fn without_vertex_arrays(mut self) -> Self {
        self.vertex_arrays = false;
        self
    }

    pub fn calls(&self) -> Vec<GlCall> {
        self.calls.borrow().clone()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Vertex counts of every point draw, in issue order.
    pub fn draw_calls(&self) -> Vec<i32> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                GlCall::DrawPoints { count, .. } => Some(*count),
                _ => None,
            })
            .collect()
    }

    pub fn uploaded_vertices(&self) -> Vec<Vec<f32>> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                GlCall::UploadVertices { vertices, .. } => Some(vertices.clone()),
                _ => None,
            })
            .collect()
    }

    /// The program left bound by the last `use_program`.
    pub fn current_program(&self) -> Option<u32> {
        self.current_program.get()
    }

    /// Number of shaders, programs, buffers and vertex arrays not yet deleted.
    pub fn live_objects(&self) -> usize {
        self.live.borrow().len()
    }

    fn record(&self, call: GlCall) {
        self.calls.borrow_mut().push(call);
    }

    fn allocate(&self) -> u32 {
        let handle = self.next_handle.get();
        self.next_handle.set(handle + 1);
        self.live.borrow_mut().insert(handle);
        handle
    }

    fn release(&self, handle: u32) {
        self.live.borrow_mut().remove(&handle);
    }

    fn is_missing(&self, name: &str) -> bool {
        self.missing_handles.iter().any(|missing| *missing == name)
    }

    fn stage_of(&self, shader: u32) -> Option<ShaderStage> {
        self.calls.borrow().iter().find_map(|call| match call {
            GlCall::CreateShader { stage, shader: created } if *created == shader => Some(*stage),
            _ => None,
        })
    }
}

impl PointsGl for RecordingGl {
    type Shader = u32;
    type Program = u32;
    type UniformLocation = u32;
    type Buffer = u32;
    type VertexArray = u32;

    fn create_shader(&self, stage: ShaderStage) -> Result<u32, String> {
        let shader = self.allocate();
        self.record(GlCall::CreateShader { stage, shader });
        Ok(shader)
    }

    fn compile_shader(&self, shader: u32, source: &str) -> Result<(), String> {
        self.record(GlCall::CompileShader { shader });
        if self.failing_stage.is_some() && self.failing_stage == self.stage_of(shader) {
            return Err("ERROR: 0:1: injected compile failure".to_string());
        }
        if !source.contains("void main") {
            return Err("ERROR: 0:1: 'main' : function not defined".to_string());
        }
        Ok(())
    }

    fn delete_shader(&self, shader: u32) {
        self.release(shader);
        self.record(GlCall::DeleteShader(shader));
    }

    fn create_program(&self) -> Result<u32, String> {
        let program = self.allocate();
        self.record(GlCall::CreateProgram(program));
        Ok(program)
    }

    fn link_program(&self, program: u32, shaders: &[u32]) -> Result<(), String> {
        self.record(GlCall::LinkProgram {
            program,
            shaders: shaders.to_vec(),
        });
        if self.failing_link {
            return Err("error: injected link failure".to_string());
        }
        Ok(())
    }

    fn detach_shader(&self, program: u32, shader: u32) {
        self.record(GlCall::DetachShader { program, shader });
    }

    fn delete_program(&self, program: u32) {
        self.release(program);
        self.record(GlCall::DeleteProgram(program));
    }

    fn use_program(&self, program: Option<u32>) {
        self.current_program.set(program);
        self.record(GlCall::UseProgram(program));
    }

    fn uniform_location(&self, _program: u32, name: &str) -> Option<u32> {
        if self.is_missing(name) {
            return None;
        }
        [U_POINT_SIZE, U_PROJECTION_MATRIX, U_COLOR]
            .iter()
            .position(|uniform| *uniform == name)
            .map(|index| index as u32)
    }

    fn attrib_location(&self, _program: u32, name: &str) -> Option<u32> {
        (name == A_POSITION && !self.is_missing(name)).then_some(0)
    }

    fn uniform_matrix4(&self, location: &u32, matrix: &[f32; 16]) {
        self.record(GlCall::UniformMatrix4 {
            location: *location,
            value: *matrix,
        });
    }

    fn uniform_1f(&self, location: &u32, value: f32) {
        self.record(GlCall::Uniform1f {
            location: *location,
            value,
        });
    }

    fn uniform_4f(&self, location: &u32, value: [f32; 4]) {
        self.record(GlCall::Uniform4f {
            location: *location,
            value,
        });
    }

    fn create_buffer(&self) -> Result<u32, String> {
        let buffer = self.allocate();
        self.record(GlCall::CreateBuffer(buffer));
        Ok(buffer)
    }

    fn delete_buffer(&self, buffer: u32) {
        self.release(buffer);
        self.record(GlCall::DeleteBuffer(buffer));
    }

    fn create_vertex_array(&self) -> Result<u32, String> {
        if !self.vertex_arrays {
            return Err("vertex array objects are not supported by this context".to_string());
        }
        let vertex_array = self.allocate();
        self.record(GlCall::CreateVertexArray(vertex_array));
        Ok(vertex_array)
    }

    fn delete_vertex_array(&self, vertex_array: u32) {
        self.release(vertex_array);
        self.record(GlCall::DeleteVertexArray(vertex_array));
    }

    fn bind_vertex_array(&self, vertex_array: Option<u32>) {
        self.record(GlCall::BindVertexArray(vertex_array));
    }

    fn upload_vertices(&self, buffer: u32, data: &[u8]) {
        let vertices = data
            .chunks_exact(4)
            .map(|bytes| f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            .collect();
        self.record(GlCall::UploadVertices { buffer, vertices });
    }

    fn enable_vertex_attrib(&self, index: u32) {
        self.record(GlCall::EnableVertexAttrib(index));
    }

    fn vertex_attrib_f32(&self, index: u32, components: i32) {
        self.record(GlCall::VertexAttribF32 { index, components });
    }

    fn draw_points(&self, first: i32, count: i32) {
        self.record(GlCall::DrawPoints { first, count });
    }

    fn disable_vertex_attrib(&self, index: u32) {
        self.record(GlCall::DisableVertexAttrib(index));
    }
}

use std::fmt::Debug;

use glow::HasContext;

use crate::renderer::shader::{GlslVersion, ShaderStage};

/// The GL entry points the point renderer needs.
///
/// Every call must happen on the thread that owns the current context; the
/// surface host is responsible for that.
pub trait PointsGl {
    type Shader: Copy + Debug;
    type Program: Copy + Debug;
    type UniformLocation: Debug;
    type Buffer: Copy + Debug;
    type VertexArray: Copy + Debug;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String>;
    /// Uploads `source` and compiles it; the error carries the info log.
    fn compile_shader(&self, shader: Self::Shader, source: &str) -> Result<(), String>;
    fn delete_shader(&self, shader: Self::Shader);

    fn create_program(&self) -> Result<Self::Program, String>;
    /// Attaches `shaders` and links; the error carries the info log.
    fn link_program(&self, program: Self::Program, shaders: &[Self::Shader]) -> Result<(), String>;
    fn detach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn delete_program(&self, program: Self::Program);
    fn use_program(&self, program: Option<Self::Program>);

    fn uniform_location(&self, program: Self::Program, name: &str) -> Option<Self::UniformLocation>;
    fn attrib_location(&self, program: Self::Program, name: &str) -> Option<u32>;
    fn uniform_matrix4(&self, location: &Self::UniformLocation, matrix: &[f32; 16]);
    fn uniform_1f(&self, location: &Self::UniformLocation, value: f32);
    fn uniform_4f(&self, location: &Self::UniformLocation, value: [f32; 4]);

    fn create_buffer(&self) -> Result<Self::Buffer, String>;
    fn delete_buffer(&self, buffer: Self::Buffer);
    /// Fails on contexts without vertex array objects (GLES 2).
    fn create_vertex_array(&self) -> Result<Self::VertexArray, String>;
    fn delete_vertex_array(&self, vertex_array: Self::VertexArray);
    fn bind_vertex_array(&self, vertex_array: Option<Self::VertexArray>);

    /// Replaces the contents of `buffer` and leaves it bound as the array buffer.
    fn upload_vertices(&self, buffer: Self::Buffer, data: &[u8]);
    fn enable_vertex_attrib(&self, index: u32);
    /// Sources attribute `index` from tightly packed f32 tuples in the bound array buffer.
    fn vertex_attrib_f32(&self, index: u32, components: i32);
    fn draw_points(&self, first: i32, count: i32);
    fn disable_vertex_attrib(&self, index: u32);
}

/// Picks the shader dialect matching the live context.
pub fn detect_glsl(gl: &glow::Context) -> GlslVersion {
    let version = gl.version();
    glsl_for_version(version.is_embedded, version.major, version.minor)
}

/// GL 3.2 contexts are core-only and reject `#version 120`, so they get 150.
pub fn glsl_for_version(is_embedded: bool, major: u32, minor: u32) -> GlslVersion {
    match (is_embedded, major, minor) {
        (true, major, _) if major >= 3 => GlslVersion::Gles300,
        (true, _, _) => GlslVersion::Gles100,
        (false, major, minor) if (major, minor) >= (3, 3) => GlslVersion::Gl330,
        (false, major, minor) if (major, minor) >= (3, 2) => GlslVersion::Gl150,
        (false, _, _) => GlslVersion::Gl120,
    }
}

// The glow methods are unsafe because they require a current context on the
// calling thread, which every caller of `PointsGl` already guarantees.
impl PointsGl for glow::Context {
    type Shader = glow::Shader;
    type Program = glow::Program;
    type UniformLocation = glow::UniformLocation;
    type Buffer = glow::Buffer;
    type VertexArray = glow::VertexArray;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String> {
        let shader_type = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe { HasContext::create_shader(self, shader_type) }
    }

    fn compile_shader(&self, shader: Self::Shader, source: &str) -> Result<(), String> {
        unsafe {
            HasContext::shader_source(self, shader, source);
            HasContext::compile_shader(self, shader);
            if HasContext::get_shader_compile_status(self, shader) {
                Ok(())
            } else {
                Err(HasContext::get_shader_info_log(self, shader))
            }
        }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        unsafe { HasContext::delete_shader(self, shader) }
    }

    fn create_program(&self) -> Result<Self::Program, String> {
        unsafe { HasContext::create_program(self) }
    }

    fn link_program(&self, program: Self::Program, shaders: &[Self::Shader]) -> Result<(), String> {
        unsafe {
            for &shader in shaders {
                HasContext::attach_shader(self, program, shader);
            }
            HasContext::link_program(self, program);
            if HasContext::get_program_link_status(self, program) {
                Ok(())
            } else {
                Err(HasContext::get_program_info_log(self, program))
            }
        }
    }

    fn detach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { HasContext::detach_shader(self, program, shader) }
    }

    fn delete_program(&self, program: Self::Program) {
        unsafe { HasContext::delete_program(self, program) }
    }

    fn use_program(&self, program: Option<Self::Program>) {
        unsafe { HasContext::use_program(self, program) }
    }

    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        unsafe { HasContext::get_uniform_location(self, program, name) }
    }

    fn attrib_location(&self, program: Self::Program, name: &str) -> Option<u32> {
        unsafe { HasContext::get_attrib_location(self, program, name) }
    }

    fn uniform_matrix4(&self, location: &Self::UniformLocation, matrix: &[f32; 16]) {
        unsafe { HasContext::uniform_matrix_4_f32_slice(self, Some(location), false, matrix) }
    }

    fn uniform_1f(&self, location: &Self::UniformLocation, value: f32) {
        unsafe { HasContext::uniform_1_f32(self, Some(location), value) }
    }

    fn uniform_4f(&self, location: &Self::UniformLocation, value: [f32; 4]) {
        let [x, y, z, w] = value;
        unsafe { HasContext::uniform_4_f32(self, Some(location), x, y, z, w) }
    }

    fn create_buffer(&self) -> Result<Self::Buffer, String> {
        unsafe { HasContext::create_buffer(self) }
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        unsafe { HasContext::delete_buffer(self, buffer) }
    }

    fn create_vertex_array(&self) -> Result<Self::VertexArray, String> {
        if !supports_vertex_arrays(self) {
            return Err("vertex array objects are not supported by this context".to_string());
        }
        unsafe { HasContext::create_vertex_array(self) }
    }

    fn delete_vertex_array(&self, vertex_array: Self::VertexArray) {
        unsafe { HasContext::delete_vertex_array(self, vertex_array) }
    }

    fn bind_vertex_array(&self, vertex_array: Option<Self::VertexArray>) {
        unsafe { HasContext::bind_vertex_array(self, vertex_array) }
    }

    fn upload_vertices(&self, buffer: Self::Buffer, data: &[u8]) {
        unsafe {
            HasContext::bind_buffer(self, glow::ARRAY_BUFFER, Some(buffer));
            HasContext::buffer_data_u8_slice(self, glow::ARRAY_BUFFER, data, glow::STREAM_DRAW);
        }
    }

    fn enable_vertex_attrib(&self, index: u32) {
        unsafe { HasContext::enable_vertex_attrib_array(self, index) }
    }

    fn vertex_attrib_f32(&self, index: u32, components: i32) {
        unsafe {
            HasContext::vertex_attrib_pointer_f32(
                self,
                index,
                components,
                glow::FLOAT,
                false,
                0,
                0,
            )
        }
    }

    fn draw_points(&self, first: i32, count: i32) {
        unsafe { HasContext::draw_arrays(self, glow::POINTS, first, count) }
    }

    fn disable_vertex_attrib(&self, index: u32) {
        unsafe { HasContext::disable_vertex_attrib_array(self, index) }
    }
}

/// Lets the vertex shader's `gl_PointSize` take effect. Desktop GL ignores it
/// otherwise; GLES always honors it.
pub fn enable_program_point_size(gl: &glow::Context) {
    if !gl.version().is_embedded {
        unsafe { gl.enable(glow::PROGRAM_POINT_SIZE) }
    }
}

fn supports_vertex_arrays(gl: &glow::Context) -> bool {
    let extension = if gl.version().is_embedded {
        "GL_OES_vertex_array_object"
    } else {
        "GL_ARB_vertex_array_object"
    };
    gl.version().major >= 3 || gl.supported_extensions().contains(extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_versions_map_to_shader_dialects() {
        assert_eq!(glsl_for_version(true, 2, 0), GlslVersion::Gles100);
        assert_eq!(glsl_for_version(true, 3, 0), GlslVersion::Gles300);
        assert_eq!(glsl_for_version(true, 3, 2), GlslVersion::Gles300);
        assert_eq!(glsl_for_version(false, 2, 1), GlslVersion::Gl120);
        assert_eq!(glsl_for_version(false, 3, 1), GlslVersion::Gl120);
        assert_eq!(glsl_for_version(false, 3, 2), GlslVersion::Gl150);
        assert_eq!(glsl_for_version(false, 3, 3), GlslVersion::Gl330);
        assert_eq!(glsl_for_version(false, 4, 6), GlslVersion::Gl330);
    }
}

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::renderer::gl::PointsGl;

pub const VERTEX_SHADER_ASSET: &str = "shaders/points.vert";
pub const FRAGMENT_SHADER_ASSET: &str = "shaders/points.frag";

pub const U_POINT_SIZE: &str = "u_PointSize";
pub const A_POSITION: &str = "a_Position";
pub const U_PROJECTION_MATRIX: &str = "u_ProjectionMatrix";
pub const U_COLOR: &str = "u_Color";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// Shader dialect of the rendering context. The asset sources carry no
/// `#version` line; the matching header is prepended at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlslVersion {
    Gles100,
    Gles300,
    Gl120,
    Gl150,
    Gl330,
}

impl GlslVersion {
    pub fn header(self) -> &'static str {
        match self {
            GlslVersion::Gles100 => "#version 100\nprecision mediump float;\n",
            GlslVersion::Gles300 => {
                "#version 300 es\nprecision mediump float;\n#define NEW_SHADER_INTERFACE\n"
            }
            GlslVersion::Gl120 => "#version 120\n",
            GlslVersion::Gl150 => "#version 150\n#define NEW_SHADER_INTERFACE\n",
            GlslVersion::Gl330 => "#version 330 core\n#define NEW_SHADER_INTERFACE\n",
        }
    }
}

/// Where the point shaders live and which dialect to compile them as.
#[derive(Debug, Clone)]
pub struct ShaderAssets {
    root: PathBuf,
    glsl: GlslVersion,
}

impl ShaderAssets {
    pub fn new(root: impl Into<PathBuf>, glsl: GlslVersion) -> Self {
        Self {
            root: root.into(),
            glsl,
        }
    }

    pub fn path(&self, stage: ShaderStage) -> PathBuf {
        match stage {
            ShaderStage::Vertex => self.root.join(VERTEX_SHADER_ASSET),
            ShaderStage::Fragment => self.root.join(FRAGMENT_SHADER_ASSET),
        }
    }

    /// Reads the stage's source and prefixes the version header.
    pub fn load(&self, stage: ShaderStage) -> Result<String> {
        let code = load_shader_source(&self.path(stage))?;
        Ok(format!("{}{}", self.glsl.header(), code))
    }
}

pub fn load_shader_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::ShaderAsset {
        path: path.to_path_buf(),
        source,
    })
}

/// Compiles one stage. On failure the shader object is deleted before the
/// error is returned.
pub fn compile_shader<G: PointsGl>(gl: &G, stage: ShaderStage, source: &str) -> Result<G::Shader> {
    let shader = gl.create_shader(stage).map_err(Error::GpuResource)?;
    if let Err(log) = gl.compile_shader(shader, source) {
        tracing::error!(%stage, "Error compiling shader: {}", log);
        gl.delete_shader(shader);
        return Err(Error::ShaderCompile { stage, log });
    }
    Ok(shader)
}

/// A linked point program and the locations of its inputs.
#[derive(Debug)]
pub struct ShaderProgram<G: PointsGl> {
    pub program: G::Program,
    pub u_point_size: G::UniformLocation,
    pub a_position: u32,
    pub u_projection_matrix: G::UniformLocation,
    pub u_color: G::UniformLocation,
}

impl<G: PointsGl> ShaderProgram<G> {
    /// Loads, compiles and links both stages and resolves every handle.
    /// Every GL object created along the way is released if a step fails.
    pub fn build(gl: &G, assets: &ShaderAssets) -> Result<Self> {
        let vertex_source = assets.load(ShaderStage::Vertex)?;
        let fragment_source = assets.load(ShaderStage::Fragment)?;

        let vs = compile_shader(gl, ShaderStage::Vertex, &vertex_source)?;
        let fs = match compile_shader(gl, ShaderStage::Fragment, &fragment_source) {
            Ok(fs) => fs,
            Err(err) => {
                gl.delete_shader(vs);
                return Err(err);
            }
        };

        let linked = link_program(gl, &[vs, fs]);
        // the program keeps what it needs once linked
        gl.delete_shader(vs);
        gl.delete_shader(fs);
        let program = linked?;

        match Self::resolve(gl, program) {
            Ok(shader_program) => Ok(shader_program),
            Err(err) => {
                gl.delete_program(program);
                Err(err)
            }
        }
    }

    fn resolve(gl: &G, program: G::Program) -> Result<Self> {
        let uniform = |name: &'static str| {
            gl.uniform_location(program, name)
                .ok_or(Error::MissingHandle {
                    kind: "uniform",
                    name,
                })
        };

        Ok(Self {
            program,
            u_point_size: uniform(U_POINT_SIZE)?,
            a_position: gl
                .attrib_location(program, A_POSITION)
                .ok_or(Error::MissingHandle {
                    kind: "attribute",
                    name: A_POSITION,
                })?,
            u_projection_matrix: uniform(U_PROJECTION_MATRIX)?,
            u_color: uniform(U_COLOR)?,
        })
    }

    pub fn delete(self, gl: &G) {
        gl.delete_program(self.program);
    }
}

fn link_program<G: PointsGl>(gl: &G, shaders: &[G::Shader]) -> Result<G::Program> {
    let program = gl.create_program().map_err(Error::GpuResource)?;
    let linked = gl.link_program(program, shaders);
    for &shader in shaders {
        gl.detach_shader(program, shader);
    }
    if let Err(log) = linked {
        tracing::error!("Error linking program: {}", log);
        gl.delete_program(program);
        return Err(Error::ProgramLink(log));
    }
    Ok(program)
}

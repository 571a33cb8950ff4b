//! Shader program builder.
//!
//! Compiles the shared vertex stage and a wrapped effect fragment, links
//! them, and resolves the attribute and uniform locations the frame driver
//! needs. Intermediate shaders are released on every path, and a failed
//! build leaves nothing allocated on the device.

use thiserror::Error;
use tracing::error;

use crate::compile::{numbered_source, ShaderStage};
use crate::gpu::{GraphicsDevice, ProgramId, ShaderId, UniformLocation, UniformValue};
use crate::palette::Palette;
use crate::surface::SurfaceSize;

/// Vertex attribute carrying quad corners.
pub const POSITION_ATTRIBUTE: &str = "a_position";

/// Why a program could not be built.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{stage} shader failed to compile: {log}")]
    Compile {
        stage: ShaderStage,
        log: String,
        shader_source: String,
    },
    #[error("program failed to link: {log}")]
    Link { log: String },
    #[error("vertex shader has no `a_position` attribute")]
    MissingPositionAttribute,
}

impl BuildError {
    /// Logs the failure, including the numbered source for compile errors.
    pub fn report(&self, effect: &str) {
        match self {
            BuildError::Compile {
                stage,
                log,
                shader_source,
            } => error!(
                %effect,
                %stage,
                "shader compile failed:\n{log}\n--- source ---\n{}",
                numbered_source(shader_source)
            ),
            BuildError::Link { log } => error!(%effect, "program link failed:\n{log}"),
            BuildError::MissingPositionAttribute => error!(%effect, "{self}"),
        }
    }
}

/// Uniform slots of a linked program. Uniforms the shader optimised away stay
/// `None`, and writes to them are skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UniformLocations {
    pub time: Option<UniformLocation>,
    pub resolution: Option<UniformLocation>,
    pub colors: [Option<UniformLocation>; Palette::SLOTS],
}

impl UniformLocations {
    fn resolve<D: GraphicsDevice + ?Sized>(device: &D, program: ProgramId) -> Self {
        Self {
            time: device.uniform_location(program, "iTime"),
            resolution: device.uniform_location(program, "iResolution"),
            colors: [
                device.uniform_location(program, "iColor1"),
                device.uniform_location(program, "iColor2"),
                device.uniform_location(program, "iColor3"),
            ],
        }
    }
}

/// Program ready to draw the fullscreen quad.
#[derive(Debug)]
pub struct LinkedProgram {
    id: ProgramId,
    position_attribute: u32,
    uniforms: UniformLocations,
}

impl LinkedProgram {
    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn position_attribute(&self) -> u32 {
        self.position_attribute
    }

    pub fn uniforms(&self) -> &UniformLocations {
        &self.uniforms
    }

    /// Writes the per-frame uniforms. The program must be in use.
    pub fn apply_uniforms<D: GraphicsDevice + ?Sized>(
        &self,
        device: &mut D,
        time: f32,
        resolution: SurfaceSize,
        palette: &Palette,
    ) {
        set(device, self.uniforms.time, UniformValue::Float(time));
        set(
            device,
            self.uniforms.resolution,
            UniformValue::Vec2(resolution.as_vec2()),
        );
        for (location, color) in self.uniforms.colors.iter().zip(palette.colors()) {
            set(device, *location, UniformValue::Vec3(*color));
        }
    }

    pub fn release<D: GraphicsDevice + ?Sized>(self, device: &mut D) {
        device.delete_program(self.id);
    }
}

fn set<D: GraphicsDevice + ?Sized>(
    device: &mut D,
    location: Option<UniformLocation>,
    value: UniformValue,
) {
    if let Some(location) = location {
        device.set_uniform(location, value);
    }
}

/// Compiles, links, and introspects a program from two GLSL sources.
pub fn build_program<D: GraphicsDevice + ?Sized>(
    device: &mut D,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<LinkedProgram, BuildError> {
    let vertex = compile(device, ShaderStage::Vertex, vertex_source)?;
    let fragment = match compile(device, ShaderStage::Fragment, fragment_source) {
        Ok(fragment) => fragment,
        Err(err) => {
            device.delete_shader(vertex);
            return Err(err);
        }
    };

    let linked = device.link_program(vertex, fragment);
    device.delete_shader(vertex);
    device.delete_shader(fragment);
    let id = linked.map_err(|log| BuildError::Link { log })?;

    let Some(position_attribute) = device.attribute_location(id, POSITION_ATTRIBUTE) else {
        device.delete_program(id);
        return Err(BuildError::MissingPositionAttribute);
    };

    Ok(LinkedProgram {
        id,
        position_attribute,
        uniforms: UniformLocations::resolve(device, id),
    })
}

fn compile<D: GraphicsDevice + ?Sized>(
    device: &mut D,
    stage: ShaderStage,
    source: &str,
) -> Result<ShaderId, BuildError> {
    device
        .compile_shader(stage, source)
        .map_err(|log| BuildError::Compile {
            stage,
            log,
            shader_source: source.to_owned(),
        })
}

//! Graphics device seam.
//!
//! Everything above this module talks to the GPU through [`GraphicsDevice`],
//! a small handle-based vocabulary (compile, link, look up, upload, draw,
//! release). Two implementations live here:
//! - `device` drives a real wgpu surface; programs become render pipelines and
//!   uniform writes land in a per-program staging buffer flushed before draws.
//! - `headless` runs the same GLSL front-end without a GPU and records what
//!   would have been drawn, which is how the test suite and `coverglow check`
//!   observe rendering.
//!
//! `context` owns the wgpu instance, adapter, and surface wiring, `pipeline`
//! turns linked shaders into render pipelines, `uniforms` stages the std140
//! block bytes, and `upscale` stretches a scaled-down frame over the window.

mod context;
mod device;
mod headless;
mod pipeline;
mod uniforms;
mod upscale;

use std::fmt;

use thiserror::Error;

use crate::compile::{ShaderStage, UniformKind};
use crate::types::AdapterProfile;

pub use device::WgpuDevice;
pub use headless::{DeviceEvent, DrawRecord, HeadlessDevice, HISTORY_LIMIT};

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            pub(crate) fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

resource_id!(
    /// Compiled shader stage owned by a device.
    ShaderId,
    "shader"
);
resource_id!(
    /// Linked program owned by a device.
    ProgramId,
    "program"
);
resource_id!(
    /// Vertex buffer owned by a device.
    BufferId,
    "buffer"
);

/// Resolved slot of a uniform inside a program's uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformLocation {
    program: ProgramId,
    offset: u32,
    kind: UniformKind,
}

impl UniformLocation {
    pub(crate) fn new(program: ProgramId, offset: u32, kind: UniformKind) -> Self {
        Self {
            program,
            offset,
            kind,
        }
    }

    pub fn program(&self) -> ProgramId {
        self.program
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn kind(&self) -> UniformKind {
        self.kind
    }
}

/// Value written through a [`UniformLocation`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
        }
    }

    pub fn as_floats(&self) -> &[f32] {
        match self {
            UniformValue::Float(value) => std::slice::from_ref(value),
            UniformValue::Vec2(value) => value,
            UniformValue::Vec3(value) => value,
        }
    }
}

/// Live GPU objects held by a device, used to prove nothing leaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub shaders: usize,
    pub programs: usize,
    pub buffers: usize,
}

impl ResourceCounts {
    pub fn is_empty(&self) -> bool {
        self.shaders == 0 && self.programs == 0 && self.buffers == 0
    }
}

/// Failure while issuing a draw. Draw failures are reported, never retried.
#[derive(Debug, Error)]
pub enum DrawError {
    #[error("no program is bound")]
    NoProgram,
    #[error("{0} is not a live program")]
    UnknownProgram(ProgramId),
    #[error("{0} is not a live buffer")]
    UnknownBuffer(BufferId),
    #[error("surface unavailable: {0}")]
    Surface(String),
    #[error("draw rejected: {0}")]
    Rejected(String),
}

/// Handle-based graphics API used by the effect harness.
///
/// Ids are only meaningful to the device that issued them. Releasing an id
/// that is not live is a no-op, so release paths may run more than once.
pub trait GraphicsDevice {
    /// Compiles one stage. On failure returns the compiler log.
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, String>;

    fn delete_shader(&mut self, shader: ShaderId);

    /// Links a vertex and fragment shader. On failure returns the linker log.
    ///
    /// The program keeps what it needs, so both shaders may be deleted as
    /// soon as this returns.
    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId, String>;

    fn delete_program(&mut self, program: ProgramId);

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32>;

    /// Looks up a uniform. Uniforms the program does not use resolve to `None`.
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    /// Uploads static `f32` vertex data.
    fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<BufferId, String>;

    fn delete_buffer(&mut self, buffer: BufferId);

    /// Sets the size, in pixels, that effects render at.
    ///
    /// A device presenting into a window of a different size stretches the
    /// result over the whole window.
    fn set_viewport(&mut self, width: u32, height: u32);

    fn use_program(&mut self, program: ProgramId);

    /// Writes a uniform on the program that owns `location`.
    ///
    /// Stale locations and mismatched value shapes are ignored.
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);

    /// Clears the next frame to `color` before anything is drawn.
    fn clear(&mut self, color: [f32; 4]);

    /// Draws `vertex_count` vertices of `buffer` as a triangle strip, feeding
    /// two floats per vertex into `attribute`.
    fn draw_triangle_strip(
        &mut self,
        buffer: BufferId,
        attribute: u32,
        vertex_count: u32,
    ) -> Result<(), DrawError>;

    /// Finishes the frame.
    fn present(&mut self) {}

    fn live_resources(&self) -> ResourceCounts;

    /// Describes the adapter backing this device.
    fn adapter_profile(&self) -> AdapterProfile {
        AdapterProfile::default()
    }
}

impl<D: GraphicsDevice + ?Sized> GraphicsDevice for &mut D {
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, String> {
        (**self).compile_shader(stage, source)
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        (**self).delete_shader(shader)
    }

    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId, String> {
        (**self).link_program(vertex, fragment)
    }

    fn delete_program(&mut self, program: ProgramId) {
        (**self).delete_program(program)
    }

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        (**self).attribute_location(program, name)
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        (**self).uniform_location(program, name)
    }

    fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<BufferId, String> {
        (**self).create_vertex_buffer(data)
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        (**self).delete_buffer(buffer)
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        (**self).set_viewport(width, height)
    }

    fn use_program(&mut self, program: ProgramId) {
        (**self).use_program(program)
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        (**self).set_uniform(location, value)
    }

    fn clear(&mut self, color: [f32; 4]) {
        (**self).clear(color)
    }

    fn draw_triangle_strip(
        &mut self,
        buffer: BufferId,
        attribute: u32,
        vertex_count: u32,
    ) -> Result<(), DrawError> {
        (**self).draw_triangle_strip(buffer, attribute, vertex_count)
    }

    fn present(&mut self) {
        (**self).present()
    }

    fn live_resources(&self) -> ResourceCounts {
        (**self).live_resources()
    }

    fn adapter_profile(&self) -> AdapterProfile {
        (**self).adapter_profile()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_values_expose_their_floats() {
        assert_eq!(UniformValue::Float(2.5).as_floats(), &[2.5]);
        assert_eq!(UniformValue::Vec2([1.0, 2.0]).as_floats(), &[1.0, 2.0]);
        assert_eq!(UniformValue::Vec3([1.0, 2.0, 3.0]).kind(), UniformKind::Vec3);
    }

    #[test]
    fn resource_ids_display_with_kind() {
        assert_eq!(ProgramId::new(7).to_string(), "program#7");
        assert_eq!(BufferId::new(2).to_string(), "buffer#2");
    }

    #[test]
    fn empty_counts_report_empty() {
        assert!(ResourceCounts::default().is_empty());
        assert!(!ResourceCounts {
            programs: 1,
            ..ResourceCounts::default()
        }
        .is_empty());
    }
}

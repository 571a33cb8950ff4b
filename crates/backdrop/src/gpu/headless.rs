use std::collections::{BTreeMap, HashMap};

use crate::compile::{self, CompiledStage, LinkedLayout, ShaderStage};
use crate::surface::SurfaceSize;
use crate::types::AdapterProfile;

use super::{
    BufferId, DrawError, GraphicsDevice, ProgramId, ResourceCounts, ShaderId, UniformLocation,
    UniformValue,
};

/// Most draws and events kept for inspection. Older entries are dropped in
/// batches once a history reaches twice this length.
pub const HISTORY_LIMIT: usize = 1024;

fn push_bounded<T>(history: &mut Vec<T>, item: T) {
    if history.len() >= HISTORY_LIMIT * 2 {
        let excess = history.len() - HISTORY_LIMIT;
        history.drain(..excess);
    }
    history.push(item);
}

/// Lifecycle event recorded by [`HeadlessDevice`], in issue order.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    ShaderCompiled(ShaderId),
    ShaderDeleted(ShaderId),
    ProgramLinked(ProgramId),
    ProgramDeleted(ProgramId),
    BufferCreated(BufferId),
    BufferDeleted(BufferId),
    Draw(ProgramId),
}

/// Snapshot of one successful draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: ProgramId,
    pub buffer: BufferId,
    pub attribute: u32,
    pub vertex_count: u32,
    pub viewport: SurfaceSize,
    pub clear_color: Option<[f32; 4]>,
    /// Uniform values at draw time, keyed by uniform name.
    pub uniforms: BTreeMap<String, UniformValue>,
}

impl DrawRecord {
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms.get(name).copied()
    }

    pub fn time(&self) -> Option<f32> {
        match self.uniform("iTime") {
            Some(UniformValue::Float(value)) => Some(value),
            _ => None,
        }
    }

    pub fn resolution(&self) -> Option<[f32; 2]> {
        match self.uniform("iResolution") {
            Some(UniformValue::Vec2(value)) => Some(value),
            _ => None,
        }
    }

    pub fn color(&self, slot: usize) -> Option<[f32; 3]> {
        match self.uniform(&format!("iColor{}", slot + 1)) {
            Some(UniformValue::Vec3(value)) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct HeadlessProgram {
    layout: LinkedLayout,
    values: BTreeMap<u32, UniformValue>,
}

/// Device that compiles real GLSL but draws nothing.
///
/// Shaders go through the same naga front-end as [`super::WgpuDevice`], so
/// compile and link failures match. Draws, uniform writes, and resource
/// lifetimes are recorded for inspection.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    next_id: u64,
    shaders: HashMap<ShaderId, CompiledStage>,
    programs: HashMap<ProgramId, HeadlessProgram>,
    buffers: HashMap<BufferId, Vec<f32>>,
    current_program: Option<ProgramId>,
    viewport: SurfaceSize,
    viewport_updates: usize,
    pending_clear: Option<[f32; 4]>,
    draws: Vec<DrawRecord>,
    events: Vec<DeviceEvent>,
    presents: usize,
    total_draws: usize,
    fail_draws: bool,
    fail_buffers: bool,
    reject_pattern: Option<String>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent draw fail.
    pub fn fail_draws(&mut self, fail: bool) {
        self.fail_draws = fail;
    }

    /// Rejects every later compile whose source contains `pattern`, as a
    /// driver would reject a broken shader. `None` restores normal compiles.
    pub fn reject_sources_containing(&mut self, pattern: Option<&str>) {
        self.reject_pattern = pattern.map(str::to_owned);
    }

    /// Makes every subsequent buffer upload fail.
    pub fn fail_buffer_uploads(&mut self, fail: bool) {
        self.fail_buffers = fail;
    }

    /// Recent draws, oldest first. See [`HISTORY_LIMIT`].
    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    /// Successful draws since creation, including ones no longer in history.
    pub fn total_draws(&self) -> usize {
        self.total_draws
    }

    pub fn last_draw(&self) -> Option<&DrawRecord> {
        self.draws.last()
    }

    pub fn events(&self) -> &[DeviceEvent] {
        &self.events
    }

    pub fn presents(&self) -> usize {
        self.presents
    }

    pub fn viewport(&self) -> SurfaceSize {
        self.viewport
    }

    /// Number of `set_viewport` calls so far.
    pub fn viewport_updates(&self) -> usize {
        self.viewport_updates
    }

    pub fn current_program(&self) -> Option<ProgramId> {
        self.current_program
    }

    pub fn clear_history(&mut self) {
        self.draws.clear();
        self.events.clear();
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, String> {
        if let Some(pattern) = self
            .reject_pattern
            .as_deref()
            .filter(|pattern| source.contains(pattern))
        {
            return Err(format!("ERROR: {stage} source rejected (contains `{pattern}`)"));
        }
        let compiled = compile::compile_stage(stage, source)?;
        let id = ShaderId::new(self.allocate());
        self.shaders.insert(id, compiled);
        push_bounded(&mut self.events, DeviceEvent::ShaderCompiled(id));
        Ok(id)
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        if self.shaders.remove(&shader).is_some() {
            push_bounded(&mut self.events, DeviceEvent::ShaderDeleted(shader));
        }
    }

    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId, String> {
        let vertex = self
            .shaders
            .get(&vertex)
            .ok_or_else(|| format!("{vertex} is not a live shader"))?;
        let fragment = self
            .shaders
            .get(&fragment)
            .ok_or_else(|| format!("{fragment} is not a live shader"))?;
        let layout = compile::link_stages(vertex, fragment)?;
        let id = ProgramId::new(self.allocate());
        self.programs.insert(
            id,
            HeadlessProgram {
                layout,
                values: BTreeMap::new(),
            },
        );
        push_bounded(&mut self.events, DeviceEvent::ProgramLinked(id));
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        if self.programs.remove(&program).is_some() {
            if self.current_program == Some(program) {
                self.current_program = None;
            }
            push_bounded(&mut self.events, DeviceEvent::ProgramDeleted(program));
        }
    }

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        self.programs
            .get(&program)?
            .layout
            .attribute_location(name)
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let member = self.programs.get(&program)?.layout.uniform(name)?;
        Some(UniformLocation::new(program, member.offset, member.kind))
    }

    fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<BufferId, String> {
        if self.fail_buffers {
            return Err("buffer allocation refused".to_owned());
        }
        let id = BufferId::new(self.allocate());
        self.buffers.insert(id, data.to_vec());
        push_bounded(&mut self.events, DeviceEvent::BufferCreated(id));
        Ok(id)
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(&buffer).is_some() {
            push_bounded(&mut self.events, DeviceEvent::BufferDeleted(buffer));
        }
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = SurfaceSize::new(width, height);
        self.viewport_updates += 1;
    }

    fn use_program(&mut self, program: ProgramId) {
        if self.programs.contains_key(&program) {
            self.current_program = Some(program);
        } else {
            tracing::warn!(%program, "ignoring use of a program that is not live");
        }
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        if location.kind() != value.kind() {
            tracing::warn!(?location, ?value, "uniform value does not match its declaration");
            return;
        }
        if let Some(program) = self.programs.get_mut(&location.program()) {
            program.values.insert(location.offset(), value);
        }
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.pending_clear = Some(color);
    }

    fn draw_triangle_strip(
        &mut self,
        buffer: BufferId,
        attribute: u32,
        vertex_count: u32,
    ) -> Result<(), DrawError> {
        let program_id = self.current_program.ok_or(DrawError::NoProgram)?;
        let program = self
            .programs
            .get(&program_id)
            .ok_or(DrawError::UnknownProgram(program_id))?;
        let data = self
            .buffers
            .get(&buffer)
            .ok_or(DrawError::UnknownBuffer(buffer))?;
        if self.fail_draws {
            return Err(DrawError::Rejected("draws disabled on this device".to_owned()));
        }
        if (vertex_count as usize) * 2 > data.len() {
            return Err(DrawError::Rejected(format!(
                "{vertex_count} vertices requested from a buffer of {} floats",
                data.len()
            )));
        }

        let uniforms = program
            .layout
            .uniform_block
            .iter()
            .flat_map(|block| block.members.iter())
            .filter_map(|(name, member)| {
                program
                    .values
                    .get(&member.offset)
                    .map(|value| (name.clone(), *value))
            })
            .collect();

        self.total_draws += 1;
        push_bounded(
            &mut self.draws,
            DrawRecord {
                program: program_id,
                buffer,
                attribute,
                vertex_count,
                viewport: self.viewport,
                clear_color: self.pending_clear.take(),
                uniforms,
            },
        );
        push_bounded(&mut self.events, DeviceEvent::Draw(program_id));
        Ok(())
    }

    fn present(&mut self) {
        self.pending_clear = None;
        self.presents += 1;
    }

    fn live_resources(&self) -> ResourceCounts {
        ResourceCounts {
            shaders: self.shaders.len(),
            programs: self.programs.len(),
            buffers: self.buffers.len(),
        }
    }

    fn adapter_profile(&self) -> AdapterProfile {
        AdapterProfile::headless()
    }
}

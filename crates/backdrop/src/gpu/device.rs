use std::collections::HashMap;

use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, warn};
use wgpu::util::DeviceExt;

use crate::compile::{self, CompiledStage, ShaderStage};
use crate::surface::SurfaceSize;
use crate::types::{AdapterProfile, GpuPowerPreference};

use super::context::GpuContext;
use super::pipeline::ProgramPipeline;
use super::upscale::{OffscreenTarget, TargetKind, UpscalePass};
use super::{
    BufferId, DrawError, GraphicsDevice, ProgramId, ResourceCounts, ShaderId, UniformLocation,
    UniformValue,
};

/// [`GraphicsDevice`] backed by a wgpu surface.
///
/// Shaders are validated up front with the shared GLSL front-end; linking
/// builds a render pipeline. Each frame acquires the surface texture on its
/// first draw (or at present, if nothing was drawn) and presents it in
/// [`GraphicsDevice::present`].
///
/// The swapchain always matches the window ([`WgpuDevice::resize_surface`]).
/// When the viewport set by the effect harness is smaller, effects render
/// into an offscreen texture that is stretched over the window.
pub struct WgpuDevice {
    context: GpuContext,
    shaders: HashMap<ShaderId, CompiledStage>,
    programs: HashMap<ProgramId, ProgramPipeline>,
    buffers: HashMap<BufferId, wgpu::Buffer>,
    next_id: u64,
    current_program: Option<ProgramId>,
    viewport: SurfaceSize,
    pending_clear: Option<wgpu::Color>,
    frame: Option<wgpu::SurfaceTexture>,
    upscale: Option<UpscalePass>,
    offscreen: Option<OffscreenTarget>,
}

impl WgpuDevice {
    /// Creates a device presenting into `target`.
    ///
    /// `target` must stay alive for as long as the device.
    pub fn new<T>(target: &T, size: SurfaceSize, power: GpuPowerPreference) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, size, power)?;
        let viewport = context.size();
        Ok(Self {
            context,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            next_id: 0,
            current_program: None,
            viewport,
            pending_clear: None,
            frame: None,
            upscale: None,
            offscreen: None,
        })
    }

    /// Resizes the swapchain to a new window size. Effects keep rendering at
    /// the size last passed to [`GraphicsDevice::set_viewport`].
    pub fn resize_surface(&mut self, width: u32, height: u32) {
        let size = SurfaceSize::new(width.max(1), height.max(1));
        if size == self.context.size() {
            return;
        }
        // A texture acquired at the old size cannot be presented after reconfigure.
        if let Some(frame) = self.frame.take() {
            frame.present();
        }
        self.context.resize(size);
        self.refresh_target();
    }

    /// Drops or (re)allocates the offscreen target after a size change.
    fn refresh_target(&mut self) {
        let kind = TargetKind::choose(
            self.context.size(),
            self.viewport,
            self.context.max_dimension,
        );
        let size = match kind {
            TargetKind::Surface => {
                self.offscreen = None;
                return;
            }
            TargetKind::Offscreen(size) => size,
        };
        if self.offscreen.as_ref().is_some_and(|target| target.size == size) {
            return;
        }
        if self.upscale.is_none() {
            match UpscalePass::new(&self.context.device, self.context.surface_format) {
                Ok(pass) => self.upscale = Some(pass),
                Err(log) => {
                    warn!(%log, "upscale pipeline unavailable; drawing at window size");
                    self.offscreen = None;
                    return;
                }
            }
        }
        if let Some(pass) = self.upscale.as_ref() {
            self.offscreen =
                Some(pass.target(&self.context.device, self.context.surface_format, size));
            debug!(width = size.width, height = size.height, "offscreen target allocated");
        }
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn acquire_frame(&mut self) -> Result<wgpu::SurfaceTexture, DrawError> {
        if let Some(frame) = self.frame.take() {
            return Ok(frame);
        }
        match self.context.surface.get_current_texture() {
            Ok(frame) => Ok(frame),
            Err(err @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                debug!(error = %err, "surface out of date; reconfiguring");
                self.context.reconfigure();
                Err(DrawError::Surface(err.to_string()))
            }
            Err(err) => Err(DrawError::Surface(err.to_string())),
        }
    }

    fn load_op(&mut self) -> wgpu::LoadOp<wgpu::Color> {
        match self.pending_clear.take() {
            Some(color) => wgpu::LoadOp::Clear(color),
            None => wgpu::LoadOp::Load,
        }
    }
}

impl GraphicsDevice for WgpuDevice {
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, String> {
        let compiled = compile::compile_stage(stage, source)?;
        let id = ShaderId::new(self.allocate());
        self.shaders.insert(id, compiled);
        Ok(id)
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader);
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
        let pipeline = ProgramPipeline::new(
            &self.context.device,
            self.context.surface_format,
            vertex,
            fragment,
            layout,
        )?;
        let id = ProgramId::new(self.allocate());
        self.programs.insert(id, pipeline);
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        if self.programs.remove(&program).is_some() && self.current_program == Some(program) {
            self.current_program = None;
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
        if data.is_empty() {
            return Err("vertex data is empty".to_owned());
        }
        let buffer = self
            .context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("backdrop vertices"),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let id = BufferId::new(self.allocate());
        self.buffers.insert(id, buffer);
        Ok(id)
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if let Some(buffer) = self.buffers.remove(&buffer) {
            buffer.destroy();
        }
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        let size = SurfaceSize::new(width.max(1), height.max(1));
        if size == self.viewport {
            return;
        }
        self.viewport = size;
        self.refresh_target();
    }

    fn use_program(&mut self, program: ProgramId) {
        if self.programs.contains_key(&program) {
            self.current_program = Some(program);
        } else {
            warn!(%program, "ignoring use of a program that is not live");
        }
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        if location.kind() != value.kind() {
            warn!(?location, ?value, "uniform value does not match its declaration");
            return;
        }
        let Some(binding) = self
            .programs
            .get_mut(&location.program())
            .and_then(|program| program.uniforms.as_mut())
        else {
            return;
        };
        if !binding.staging.write(location.offset(), value) {
            warn!(?location, "uniform write outside the uniform block");
        }
    }

    fn clear(&mut self, color: [f32; 4]) {
        let [r, g, b, a] = color.map(f64::from);
        self.pending_clear = Some(wgpu::Color { r, g, b, a });
    }

    fn draw_triangle_strip(
        &mut self,
        buffer: BufferId,
        attribute: u32,
        vertex_count: u32,
    ) -> Result<(), DrawError> {
        let program_id = self.current_program.ok_or(DrawError::NoProgram)?;
        if !self.programs.contains_key(&program_id) {
            return Err(DrawError::UnknownProgram(program_id));
        }
        if !self.buffers.contains_key(&buffer) {
            return Err(DrawError::UnknownBuffer(buffer));
        }

        let frame = self.acquire_frame()?;
        let load = self.load_op();

        let (Some(program), Some(vertices)) =
            (self.programs.get_mut(&program_id), self.buffers.get(&buffer))
        else {
            self.frame = Some(frame);
            return Err(DrawError::UnknownProgram(program_id));
        };
        if attribute != program.position_location {
            self.frame = Some(frame);
            return Err(DrawError::Rejected(format!(
                "attribute {attribute} is not the position input of {program_id}"
            )));
        }

        if let Some(binding) = program.uniforms.as_mut() {
            if let Some(bytes) = binding.staging.take_dirty() {
                self.context.queue.write_buffer(&binding.buffer, 0, bytes);
            }
        }

        let frame_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let target_size = self
            .offscreen
            .as_ref()
            .map_or(self.context.size(), |target| target.size);
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("backdrop frame"),
            });
        {
            let view = self
                .offscreen
                .as_ref()
                .map_or(&frame_view, |target| &target.view);
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("backdrop pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_viewport(
                0.0,
                0.0,
                target_size.width as f32,
                target_size.height as f32,
                0.0,
                1.0,
            );
            render_pass.set_pipeline(&program.pipeline);
            if let Some(binding) = program.uniforms.as_ref() {
                render_pass.set_bind_group(binding.group, &binding.bind_group, &[]);
            }
            render_pass.set_vertex_buffer(0, vertices.slice(..));
            render_pass.draw(0..vertex_count, 0..1);
        }
        if let (Some(target), Some(pass)) = (self.offscreen.as_ref(), self.upscale.as_ref()) {
            pass.encode(&mut encoder, target, &frame_view);
        }
        self.context.queue.submit(Some(encoder.finish()));
        self.frame = Some(frame);
        Ok(())
    }

    fn present(&mut self) {
        if self.frame.is_none() && self.pending_clear.is_none() {
            return;
        }
        let frame = match self.acquire_frame() {
            Ok(frame) => frame,
            Err(err) => {
                debug!(error = %err, "skipping present");
                self.pending_clear = None;
                return;
            }
        };
        if let Some(color) = self.pending_clear.take() {
            let view = frame
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());
            let mut encoder =
                self.context
                    .device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("backdrop clear"),
                    });
            encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("backdrop clear pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            self.context.queue.submit(Some(encoder.finish()));
        }
        frame.present();
    }

    fn live_resources(&self) -> ResourceCounts {
        ResourceCounts {
            shaders: self.shaders.len(),
            programs: self.programs.len(),
            buffers: self.buffers.len(),
        }
    }

    fn adapter_profile(&self) -> AdapterProfile {
        self.context.adapter_profile.clone()
    }
}

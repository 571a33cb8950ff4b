use std::borrow::Cow;

use wgpu::naga;

use crate::surface::{SurfaceSize, SurfaceSizing};

/// Fullscreen triangle that samples the offscreen frame.
pub(crate) const UPSCALE_VERTEX_GLSL: &str = include_str!("../../shaders/upscale.vert");
pub(crate) const UPSCALE_FRAGMENT_GLSL: &str = include_str!("../../shaders/upscale.frag");

/// Where effect draws land for a given window and backing size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TargetKind {
    /// Straight into the swapchain frame.
    Surface,
    /// Into a texture of this size, stretched over the frame afterwards.
    Offscreen(SurfaceSize),
}

impl TargetKind {
    /// A backing size past the device limit shrinks uniformly to fit it.
    pub fn choose(surface: SurfaceSize, backing: SurfaceSize, max_dimension: u32) -> Self {
        let backing = SurfaceSizing::new(1.0, max_dimension).backing_size(backing);
        if backing == surface {
            TargetKind::Surface
        } else {
            TargetKind::Offscreen(backing)
        }
    }
}

/// Pipeline that stretches an offscreen frame across the swapchain.
pub(crate) struct UpscalePass {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl UpscalePass {
    /// Builds inside a validation error scope, like program pipelines.
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Result<Self, String> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("backdrop upscale vertex"),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Borrowed(UPSCALE_VERTEX_GLSL),
                stage: naga::ShaderStage::Vertex,
                defines: &[],
            },
        });
        let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("backdrop upscale fragment"),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Borrowed(UPSCALE_FRAGMENT_GLSL),
                stage: naga::ShaderStage::Fragment,
                defines: &[],
            },
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("backdrop upscale layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("backdrop upscale pipeline layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("backdrop upscale pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex,
                entry_point: Some("main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("backdrop upscale sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(error.to_string());
        }

        Ok(Self {
            pipeline,
            layout,
            sampler,
        })
    }

    /// Allocates a render target of `size` that this pass can sample.
    pub fn target(
        &self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        size: SurfaceSize,
    ) -> OffscreenTarget {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("backdrop offscreen frame"),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("backdrop upscale bind group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        OffscreenTarget {
            _texture: texture,
            view,
            bind_group,
            size,
        }
    }

    /// Records a pass that covers `frame` with the contents of `target`.
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &OffscreenTarget,
        frame: &wgpu::TextureView,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("backdrop upscale pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: frame,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &target.bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}

/// Texture the effect renders into when its backing size differs from the
/// window.
pub(crate) struct OffscreenTarget {
    _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
    pub size: SurfaceSize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{compile_stage, link_stages, ShaderStage};

    #[test]
    fn matching_sizes_draw_to_the_surface() {
        let size = SurfaceSize::new(1280, 720);
        assert_eq!(TargetKind::choose(size, size, 8192), TargetKind::Surface);
    }

    #[test]
    fn scaled_backing_renders_offscreen() {
        let window = SurfaceSize::new(1280, 720);
        assert_eq!(
            TargetKind::choose(window, SurfaceSize::new(640, 360), 8192),
            TargetKind::Offscreen(SurfaceSize::new(640, 360))
        );
    }

    #[test]
    fn offscreen_target_respects_device_limit() {
        let window = SurfaceSize::new(4096, 2304);
        assert_eq!(
            TargetKind::choose(window, SurfaceSize::new(5120, 2880), 4096),
            TargetKind::Surface
        );
        assert_eq!(
            TargetKind::choose(window, SurfaceSize::new(8192, 8192), 4096),
            TargetKind::Offscreen(SurfaceSize::new(4096, 4096))
        );
    }

    #[test]
    fn upscale_shaders_compile_and_link() {
        let vertex =
            compile_stage(ShaderStage::Vertex, UPSCALE_VERTEX_GLSL).expect("vertex compiles");
        let fragment =
            compile_stage(ShaderStage::Fragment, UPSCALE_FRAGMENT_GLSL).expect("fragment compiles");
        let layout = link_stages(&vertex, &fragment).expect("stages link");
        assert!(layout.attributes.is_empty());
        assert!(layout.uniform_block.is_none());
    }
}

use std::borrow::Cow;

use wgpu::naga;

use crate::compile::{CompiledStage, LinkedLayout, UniformBlock};

use super::uniforms::UniformStaging;

/// Bytes per quad vertex: two `f32` coordinates.
const VERTEX_STRIDE: wgpu::BufferAddress = 8;

/// Uniform buffer and bind group for a program's reflected block.
pub(crate) struct UniformBinding {
    pub group: u32,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub staging: UniformStaging,
}

/// Linked program realised as a wgpu render pipeline.
pub(crate) struct ProgramPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub layout: LinkedLayout,
    pub position_location: u32,
    pub uniforms: Option<UniformBinding>,
}

impl ProgramPipeline {
    /// Builds the pipeline inside a validation error scope so driver-side
    /// failures come back as a link log instead of a device panic.
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        vertex: &CompiledStage,
        fragment: &CompiledStage,
        layout: LinkedLayout,
    ) -> Result<Self, String> {
        let position_location = match layout.attributes.as_slice() {
            [] => return Err("vertex shader declares no attributes".to_owned()),
            [first, ..] => first.location,
        };

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex_module = create_module(device, "backdrop vertex", vertex, naga::ShaderStage::Vertex);
        let fragment_module =
            create_module(device, "backdrop fragment", fragment, naga::ShaderStage::Fragment);

        let uniforms = layout
            .uniform_block
            .as_ref()
            .map(|block| create_uniform_binding(device, block));

        let bind_group_layouts = uniforms
            .as_ref()
            .map(|(binding_layout, binding)| group_layouts(device, binding.group, binding_layout))
            .unwrap_or_default();
        let layout_refs: Vec<&wgpu::BindGroupLayout> = bind_group_layouts.iter().collect();

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("backdrop pipeline layout"),
            bind_group_layouts: &layout_refs,
            push_constant_ranges: &[],
        });

        let attributes = [wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 0,
            shader_location: position_location,
        }];

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("backdrop pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some("main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: VERTEX_STRIDE,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(error.to_string());
        }

        Ok(Self {
            pipeline,
            layout,
            position_location,
            uniforms: uniforms.map(|(_, binding)| binding),
        })
    }
}

fn create_module(
    device: &wgpu::Device,
    label: &str,
    stage: &CompiledStage,
    naga_stage: naga::ShaderStage,
) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(stage.source.clone()),
            stage: naga_stage,
            defines: &[],
        },
    })
}

fn create_uniform_binding(
    device: &wgpu::Device,
    block: &UniformBlock,
) -> (wgpu::BindGroupLayout, UniformBinding) {
    let staging = UniformStaging::new(block.size);
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("backdrop uniforms"),
        size: staging.len() as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("backdrop uniform layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: block.binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("backdrop uniform bind group"),
        layout: &layout,
        entries: &[wgpu::BindGroupEntry {
            binding: block.binding,
            resource: buffer.as_entire_binding(),
        }],
    });
    (
        layout,
        UniformBinding {
            group: block.group,
            buffer,
            bind_group,
            staging,
        },
    )
}

/// Pads lower groups with empty layouts so the block lands at `group`.
fn group_layouts(
    device: &wgpu::Device,
    group: u32,
    uniform_layout: &wgpu::BindGroupLayout,
) -> Vec<wgpu::BindGroupLayout> {
    let mut layouts: Vec<wgpu::BindGroupLayout> = (0..group)
        .map(|_| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("backdrop empty layout"),
                entries: &[],
            })
        })
        .collect();
    layouts.push(uniform_layout.clone());
    layouts
}

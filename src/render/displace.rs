use bytemuck::{Pod, Zeroable};
use image::RgbaImage;
use wgpu::util::DeviceExt;

use crate::field::GRID_SIZE;

/// Uniform block for the displace shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DisplaceParams {
    /// Region corners in NDC: x0, y0 (top-left), x1, y1 (bottom-right).
    pub rect: [f32; 4],
}

/// Bytes per field cell (RGBA32F).
const FIELD_TEXEL_BYTES: u32 = 16;

/// GPU resources for drawing the source image through the displacement field.
pub struct DisplacePipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub bind_group: wgpu::BindGroup,
    pub params_buffer: wgpu::Buffer,
    pub field_texture: wgpu::Texture,
}

impl DisplacePipeline {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        source: &RgbaImage,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("displace_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/displace.wgsl").into()),
        });

        // --- Source image: sRGB, sampled linearly with clamp-to-edge ---
        let (src_w, src_h) = source.dimensions();
        let source_size = wgpu::Extent3d {
            width: src_w,
            height: src_h,
            depth_or_array_layers: 1,
        };
        let source_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("source_texture"),
            size: source_size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &source_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            source.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * src_w),
                rows_per_image: Some(src_h),
            },
            source_size,
        );
        let source_view = source_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let source_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("source_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        // --- Displacement field: 64x64 RGBA32F, rewritten every frame ---
        let field_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("field_texture"),
            size: field_extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let field_view = field_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("displace_params_buffer"),
            contents: bytemuck::bytes_of(&DisplaceParams {
                rect: [-1.0, 1.0, 1.0, -1.0],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let fragment_texture = |binding: u32, filterable: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable },
            },
            count: None,
        };

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("displace_layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    fragment_texture(1, true),
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                    // Read with textureLoad only.
                    fragment_texture(3, false),
                ],
            });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("displace_bind_group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&source_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&source_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&field_view),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("displace_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        // Straight alpha over the backdrop.
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("displace_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            bind_group,
            params_buffer,
            field_texture,
        }
    }

    /// Upload the current displacement grid.
    pub fn update_field(&self, queue: &wgpu::Queue, cells: &[[f32; 4]]) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.field_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(cells),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(FIELD_TEXEL_BYTES * GRID_SIZE as u32),
                rows_per_image: Some(GRID_SIZE as u32),
            },
            field_extent(),
        );
    }

    /// Update where on screen the image is drawn.
    pub fn update_rect(&self, queue: &wgpu::Queue, rect: [f32; 4]) {
        queue.write_buffer(
            &self.params_buffer,
            0,
            bytemuck::bytes_of(&DisplaceParams { rect }),
        );
    }
}

fn field_extent() -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: GRID_SIZE as u32,
        height: GRID_SIZE as u32,
        depth_or_array_layers: 1,
    }
}

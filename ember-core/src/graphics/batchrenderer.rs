use std::num::{NonZeroU32, NonZeroU64};

use geese::{dependencies, GeeseContextHandle, GeeseSystem, Mut};
use glam::Vec2;
use log::{error, warn};
use palette::Srgba;
use rustc_hash::FxHashMap as HashMap;
use wgpu::util::DeviceExt;
use wgpu::{
    BindGroup, BindGroupLayout, BlendState, Buffer, BufferUsages, Color, ColorTargetState,
    ColorWrites, CommandEncoderDescriptor, Device, IndexFormat, LoadOp, Operations,
    RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline, Sampler, ShaderModule,
    StoreOp, TextureView,
};

use crate::assets::{AssetHandle, AssetSystem, ShaderAsset, TextureAsset};

use super::batch::{QuadBatch, RenderStats, SealedBatch, TextureId, Vertex, VERTEX_SIZE};
use super::{Camera, DynamicBuffer, GraphicsSystem, TextureBundle};

/// A single draw request: an axis-aligned rectangle with its lower-left
/// corner at `position`.
#[derive(Debug, Clone)]
pub struct Quad {
    pub position: Vec2,
    pub size: Vec2,
    /// If there is a texture set, this tints the texture
    pub color: Srgba,
    pub texture: Option<AssetHandle<TextureAsset>>,
}

/// Streaming quad batch renderer.
///
/// Quads recorded between [`begin`](Self::begin) and
/// [`flush`](Self::flush) share one vertex buffer and are drawn with as
/// few draw calls as the texture-slot budget allows. When a batch runs
/// out of vertex or slot capacity mid-stream, it is submitted
/// transparently and recording continues, so callers never have to count
/// quads.
pub struct BatchRenderer {
    ctx: GeeseContextHandle<Self>,

    batch: QuadBatch,
    vertex_buffer: DynamicBuffer<Vertex>,
    index_buffer: Buffer,
    index_format: IndexFormat,
    bind_group_layout: BindGroupLayout,
    render_pipeline: RenderPipeline,
    clear_color: Color,

    white_pixel: TextureBundle,
    // Handles for every texture id bound this frame, so flush can look
    // the views back up
    bound_handles: HashMap<TextureId, AssetHandle<TextureAsset>>,
    needs_clear: bool,
}
impl BatchRenderer {
    pub const MAX_QUAD_COUNT: usize = 1000;
    pub const MAX_VERTEX_COUNT: usize = Self::MAX_QUAD_COUNT * 4;
    pub const MAX_INDEX_COUNT: usize = Self::MAX_QUAD_COUNT * 6;
    /// Simultaneously bound textures per draw call, including the
    /// reserved white slot.
    pub const MAX_TEXTURE_COUNT: usize = 16;

    /// Resets the vertex write cursor for a new frame. The first
    /// submission after `begin` clears the surface.
    pub fn begin(&mut self) {
        self.batch.begin();
        let batch = &self.batch;
        self.bound_handles.retain(|id, _| batch.slots().contains(*id));
        self.needs_clear = true;
    }

    /// Records one quad. May submit the accumulated batch first when
    /// vertex or texture-slot capacity is exhausted.
    pub fn draw_quad(&mut self, quad: &Quad) {
        let texture = match &quad.texture {
            None => None,
            Some(handle) => {
                let id = self.ctx.get::<AssetSystem>().get(handle).texture().id();
                self.bound_handles.entry(id).or_insert_with(|| handle.clone());
                Some(id)
            }
        };

        let (r, g, b, a) = quad.color.into_components();
        if let Some(sealed) = self.batch.draw_quad(quad.position, quad.size, [r, g, b, a], texture)
        {
            self.submit(&sealed);
        }
    }

    /// Uploads the written vertex span to the GPU vertex buffer.
    pub fn end(&mut self) {
        let graphics_sys = self.ctx.get::<GraphicsSystem>();
        self.vertex_buffer.write(&graphics_sys, 0, self.batch.vertices());
    }

    /// Binds every referenced texture and issues one indexed draw call
    /// covering the accumulated quads, then resets the batch.
    pub fn flush(&mut self) {
        let sealed = self.batch.seal();
        self.draw(&sealed);
    }

    pub fn stats(&self) -> RenderStats {
        self.batch.stats()
    }

    pub fn reset_stats(&mut self) {
        self.batch.reset_stats();
    }

    // Upload and draw in one step, used by the overflow path
    fn submit(&mut self, sealed: &SealedBatch) {
        let graphics_sys = self.ctx.get::<GraphicsSystem>();
        self.vertex_buffer.write(&graphics_sys, 0, &sealed.vertices);
        drop(graphics_sys);
        self.draw(sealed);
    }

    fn draw(&mut self, sealed: &SealedBatch) {
        let graphics_sys = self.ctx.get::<GraphicsSystem>();
        let Some(frame_view) = graphics_sys.frame_view() else {
            warn!("No frame in flight, call begin_frame first!");
            return;
        };
        let asset_sys = self.ctx.get::<AssetSystem>();
        let camera = self.ctx.get::<Camera>();
        let device = graphics_sys.device();

        // Views and samplers in slot order, padded with the white pixel
        // so the bind group always matches the fixed layout
        let mut views: Vec<&TextureView> = Vec::with_capacity(Self::MAX_TEXTURE_COUNT);
        let mut samplers: Vec<&Sampler> = Vec::with_capacity(Self::MAX_TEXTURE_COUNT);
        for id in &sealed.textures {
            if *id == self.white_pixel.id() {
                views.push(self.white_pixel.view());
                samplers.push(self.white_pixel.sampler());
                continue;
            }
            match self.bound_handles.get(id) {
                Some(handle) => {
                    let bundle = asset_sys.get(handle).texture();
                    views.push(bundle.view());
                    samplers.push(bundle.sampler());
                }
                None => {
                    error!("No handle recorded for {id:?}, substituting the white texture");
                    views.push(self.white_pixel.view());
                    samplers.push(self.white_pixel.sampler());
                }
            }
        }
        while views.len() < Self::MAX_TEXTURE_COUNT {
            views.push(self.white_pixel.view());
            samplers.push(self.white_pixel.sampler());
        }

        let bind_group = Self::create_bind_group(
            device,
            &self.bind_group_layout,
            camera.canvas_transform_buffer(),
            &views,
            &samplers,
        );

        let mut encoder = device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("BatchRenderer encoder"),
        });
        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("BatchRenderer render pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: frame_view,
                    resolve_target: None,
                    ops: Operations {
                        load: match self.needs_clear {
                            true => LoadOp::Clear(self.clear_color),
                            false => LoadOp::Load,
                        },
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rpass.set_pipeline(&self.render_pipeline);
            rpass.set_index_buffer(self.index_buffer.slice(..), self.index_format);
            rpass.set_vertex_buffer(0, self.vertex_buffer.buffer().slice(..));
            rpass.set_bind_group(0, &bind_group, &[]);
            rpass.draw_indexed(0..sealed.index_count, 0, 0..1);
        }
        // Each batch is its own submission so a later vertex upload can
        // never overtake a draw that still reads the buffer
        graphics_sys.queue().submit(Some(encoder.finish()));
        self.needs_clear = false;
    }

    fn create_bind_group_layout(device: &Device) -> BindGroupLayout {
        let max_textures = NonZeroU32::new(Self::MAX_TEXTURE_COUNT as u32);
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Batch bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: Some(NonZeroU64::new(64).unwrap()),
                    },
                    count: None,
                },
                // Texture array
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: max_textures,
                },
                // Sampler array
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: max_textures,
                },
            ],
        })
    }

    fn create_bind_group(
        device: &Device,
        layout: &BindGroupLayout,
        canvas_transform: &Buffer,
        views: &[&TextureView],
        samplers: &[&Sampler],
    ) -> BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: canvas_transform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureViewArray(views),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::SamplerArray(samplers),
                },
            ],
            layout,
            label: Some("Batch bind group"),
        })
    }

    fn create_render_pipeline(
        device: &Device,
        bind_group_layout: &BindGroupLayout,
        shader: &ShaderModule,
        color_state: Option<ColorTargetState>,
    ) -> RenderPipeline {
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Batch pipeline layout"),
            bind_group_layouts: &[bind_group_layout],
            push_constant_ranges: &[],
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Batch pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: "vert_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: VERTEX_SIZE as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    // position       tex_coord       color          tex_slot
                    attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2, 2 => Float32x4, 3 => Float32],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: "frag_main",
                targets: &[color_state],
            }),
            primitive: wgpu::PrimitiveState {
                front_face: wgpu::FrontFace::Ccw,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        })
    }
}

/// The repeating quad index pattern (0,1,2)(2,3,0), offset by 4 per quad.
fn quad_indices(max_quads: usize) -> Vec<u16> {
    let mut indices = Vec::with_capacity(max_quads * 6);
    for quad in 0..max_quads as u16 {
        let offset = quad * 4;
        indices.extend_from_slice(&[
            offset,
            offset + 1,
            offset + 2,
            offset + 2,
            offset + 3,
            offset,
        ]);
    }
    indices
}

impl GeeseSystem for BatchRenderer {
    const DEPENDENCIES: geese::Dependencies = dependencies()
        .with::<Mut<GraphicsSystem>>()
        .with::<Mut<AssetSystem>>()
        .with::<Mut<Camera>>();

    fn new(mut ctx: GeeseContextHandle<Self>) -> Self {
        let mut asset_sys = ctx.get_mut::<AssetSystem>();
        let shader_handle = asset_sys
            .load::<ShaderAsset>("shaders/batch.wgsl")
            .expect("Failed to load the batch shader");
        drop(asset_sys);

        let graphics_sys = ctx.get::<GraphicsSystem>();
        let device = graphics_sys.device();
        let queue = graphics_sys.queue();

        let vertex_buffer = DynamicBuffer::with_capacity(
            "Batch vertex buffer",
            &graphics_sys,
            BufferUsages::VERTEX,
            Self::MAX_VERTEX_COUNT,
        );
        // The index pattern never changes, upload it once
        let indices = quad_indices(Self::MAX_QUAD_COUNT);
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Batch index buffer"),
            contents: bytemuck::cast_slice(&indices),
            usage: BufferUsages::INDEX,
        });

        let white_pixel = TextureBundle::white_pixel(device, queue);
        let batch =
            QuadBatch::with_capacity(Self::MAX_QUAD_COUNT, Self::MAX_TEXTURE_COUNT, white_pixel.id())
                .expect("Default batch capacities are valid");

        let asset_sys = ctx.get::<AssetSystem>();
        let bind_group_layout = Self::create_bind_group_layout(device);
        let color_state = Some(wgpu::ColorTargetState {
            format: graphics_sys.surface_config().format,
            blend: Some(BlendState::ALPHA_BLENDING),
            write_mask: ColorWrites::ALL,
        });
        let render_pipeline = Self::create_render_pipeline(
            device,
            &bind_group_layout,
            asset_sys.get(&shader_handle).module(),
            color_state,
        );

        drop(graphics_sys);
        drop(asset_sys);

        Self {
            ctx,

            batch,
            vertex_buffer,
            index_buffer,
            index_format: IndexFormat::Uint16,
            bind_group_layout,
            render_pipeline,
            clear_color: Color {
                r: 0.2,
                g: 0.3,
                b: 0.3,
                a: 1.0,
            },

            white_pixel,
            bound_handles: HashMap::default(),
            needs_clear: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::quad_indices;

    #[test]
    fn index_pattern_repeats_per_quad() {
        let indices = quad_indices(3);
        assert_eq!(indices.len(), 18);
        assert_eq!(&indices[..6], &[0, 1, 2, 2, 3, 0]);
        assert_eq!(&indices[6..12], &[4, 5, 6, 6, 7, 4]);
        assert_eq!(&indices[12..], &[8, 9, 10, 10, 11, 8]);
    }
}

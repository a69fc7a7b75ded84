use geese::*;
use log::warn;
use wgpu::{
    Device, Queue, Surface, SurfaceConfiguration, SurfaceTexture, TextureView,
    TextureViewDescriptor,
};
use winit::dpi::PhysicalSize;

use super::{GraphicsBackend, WindowSystem};

pub type FrameData = Option<(SurfaceTexture, TextureView)>;

/// Owns the device, queue and surface. Frames are bracketed by
/// [`begin_frame`](Self::begin_frame) and
/// [`present_frame`](Self::present_frame); renderers submit their own
/// command buffers in between.
pub struct GraphicsSystem {
    ctx: GeeseContextHandle<Self>,
    surface_config: SurfaceConfiguration,
    frame_data: FrameData,
    surface: Surface<'static>,
    device: Device,
    queue: Queue,
}
impl GraphicsSystem {
    pub fn request_redraw(&self) {
        self.ctx.get::<WindowSystem>().window_handle().request_redraw();
    }

    pub fn resize_surface(&mut self, new_size: &PhysicalSize<u32>) {
        self.surface_config.width = new_size.width.max(1);
        self.surface_config.height = new_size.height.max(1);
        self.surface.configure(&self.device, &self.surface_config);
    }

    /// Acquires the next swapchain texture for this frame.
    pub fn begin_frame(&mut self) {
        let frame = self
            .surface
            .get_current_texture()
            .expect("Failed to acquire next swapchain texture");
        let view = frame.texture.create_view(&TextureViewDescriptor::default());
        self.frame_data = Some((frame, view));
    }

    pub fn present_frame(&mut self) {
        let Some((frame, _)) = self.frame_data.take() else {
            warn!("No frame data present, begin a frame by calling begin_frame()");
            return;
        };
        frame.present();
    }

    /// The render target view of the frame in flight, if any.
    pub fn frame_view(&self) -> Option<&TextureView> {
        self.frame_data.as_ref().map(|(_, view)| view)
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn surface_config(&self) -> &SurfaceConfiguration {
        &self.surface_config
    }
}
impl GeeseSystem for GraphicsSystem {
    const DEPENDENCIES: Dependencies = dependencies()
        .with::<WindowSystem>()
        .with::<GraphicsBackend>();

    fn new(ctx: GeeseContextHandle<Self>) -> Self {
        let backend = ctx.get::<GraphicsBackend>();
        let adapter = backend.adapter();

        // The batch pipeline indexes texture and sampler binding arrays
        // with a per-vertex slot, which needs these features
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::TEXTURE_BINDING_ARRAY
                    | wgpu::Features::SAMPLED_TEXTURE_AND_STORAGE_BUFFER_ARRAY_NON_UNIFORM_INDEXING,
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
            },
            None,
        ))
        .expect("Failed to create device");

        let window = ctx.get::<WindowSystem>();
        let window_size = window.window_handle().inner_size();
        let surface = backend
            .instance()
            .create_surface(window.window_handle())
            .expect("Failed to create surface");
        let swapchain_capabilities = surface.get_capabilities(adapter);
        drop(window);
        let swapchain_format = swapchain_capabilities.formats[0];

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: swapchain_format,
            width: window_size.width.max(1),
            height: window_size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: swapchain_capabilities.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &config);

        drop(backend);

        Self {
            ctx,
            device,
            queue,
            surface,
            surface_config: config,
            frame_data: None,
        }
    }
}

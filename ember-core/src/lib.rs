use std::time::Instant;

use geese::*;
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::ControlFlow,
    keyboard::{KeyCode, PhysicalKey},
};

pub mod assets;
pub use assets::{AssetHandle, AssetSystem};

pub mod graphics;
pub use graphics::{BatchRenderer, Camera, Quad, RenderStats};

mod eventloop_system;
pub use eventloop_system::EventLoopSystem;

pub mod events {
    /// Raised once before the first frame.
    pub struct Initialized {}

    /// Raised at the top of every frame.
    pub struct NewFrame {
        pub delta: f32,
    }

    /// Raised while a batch is open; record quads now.
    pub struct Draw {}
}

/// Owns the system context and drives the per-frame batch protocol.
pub struct EmberEngine {
    ctx: GeeseContext,
}
impl EmberEngine {
    pub fn new() -> Self {
        let mut ctx = GeeseContext::default();
        // Pulls in the whole graphics stack through declared dependencies
        ctx.flush().with(notify::add_system::<BatchRenderer>());

        Self { ctx }
    }

    pub fn get_ctx(&mut self) -> &mut GeeseContext {
        &mut self.ctx
    }

    /// Names, sizes and shows the window created hidden at startup.
    pub fn create_window(&mut self, title: &str, size: Option<PhysicalSize<u32>>) {
        let window_sys = self.ctx.get::<graphics::WindowSystem>();
        let window = window_sys.window_handle();
        window.set_title(title);
        if let Some(size) = size {
            let _ = window.request_inner_size(size);
        }
        window.set_visible(true);
    }

    /// Runs the event loop until the window closes or Escape is pressed.
    pub fn run(mut self) -> anyhow::Result<()> {
        let event_loop = self.ctx.get_mut::<EventLoopSystem>().take();
        let mut last_frame = Instant::now();

        self.ctx.flush().with(events::Initialized {});

        event_loop.run(move |event, target| {
            target.set_control_flow(ControlFlow::Poll);
            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested
                    | WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                physical_key: PhysicalKey::Code(KeyCode::Escape),
                                state: ElementState::Pressed,
                                ..
                            },
                        ..
                    } => target.exit(),
                    WindowEvent::Resized(new_size) => {
                        self.ctx
                            .get_mut::<graphics::GraphicsSystem>()
                            .resize_surface(&new_size);
                        self.ctx
                            .get_mut::<Camera>()
                            .set_screen_size((new_size.width, new_size.height));
                    }
                    WindowEvent::RedrawRequested => {
                        let delta = last_frame.elapsed().as_secs_f32();
                        last_frame = Instant::now();
                        self.ctx.flush().with(events::NewFrame { delta });
                        self.render_frame();
                    }
                    _ => (),
                },
                Event::AboutToWait => {
                    self.ctx.get::<graphics::GraphicsSystem>().request_redraw();
                }
                _ => (),
            }
        })?;
        Ok(())
    }

    /// One full batch cycle: begin, record via the `Draw` event, upload,
    /// flush, present.
    fn render_frame(&mut self) {
        self.ctx.get::<Camera>().write_canvas_transform_buffer();
        self.ctx.get_mut::<graphics::GraphicsSystem>().begin_frame();
        self.ctx.get_mut::<BatchRenderer>().begin();

        self.ctx.flush().with(events::Draw {});

        {
            let mut renderer = self.ctx.get_mut::<BatchRenderer>();
            renderer.end();
            renderer.flush();
        }
        self.ctx.get_mut::<graphics::GraphicsSystem>().present_frame();
    }
}

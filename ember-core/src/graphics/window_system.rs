use std::sync::Arc;

use geese::*;
use winit::window::Window;

use crate::EventLoopSystem;

/// Owns the application window. Created hidden; the engine shows it once
/// the surface is configured.
pub struct WindowSystem {
    window_handle: Arc<Window>,
}
impl WindowSystem {
    pub fn window_handle(&self) -> Arc<Window> {
        self.window_handle.clone()
    }
}
impl GeeseSystem for WindowSystem {
    const DEPENDENCIES: Dependencies = dependencies().with::<EventLoopSystem>();

    fn new(ctx: GeeseContextHandle<Self>) -> Self {
        let event_loop = ctx.get::<EventLoopSystem>();
        let window_handle = winit::window::WindowBuilder::new()
            .with_title("Ember")
            .with_visible(false)
            .with_resizable(true)
            .build(event_loop.get())
            .expect("Failed to create window");

        Self {
            window_handle: Arc::new(window_handle),
        }
    }
}

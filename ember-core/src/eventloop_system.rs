use geese::*;
use winit::event_loop::EventLoop;

/// Holds the winit event loop until the engine takes it to run.
pub struct EventLoopSystem {
    event_loop: Option<EventLoop<()>>,
}
impl EventLoopSystem {
    pub fn get(&self) -> &EventLoop<()> {
        self.event_loop.as_ref().expect("Event loop was already taken!")
    }

    pub fn take(&mut self) -> EventLoop<()> {
        self.event_loop.take().expect("Event loop was already taken!")
    }
}
impl GeeseSystem for EventLoopSystem {
    fn new(_ctx: GeeseContextHandle<Self>) -> Self {
        Self {
            event_loop: Some(EventLoop::new().expect("Failed to create event loop")),
        }
    }
}

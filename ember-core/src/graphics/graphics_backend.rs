use geese::*;
use wgpu::{Adapter, Backends, Instance, InstanceDescriptor, PowerPreference, RequestAdapterOptions};

/// Owns the wgpu instance and the adapter everything else is created from.
pub struct GraphicsBackend {
    instance: Instance,
    adapter: Adapter,
}
impl GraphicsBackend {
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }
}
impl GeeseSystem for GraphicsBackend {
    fn new(_ctx: GeeseContextHandle<Self>) -> Self {
        let instance = Instance::new(InstanceDescriptor {
            backends: Backends::PRIMARY,
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&RequestAdapterOptions {
            power_preference: PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: None,
        }))
        .expect("No suitable GPU adapter found");

        Self { instance, adapter }
    }
}

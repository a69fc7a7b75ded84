pub mod batch;
pub use batch::{BatchError, QuadBatch, RenderStats, TextureId, Vertex, VERTEX_SIZE};

mod batchrenderer;
pub use batchrenderer::{BatchRenderer, Quad};

mod camera;
pub use camera::Camera;

mod dynamic_buffer;
pub use dynamic_buffer::DynamicBuffer;

mod graphics_backend;
pub use graphics_backend::GraphicsBackend;

mod graphics_system;
pub use graphics_system::GraphicsSystem;

mod texture_bundle;
pub use texture_bundle::TextureBundle;

mod window_system;
pub use window_system::WindowSystem;

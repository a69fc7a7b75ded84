pub mod prelude {
    pub use ember_core::{
        assets::{AssetHandle, AssetSystem, TextureAsset},
        events, graphics, BatchRenderer, Camera, EmberEngine, Quad, RenderStats,
    };
}

use std::borrow::Cow;
use std::path::Path;

use geese::GeeseContextHandle;
use wgpu::{ShaderModule, ShaderModuleDescriptor};

use super::{Asset, AssetError, AssetSystem};
use crate::graphics::GraphicsSystem;

/// A WGSL source file compiled into a shader module.
#[derive(Debug)]
pub struct ShaderAsset {
    module: ShaderModule,
}
impl ShaderAsset {
    pub fn module(&self) -> &ShaderModule {
        &self.module
    }
}
impl Asset for ShaderAsset {
    fn from_path(ctx: &GeeseContextHandle<AssetSystem>, path: &Path) -> Result<Self, AssetError> {
        let shader_src = std::fs::read_to_string(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let graphics_sys = ctx.get::<GraphicsSystem>();
        let module = graphics_sys
            .device()
            .create_shader_module(ShaderModuleDescriptor {
                label: path.to_str(),
                source: wgpu::ShaderSource::Wgsl(Cow::Owned(shader_src)),
            });

        Ok(Self { module })
    }
}

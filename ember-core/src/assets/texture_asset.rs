use std::path::Path;

use geese::GeeseContextHandle;
use wgpu::Extent3d;

use super::{Asset, AssetError, AssetSystem};
use crate::graphics::{GraphicsSystem, TextureBundle};

/// An image decoded into a GPU texture.
#[derive(Debug, PartialEq)]
pub struct TextureAsset {
    texture: TextureBundle,
}
impl TextureAsset {
    pub fn texture(&self) -> &TextureBundle {
        &self.texture
    }
}
impl Asset for TextureAsset {
    fn from_path(ctx: &GeeseContextHandle<AssetSystem>, path: &Path) -> Result<Self, AssetError> {
        let img = image::open(path)
            .map_err(|source| match source {
                image::ImageError::IoError(source) => AssetError::Io {
                    path: path.to_path_buf(),
                    source,
                },
                source => AssetError::Decode {
                    path: path.to_path_buf(),
                    source,
                },
            })?
            .to_rgba8();
        let extent = Extent3d {
            width: img.width(),
            height: img.height(),
            depth_or_array_layers: 1,
        };

        let sys = ctx.get::<GraphicsSystem>();
        let texture = TextureBundle::from_rgba(
            sys.device(),
            sys.queue(),
            &path.display().to_string(),
            extent,
            &img,
        );

        Ok(Self { texture })
    }
}

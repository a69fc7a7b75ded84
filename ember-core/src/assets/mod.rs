use std::{
    marker::PhantomData,
    path::{Path, PathBuf},
    sync::Arc,
};

use geese::*;
use log::debug;
use rustc_hash::FxHashMap as HashMap;
use thiserror::Error;

use crate::graphics::GraphicsSystem;

mod holder;
use holder::{AssetHolder, TypedAssetHolder};

mod texture_asset;
pub use texture_asset::TextureAsset;
mod shader_asset;
pub use shader_asset::ShaderAsset;

/// Loading an asset is the only fallible operation in the engine that
/// callers are expected to recover from.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("could not read `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not decode image `{path}`")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

pub trait Asset: 'static + Sized {
    fn from_path(ctx: &GeeseContextHandle<AssetSystem>, path: &Path) -> Result<Self, AssetError>;
}

/// Shared, typed reference to a loaded asset.
#[derive(Debug, Eq, PartialEq)]
pub struct AssetHandle<T: Asset> {
    id: Arc<u64>,
    marker: PhantomData<T>,
}
impl<T: Asset> AssetHandle<T> {
    fn new(id: Arc<u64>) -> Self {
        Self {
            id,
            marker: PhantomData,
        }
    }

    pub fn id(&self) -> &Arc<u64> {
        &self.id
    }
}
impl<T: Asset> std::hash::Hash for AssetHandle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u64(*self.id)
    }
}
impl<T: Asset> Clone for AssetHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            marker: self.marker,
        }
    }
}

/// Loads and caches assets by path, keyed by monotonically assigned ids.
pub struct AssetSystem {
    ctx: GeeseContextHandle<Self>,
    assets: HashMap<Arc<u64>, Box<dyn AssetHolder>>,
    path_to_id: HashMap<PathBuf, Arc<u64>>,
    base_path: PathBuf,
}
impl AssetSystem {
    pub fn get<T: Asset>(&self, handle: &AssetHandle<T>) -> &T {
        self.assets
            .get(handle.id())
            .expect("Asset handle outlived its asset")
            .as_any()
            .downcast_ref()
            .expect("Invalid type given as generic")
    }

    /// Loads the asset at `path` (relative to the base path), or clones
    /// the existing handle if it was loaded before.
    pub fn load<T: Asset>(&mut self, path: impl Into<PathBuf>) -> Result<AssetHandle<T>, AssetError> {
        let path = self.base_path.join(path.into());

        if let Some(id) = self.path_to_id.get(&path) {
            return Ok(AssetHandle::new(id.clone()));
        }

        let asset = T::from_path(&self.ctx, &path)?;
        let id = Arc::new(self.assets.len() as u64);
        self.assets
            .insert(id.clone(), Box::new(TypedAssetHolder::new(asset)));
        self.path_to_id.insert(path.clone(), id.clone());
        debug!("Loaded asset from '{}'", path.display());

        Ok(AssetHandle::new(id))
    }
}
impl GeeseSystem for AssetSystem {
    const DEPENDENCIES: Dependencies = dependencies().with::<GraphicsSystem>();

    fn new(ctx: GeeseContextHandle<Self>) -> Self {
        let base_path = std::env::current_dir().expect("No working directory");

        Self {
            ctx,
            base_path,
            assets: HashMap::default(),
            path_to_id: HashMap::default(),
        }
    }
}

use std::any::Any;

use super::Asset;

pub(super) trait AssetHolder {
    fn as_any(&self) -> &dyn Any;
}

pub(super) struct TypedAssetHolder<T: Asset> {
    value: T,
}
impl<T: Asset> TypedAssetHolder<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}
impl<T: Asset> AssetHolder for TypedAssetHolder<T> {
    fn as_any(&self) -> &dyn Any {
        &self.value
    }
}

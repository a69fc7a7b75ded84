use wgpu::{
    Device, Extent3d, ImageDataLayout, Queue, Sampler, SamplerDescriptor, Texture,
    TextureDescriptor, TextureView, TextureViewDescriptor,
};

use super::batch::TextureId;

/// A texture together with the view and sampler the batch pipeline binds,
/// plus the stable id used as its slot-table key.
#[derive(Debug)]
pub struct TextureBundle {
    id: TextureId,
    extent: Extent3d,
    texture: Texture,
    view: TextureView,
    sampler: Sampler,
}
impl TextureBundle {
    pub fn new(
        device: &Device,
        queue: &Queue,
        label: &str,
        tex_descriptor: TextureDescriptor,
        sampler_descriptor: &SamplerDescriptor,
        data: &[u8],
        data_layout: ImageDataLayout,
    ) -> Self {
        let extent = tex_descriptor.size;
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            view_formats: &[],
            ..tex_descriptor
        });
        let view = texture.create_view(&TextureViewDescriptor::default());
        let sampler = device.create_sampler(sampler_descriptor);

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            data_layout,
            extent,
        );

        Self {
            id: TextureId::allocate(),
            extent,
            texture,
            view,
            sampler,
        }
    }

    /// Creates an RGBA texture from raw pixel data with clamped,
    /// nearest-filtered sampling.
    pub fn from_rgba(
        device: &Device,
        queue: &Queue,
        label: &str,
        extent: Extent3d,
        data: &[u8],
    ) -> Self {
        let tex_descriptor = wgpu::TextureDescriptor {
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            label: None,
            view_formats: &[],
        };
        let sampler_descriptor = wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        };
        let data_layout = wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * extent.width),
            rows_per_image: Some(extent.height),
        };

        Self::new(
            device,
            queue,
            label,
            tex_descriptor,
            &sampler_descriptor,
            data,
            data_layout,
        )
    }

    /// The reserved 1x1 white texture backing untextured colored quads.
    pub fn white_pixel(device: &Device, queue: &Queue) -> Self {
        Self::from_rgba(
            device,
            queue,
            "White pixel texture",
            Extent3d::default(),
            &[255, 255, 255, 255],
        )
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn view(&self) -> &TextureView {
        &self.view
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn width(&self) -> u32 {
        self.extent.width
    }
    pub fn height(&self) -> u32 {
        self.extent.height
    }
    pub fn extent(&self) -> Extent3d {
        self.extent
    }
}
impl PartialEq for TextureBundle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

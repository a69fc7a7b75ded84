use glam::{Mat4, Vec2, Vec3};
use wgpu::{util::DeviceExt, Buffer, BufferUsages};

use geese::*;

use super::GraphicsSystem;

/// Orthographic 2D camera. Produces the canvas transform consumed by the
/// batch pipeline at bind group slot 0.
pub struct Camera {
    ctx: GeeseContextHandle<Self>,

    position: Vec2,
    zoom: f32,
    /// World units visible vertically at zoom 1.0.
    view_height: f32,
    screen_size: Vec2,

    canvas_transform: Mat4,
    shader_buffer: Buffer,
}
impl Camera {
    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.recalc();
    }
    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn translate(&mut self, offset: Vec2) {
        self.set_position(self.position + offset);
    }

    /// A zoom of 1.0 is default, 2.0 doubles the size of everything.
    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom;
        self.recalc();
    }
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn set_view_height(&mut self, view_height: f32) {
        self.view_height = view_height;
        self.recalc();
    }

    pub(crate) fn set_screen_size(&mut self, screen_size: (u32, u32)) {
        self.screen_size = Vec2::new(screen_size.0 as f32, screen_size.1 as f32);
        self.recalc();
    }

    pub fn canvas_transform(&self) -> Mat4 {
        self.canvas_transform
    }

    pub fn canvas_transform_buffer(&self) -> &Buffer {
        &self.shader_buffer
    }

    pub fn write_canvas_transform_buffer(&self) {
        let graphics_sys = self.ctx.get::<GraphicsSystem>();
        graphics_sys.queue().write_buffer(
            &self.shader_buffer,
            0,
            bytemuck::cast_slice(&[self.canvas_transform]),
        );
    }

    fn recalc(&mut self) {
        self.canvas_transform = Self::transform_for(
            self.position,
            self.zoom,
            self.view_height,
            self.screen_size,
        );
    }

    fn transform_for(position: Vec2, zoom: f32, view_height: f32, screen_size: Vec2) -> Mat4 {
        let aspect = screen_size.x / screen_size.y.max(1.0);
        let half_h = view_height / (2.0 * zoom);
        let half_w = half_h * aspect;
        let ortho = Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, -1.0, 1.0);
        let view = Mat4::from_translation(Vec3::new(-position.x, -position.y, 0.0));
        ortho * view
    }
}
impl GeeseSystem for Camera {
    const DEPENDENCIES: Dependencies = dependencies().with::<GraphicsSystem>();

    fn new(ctx: GeeseContextHandle<Self>) -> Self {
        let position = Vec2::ZERO;
        let zoom = 1.0;
        let view_height = 2.0;
        let screen_size = Vec2::ONE;
        let canvas_transform = Self::transform_for(position, zoom, view_height, screen_size);

        let graphics_sys = ctx.get::<GraphicsSystem>();
        let shader_buffer =
            graphics_sys
                .device()
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Camera canvas transform buffer"),
                    contents: bytemuck::cast_slice(&[canvas_transform]),
                    usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
                });
        drop(graphics_sys);

        Self {
            ctx,
            position,
            zoom,
            view_height,
            screen_size,
            canvas_transform,
            shader_buffer,
        }
    }
}

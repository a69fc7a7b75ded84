use std::{marker::PhantomData, mem::size_of};

use bytemuck::{cast_slice, Pod, Zeroable};
use wgpu::{Buffer, BufferDescriptor, BufferUsages, CommandEncoderDescriptor};

use super::graphics_system::GraphicsSystem;

/// Manages a GPU-side [`Buffer`], growing it when a write would not fit.
#[derive(Debug)]
pub struct DynamicBuffer<T: Pod + Zeroable> {
    buffer: Buffer,
    usage: BufferUsages,
    marker: PhantomData<T>,
}

impl<T: Pod + Zeroable> DynamicBuffer<T> {
    /// Creates a buffer that can hold at least `len` instances of `T`
    /// before reallocating.
    pub fn with_capacity(
        name: &str,
        gpu: &GraphicsSystem,
        mut usage: BufferUsages,
        len: usize,
    ) -> Self {
        usage |= BufferUsages::COPY_DST | BufferUsages::COPY_SRC;

        let bytes = (len * size_of::<T>()).next_power_of_two() as u64;
        let buffer = gpu.device().create_buffer(&BufferDescriptor {
            label: Some(name),
            size: 4.max(bytes),
            usage,
            mapped_at_creation: false,
        });

        Self {
            buffer,
            usage,
            marker: PhantomData,
        }
    }

    /// The underlying GPU buffer. May change after a reallocating write.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Current capacity in instances of `T`.
    pub fn len(&self) -> usize {
        self.buffer.size() as usize / size_of::<T>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes `data` at `offset` (in instances), growing the buffer first
    /// if needed.
    pub fn write(&mut self, gpu: &GraphicsSystem, offset: usize, data: &[T]) {
        if data.is_empty() {
            return;
        }
        let start = (offset * size_of::<T>()) as u64;
        let bytes = cast_slice::<_, u8>(data);
        self.ensure_raw_size(gpu, start + bytes.len() as u64);
        gpu.queue().write_buffer(&self.buffer, start, bytes);
    }

    fn ensure_raw_size(&mut self, gpu: &GraphicsSystem, size: u64) {
        let old_size = self.buffer.size();
        if old_size >= size {
            return;
        }
        let old_buffer = std::mem::replace(
            &mut self.buffer,
            gpu.device().create_buffer(&BufferDescriptor {
                label: Some("Dynamic buffer"),
                size: (2 * old_size).max(size.next_power_of_two()),
                usage: self.usage,
                mapped_at_creation: false,
            }),
        );

        let mut copy_encoder = gpu.device().create_command_encoder(&CommandEncoderDescriptor {
            label: Some("Dynamic buffer copy encoder"),
        });
        copy_encoder.copy_buffer_to_buffer(&old_buffer, 0, &self.buffer, 0, old_buffer.size());
        gpu.queue().submit(Some(copy_encoder.finish()));
    }
}

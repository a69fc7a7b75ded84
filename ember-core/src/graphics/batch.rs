use std::sync::atomic::{AtomicU64, Ordering};

use bytemuck_derive::{Pod, Zeroable};
use glam::Vec2;
use rustc_hash::FxHashMap as HashMap;
use thiserror::Error;

/// Slot reserved for the 1x1 white texture.
pub const WHITE_SLOT: u32 = 0;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(0);

/// Stable identity of a GPU-resident texture, usable as a map key.
/// The batch never owns the texture behind an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(u64);
impl TextureId {
    pub(crate) fn allocate() -> Self {
        Self(NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Per-vertex record written into the shared vertex buffer.
/// Field order matches the vertex buffer layout of the batch pipeline,
/// do not reorder.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    position: [f32; 3],
    tex_coord: [f32; 2],
    color: [f32; 4],
    tex_slot: f32,
}
impl Vertex {
    pub fn new(position: [f32; 3], tex_coord: [f32; 2], color: [f32; 4], tex_slot: f32) -> Self {
        Self {
            position,
            tex_coord,
            color,
            tex_slot,
        }
    }

    pub fn position(&self) -> [f32; 3] {
        self.position
    }
    pub fn tex_coord(&self) -> [f32; 2] {
        self.tex_coord
    }
    pub fn color(&self) -> [f32; 4] {
        self.color
    }
    pub fn tex_slot(&self) -> f32 {
        self.tex_slot
    }
}
pub const VERTEX_SIZE: usize = std::mem::size_of::<Vertex>();

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("{0} quads need more vertices than 16-bit indices can address")]
    CapacityTooLarge(usize),
    #[error("a batch needs at least 2 texture slots, got {0}")]
    TooFewTextureSlots(usize),
}

/// Cumulative render statistics, reset on demand only.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenderStats {
    pub draw_calls: u32,
    pub quads: u32,
}

/// Insertion-ordered table of the textures bound for the current batch.
/// The position in `bound` is the slot index, so bind order is
/// deterministic.
#[derive(Debug)]
pub struct TextureSlots {
    bound: Vec<TextureId>,
    lookup: HashMap<TextureId, u32>,
    capacity: usize,
}
impl TextureSlots {
    fn new(white: TextureId, capacity: usize) -> Self {
        let mut lookup = HashMap::default();
        lookup.insert(white, WHITE_SLOT);
        Self {
            bound: vec![white],
            lookup,
            capacity,
        }
    }

    pub fn slot_of(&self, id: TextureId) -> Option<u32> {
        self.lookup.get(&id).copied()
    }

    pub fn contains(&self, id: TextureId) -> bool {
        self.lookup.contains_key(&id)
    }

    pub fn is_full(&self) -> bool {
        self.bound.len() >= self.capacity
    }

    /// Texture ids in slot order; index 0 is always the white texture.
    pub fn bound(&self) -> &[TextureId] {
        &self.bound
    }

    fn slot_or_assign(&mut self, id: TextureId) -> u32 {
        if let Some(slot) = self.slot_of(id) {
            return slot;
        }
        debug_assert!(!self.is_full());
        let slot = self.bound.len() as u32;
        self.bound.push(id);
        self.lookup.insert(id, slot);
        slot
    }

    /// Drops every binding except the reserved white slot.
    fn reset(&mut self) {
        let white = self.bound[0];
        self.bound.truncate(1);
        self.lookup.clear();
        self.lookup.insert(white, WHITE_SLOT);
    }
}

/// A finished batch, handed to the GPU side for upload and drawing.
/// `vertices` is exactly the span written since the last cursor reset.
#[derive(Debug)]
pub struct SealedBatch {
    pub vertices: Vec<Vertex>,
    /// Bound texture ids in slot order.
    pub textures: Vec<TextureId>,
    pub index_count: u32,
}

/// CPU half of the quad batching engine: scratch vertex buffer, texture
/// slot table and overflow bookkeeping. Holds no GPU resources.
#[derive(Debug)]
pub struct QuadBatch {
    vertices: Vec<Vertex>,
    index_count: u32,
    slots: TextureSlots,
    stats: RenderStats,
    max_vertex_count: usize,
    max_index_count: u32,
}
impl QuadBatch {
    pub fn with_capacity(
        max_quads: usize,
        max_textures: usize,
        white: TextureId,
    ) -> Result<Self, BatchError> {
        // Indices are u16, so all quad vertices must stay addressable
        if max_quads * 4 > u16::MAX as usize + 1 {
            return Err(BatchError::CapacityTooLarge(max_quads));
        }
        if max_textures < 2 {
            return Err(BatchError::TooFewTextureSlots(max_textures));
        }
        Ok(Self {
            vertices: Vec::with_capacity(max_quads * 4),
            index_count: 0,
            slots: TextureSlots::new(white, max_textures),
            stats: RenderStats::default(),
            max_vertex_count: max_quads * 4,
            max_index_count: (max_quads * 6) as u32,
        })
    }

    /// Resets the write cursor. Index count and slot table are left
    /// untouched, they persist until the next seal.
    pub fn begin(&mut self) {
        self.vertices.clear();
    }

    /// Appends one quad with its lower-left corner at `position`,
    /// counter-clockwise winding.
    ///
    /// When accepting the quad would overflow the vertex buffer, or bind
    /// an unseen texture while the slot table is full, the current batch
    /// is sealed first and returned; the caller must submit it. This
    /// makes the call stream self-managing: any number of quads may be
    /// recorded between one `begin` and the final seal.
    pub fn draw_quad(
        &mut self,
        position: Vec2,
        size: Vec2,
        color: [f32; 4],
        texture: Option<TextureId>,
    ) -> Option<SealedBatch> {
        let sealed = self.overflows_with(texture).then(|| self.seal());

        let slot = match texture {
            None => WHITE_SLOT,
            Some(id) => self.slots.slot_or_assign(id),
        };
        self.push_quad(position, size, color, slot as f32);
        self.index_count += 6;
        self.stats.quads += 1;
        sealed
    }

    /// Takes the written vertex span and binding snapshot, then resets
    /// for the next batch: index count to zero, slot table to the white
    /// texture only. Counts as one draw call.
    pub fn seal(&mut self) -> SealedBatch {
        let vertices = std::mem::replace(
            &mut self.vertices,
            Vec::with_capacity(self.max_vertex_count),
        );
        let sealed = SealedBatch {
            vertices,
            textures: self.slots.bound().to_vec(),
            index_count: self.index_count,
        };
        self.index_count = 0;
        self.slots.reset();
        self.stats.draw_calls += 1;
        sealed
    }

    fn overflows_with(&self, texture: Option<TextureId>) -> bool {
        if self.index_count >= self.max_index_count {
            return true;
        }
        match texture {
            Some(id) => self.slots.is_full() && !self.slots.contains(id),
            None => false,
        }
    }

    fn push_quad(&mut self, position: Vec2, size: Vec2, color: [f32; 4], tex_slot: f32) {
        let (x, y) = (position.x, position.y);
        let (w, h) = (size.x, size.y);
        self.vertices
            .push(Vertex::new([x, y, 0.0], [0.0, 0.0], color, tex_slot));
        self.vertices
            .push(Vertex::new([x + w, y, 0.0], [1.0, 0.0], color, tex_slot));
        self.vertices
            .push(Vertex::new([x + w, y + h, 0.0], [1.0, 1.0], color, tex_slot));
        self.vertices
            .push(Vertex::new([x, y + h, 0.0], [0.0, 1.0], color, tex_slot));
    }

    /// The vertex span written since the last cursor reset. Uploading
    /// exactly this span keeps unused buffer capacity off the bus.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn slots(&self) -> &TextureSlots {
        &self.slots
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = RenderStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];

    fn batch(max_quads: usize, max_textures: usize) -> QuadBatch {
        QuadBatch::with_capacity(max_quads, max_textures, TextureId::allocate()).unwrap()
    }

    fn draw_colored(batch: &mut QuadBatch) -> Option<SealedBatch> {
        batch.draw_quad(Vec2::ZERO, Vec2::ONE, RED, None)
    }

    #[test]
    fn single_flush_covers_all_quads() {
        let mut batch = batch(100, 16);
        batch.begin();
        for _ in 0..42 {
            assert!(draw_colored(&mut batch).is_none());
        }
        assert_eq!(batch.stats().draw_calls, 0);
        let sealed = batch.seal();
        assert_eq!(sealed.index_count, 42 * 6);
        assert_eq!(batch.stats(), RenderStats { draw_calls: 1, quads: 42 });
    }

    #[test]
    fn overflow_splits_batches() {
        let cap = 4;
        let n = 10;
        let mut batch = batch(cap, 16);
        batch.begin();
        let mut implicit = 0;
        for _ in 0..n {
            if draw_colored(&mut batch).is_some() {
                implicit += 1;
            }
        }
        batch.seal();
        // ceil(10 / 4) - 1 implicit flushes plus the final explicit one
        assert_eq!(implicit, (n + cap - 1) / cap - 1);
        assert_eq!(batch.stats().draw_calls, implicit as u32 + 1);
        assert_eq!(batch.stats().quads, n as u32);
    }

    #[test]
    fn implicit_flush_carries_full_batch() {
        let mut batch = batch(2, 16);
        batch.begin();
        assert!(draw_colored(&mut batch).is_none());
        assert!(draw_colored(&mut batch).is_none());
        let sealed = draw_colored(&mut batch).expect("third quad must overflow");
        assert_eq!(sealed.vertices.len(), 8);
        assert_eq!(sealed.index_count, 12);
        // the overflowing quad itself lands in the fresh batch
        assert_eq!(batch.vertices().len(), 4);
        assert_eq!(batch.index_count(), 6);
    }

    #[test]
    fn same_texture_reuses_slot() {
        let mut batch = batch(10, 16);
        let tex = TextureId::allocate();
        batch.begin();
        batch.draw_quad(Vec2::ZERO, Vec2::ONE, RED, Some(tex));
        batch.draw_quad(Vec2::ONE, Vec2::ONE, RED, Some(tex));
        let slots: Vec<f32> = batch.vertices().iter().map(|v| v.tex_slot()).collect();
        assert!(slots.iter().all(|&s| s == 1.0));
        assert_eq!(batch.slots().bound().len(), 2);
    }

    #[test]
    fn distinct_textures_get_consecutive_slots() {
        let mut batch = batch(10, 16);
        let (a, b) = (TextureId::allocate(), TextureId::allocate());
        batch.begin();
        batch.draw_quad(Vec2::ZERO, Vec2::ONE, RED, Some(a));
        batch.draw_quad(Vec2::ONE, Vec2::ONE, RED, Some(b));
        assert_eq!(batch.slots().slot_of(a), Some(1));
        assert_eq!(batch.slots().slot_of(b), Some(2));
        let white = batch.slots().bound()[0];
        assert_eq!(batch.slots().bound(), [white, a, b]);
    }

    #[test]
    fn slot_exhaustion_triggers_flush() {
        // capacity 4: white plus three free slots
        let mut batch = batch(100, 4);
        batch.begin();
        for _ in 0..3 {
            let tex = TextureId::allocate();
            assert!(batch.draw_quad(Vec2::ZERO, Vec2::ONE, RED, Some(tex)).is_none());
        }
        assert!(batch.slots().is_full());

        let unseen = TextureId::allocate();
        let sealed = batch
            .draw_quad(Vec2::ZERO, Vec2::ONE, RED, Some(unseen))
            .expect("unseen texture on a full table must flush");
        assert_eq!(sealed.textures.len(), 4);
        assert_eq!(batch.stats().draw_calls, 1);
        // the new quad starts the next batch at slot 1
        assert_eq!(batch.slots().slot_of(unseen), Some(1));
        assert_eq!(batch.vertices()[0].tex_slot(), 1.0);
    }

    #[test]
    fn seen_texture_on_full_table_does_not_flush() {
        let mut batch = batch(100, 2);
        let tex = TextureId::allocate();
        batch.begin();
        assert!(batch.draw_quad(Vec2::ZERO, Vec2::ONE, RED, Some(tex)).is_none());
        assert!(batch.slots().is_full());
        assert!(batch.draw_quad(Vec2::ONE, Vec2::ONE, RED, Some(tex)).is_none());
    }

    #[test]
    fn white_texture_keeps_slot_zero() {
        let white = TextureId::allocate();
        let mut batch = QuadBatch::with_capacity(10, 16, white).unwrap();
        batch.begin();
        batch.draw_quad(Vec2::ZERO, Vec2::ONE, RED, Some(TextureId::allocate()));
        draw_colored(&mut batch);
        assert_eq!(batch.slots().slot_of(white), Some(WHITE_SLOT));
        // untextured quads sample the white slot
        assert!(batch.vertices()[4..].iter().all(|v| v.tex_slot() == 0.0));
        let sealed = batch.seal();
        assert_eq!(sealed.textures[0], white);
        // the reservation survives the reset
        assert_eq!(batch.slots().bound(), [white]);
    }

    #[test]
    fn quad_vertex_layout_round_trip() {
        let mut batch = batch(10, 16);
        batch.begin();
        batch.draw_quad(Vec2::new(2.0, 3.0), Vec2::new(1.0, 1.0), RED, None);

        let verts = batch.vertices();
        let positions: Vec<[f32; 3]> = verts.iter().map(|v| v.position()).collect();
        let uvs: Vec<[f32; 2]> = verts.iter().map(|v| v.tex_coord()).collect();
        assert_eq!(
            positions,
            [
                [2.0, 3.0, 0.0],
                [3.0, 3.0, 0.0],
                [3.0, 4.0, 0.0],
                [2.0, 4.0, 0.0]
            ]
        );
        assert_eq!(uvs, [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
        assert!(verts.iter().all(|v| v.color() == RED));
    }

    #[test]
    fn begin_resets_cursor_only() {
        let mut batch = batch(10, 16);
        let tex = TextureId::allocate();
        batch.begin();
        batch.draw_quad(Vec2::ZERO, Vec2::ONE, RED, Some(tex));
        batch.begin();
        assert!(batch.vertices().is_empty());
        assert_eq!(batch.index_count(), 6);
        assert_eq!(batch.slots().slot_of(tex), Some(1));
    }

    #[test]
    fn stats_reset_clears_both_counters() {
        let mut batch = batch(10, 16);
        batch.begin();
        for _ in 0..5 {
            draw_colored(&mut batch);
        }
        batch.seal();
        batch.reset_stats();
        assert_eq!(batch.stats(), RenderStats::default());
    }

    #[test]
    fn rejects_invalid_capacities() {
        let white = TextureId::allocate();
        assert!(matches!(
            QuadBatch::with_capacity(20_000, 16, white),
            Err(BatchError::CapacityTooLarge(_))
        ));
        assert!(matches!(
            QuadBatch::with_capacity(10, 1, white),
            Err(BatchError::TooFewTextureSlots(_))
        ));
    }

    #[test]
    fn vertex_layout_is_stable() {
        // the pipeline's vertex attributes index into this exact layout
        assert_eq!(VERTEX_SIZE, 40);
        let v = Vertex::new([1.0, 2.0, 0.0], [0.5, 0.5], RED, 3.0);
        let bytes: &[u8] = bytemuck::bytes_of(&v);
        let floats: &[f32] = bytemuck::cast_slice(bytes);
        assert_eq!(floats, &[1.0, 2.0, 0.0, 0.5, 0.5, 1.0, 0.0, 0.0, 1.0, 3.0]);
    }
}

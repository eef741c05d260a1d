//! Stand-in for a renderer's terrain objects: one height buffer per loaded chunk.

use std::collections::HashMap;

use strata_stream::{ChunkCoord, ConsumerHandle, SurfaceTable, TerrainSurface};

/// Height buffer for one chunk plus a flag set on every publish.
#[derive(Debug)]
pub struct ChunkSurface {
    pub coord: ChunkCoord,
    heights: Vec<f32>,
    updates: u32,
    dirty: bool,
}

impl ChunkSurface {
    fn new(coord: ChunkCoord, side: usize) -> Self {
        Self {
            coord,
            heights: vec![0.0; side * side],
            updates: 0,
            dirty: false,
        }
    }

    /// Number of times heights were published to this surface.
    pub fn updates(&self) -> u32 {
        self.updates
    }
}

impl TerrainSurface for ChunkSurface {
    fn heights(&self) -> &[f32] {
        &self.heights
    }

    fn set_heights(&mut self, heights: &[f32]) {
        self.heights.copy_from_slice(heights);
        self.updates += 1;
        self.dirty = true;
    }
}

/// Slot table keyed by [`ConsumerHandle`]. Released slots are reused.
#[derive(Debug, Default)]
pub struct SurfaceSlots {
    slots: Vec<Option<ChunkSurface>>,
    free: Vec<u32>,
    by_coord: HashMap<ChunkCoord, ConsumerHandle>,
}

impl SurfaceSlots {
    /// Create a surface for `coord`, or return the existing handle.
    pub fn allocate(&mut self, coord: ChunkCoord, side: usize) -> ConsumerHandle {
        if let Some(&handle) = self.by_coord.get(&coord) {
            return handle;
        }
        let surface = Some(ChunkSurface::new(coord, side));
        let handle = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = surface;
                ConsumerHandle(index)
            }
            None => {
                self.slots.push(surface);
                ConsumerHandle(self.slots.len() as u32 - 1)
            }
        };
        self.by_coord.insert(coord, handle);
        handle
    }

    /// Drop the surface for `coord`.
    pub fn release(&mut self, coord: ChunkCoord) -> bool {
        let Some(handle) = self.by_coord.remove(&coord) else {
            return false;
        };
        self.slots[handle.0 as usize] = None;
        self.free.push(handle.0);
        true
    }

    pub fn len(&self) -> usize {
        self.by_coord.len()
    }

    /// Surfaces published since the last call, clearing their flag.
    pub fn take_dirty(&mut self) -> Vec<&ChunkSurface> {
        let mut dirty = Vec::new();
        for surface in self.slots.iter_mut().flatten() {
            if std::mem::take(&mut surface.dirty) {
                dirty.push(&*surface);
            }
        }
        dirty
    }
}

impl SurfaceTable for SurfaceSlots {
    type Surface = ChunkSurface;

    fn surface_mut(&mut self, handle: ConsumerHandle) -> Option<&mut ChunkSurface> {
        self.slots.get_mut(handle.0 as usize).and_then(Option::as_mut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_is_idempotent_per_chunk() {
        let mut slots = SurfaceSlots::default();
        let a = slots.allocate(ChunkCoord::new(1, 2), 3);
        assert_eq!(slots.allocate(ChunkCoord::new(1, 2), 3), a);
        assert_ne!(slots.allocate(ChunkCoord::new(2, 2), 3), a);
        assert_eq!(slots.len(), 2);
    }

    #[test]
    fn test_released_slot_is_reused() {
        let mut slots = SurfaceSlots::default();
        let a = slots.allocate(ChunkCoord::new(0, 0), 3);
        assert!(slots.release(ChunkCoord::new(0, 0)));
        assert!(!slots.release(ChunkCoord::new(0, 0)));
        assert!(slots.surface_mut(a).is_none());
        let b = slots.allocate(ChunkCoord::new(5, 5), 3);
        assert_eq!(a, b);
        assert_eq!(slots.surface_mut(b).unwrap().coord, ChunkCoord::new(5, 5));
    }

    #[test]
    fn test_take_dirty_reports_each_publish_once() {
        let mut slots = SurfaceSlots::default();
        let handle = slots.allocate(ChunkCoord::new(0, 0), 2);
        slots.allocate(ChunkCoord::new(1, 0), 2);
        slots
            .surface_mut(handle)
            .unwrap()
            .set_heights(&[1.0, 2.0, 3.0, 4.0]);

        let dirty = slots.take_dirty();
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[0].heights(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(dirty[0].updates(), 1);
        assert!(slots.take_dirty().is_empty());
    }
}

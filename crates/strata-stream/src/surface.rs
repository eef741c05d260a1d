//! The consumer side of the pipeline: objects that display chunk heights.

use strata_erosion::{ChunkPlacement, ErosionAlgorithm, grid_side};
use strata_noise::WorldGenerator;

use crate::coord::ConsumerHandle;

/// A renderer-owned object that holds one square height buffer.
pub trait TerrainSurface {
    /// Current heights, row-major, `side × side`.
    fn heights(&self) -> &[f32];

    /// Replace the heights. `heights` always has the same length as the
    /// buffer returned by [`heights`](Self::heights).
    fn set_heights(&mut self, heights: &[f32]);
}

impl TerrainSurface for Vec<f32> {
    fn heights(&self) -> &[f32] {
        self
    }

    fn set_heights(&mut self, heights: &[f32]) {
        self.clear();
        self.extend_from_slice(heights);
    }
}

/// Consumer-owned lookup from [`ConsumerHandle`] to surface.
pub trait SurfaceTable {
    type Surface: TerrainSurface;

    /// The surface behind `handle`, if it still exists.
    fn surface_mut(&mut self, handle: ConsumerHandle) -> Option<&mut Self::Surface>;
}

/// Handles are indices into the vector.
impl<S: TerrainSurface> SurfaceTable for Vec<S> {
    type Surface = S;

    fn surface_mut(&mut self, handle: ConsumerHandle) -> Option<&mut S> {
        self.get_mut(handle.0 as usize)
    }
}

/// Fill a single surface straight from a generator, without streaming.
///
/// The surface's current buffer decides the side length. Each cell becomes
/// `max(generator.height(x, y), floor)`; if `erosion` is given it runs over
/// the whole buffer before the result is published with
/// [`TerrainSurface::set_heights`].
///
/// # Panics
///
/// Panics if the surface's buffer is not square.
pub fn generate_surface<S: TerrainSurface + ?Sized>(
    surface: &mut S,
    generator: &WorldGenerator,
    floor: f32,
    erosion: Option<&mut dyn ErosionAlgorithm>,
) {
    let side = grid_side(surface.heights().len());
    let mut heights = Vec::with_capacity(side * side);
    for y in 0..side {
        for x in 0..side {
            heights.push(generator.height(x as f32, y as f32).max(floor));
        }
    }

    if let Some(erosion) = erosion {
        erosion.set_chunk(ChunkPlacement::default());
        erosion.erode(&mut heights);
        tracing::debug!(side, algorithm = erosion.name(), "surface eroded");
    }
    surface.set_heights(&heights);
}

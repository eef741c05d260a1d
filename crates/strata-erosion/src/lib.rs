//! Heightfield erosion algorithms.
//!
//! Every algorithm rewrites a square `side × side` height buffer in place
//! through the [`ErosionAlgorithm`] trait:
//!
//! - [`DropletErosion`]: particle droplets carving channelized gullies.
//! - [`ShallowWaterErosion`]: a pipe-model water and sediment simulation.
//! - [`RiverCarving`]: valleys built from distance to noise-placed rivers.
//!
//! Randomness comes from a ChaCha stream derived from the world seed and the
//! chunk being eroded (see [`seed`]), so results do not depend on the order
//! chunks are processed in.

mod droplet;
mod kernel;
mod river;
pub mod seed;
mod shallow_water;

use serde::{Deserialize, Serialize};

pub use droplet::{DropletErosion, DropletParams};
pub use kernel::{box_blur, gaussian_blur, grid_side};
pub use river::{
    DistanceField, Neighborhood, RiverCarving, RiverChannelParams, RiverParams, relax_distances,
    smooth_cliffs,
};
pub use shallow_water::{AdvectionMode, ShallowWaterErosion, ShallowWaterParams};

/// Where the buffer handed to [`ErosionAlgorithm::erode`] sits in the world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChunkPlacement {
    /// Chunk the buffer is being eroded for.
    pub chunk_x: i32,
    pub chunk_y: i32,
    /// Global cell coordinate of the buffer's first cell.
    pub origin_x: i64,
    pub origin_y: i64,
}

impl ChunkPlacement {
    pub fn new(chunk_x: i32, chunk_y: i32, origin_x: i64, origin_y: i64) -> Self {
        Self {
            chunk_x,
            chunk_y,
            origin_x,
            origin_y,
        }
    }
}

/// An algorithm that reshapes a square height buffer in place.
///
/// Implementations panic on buffers whose length is not a perfect square.
pub trait ErosionAlgorithm: Send {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Tell the algorithm which chunk the next [`erode`](Self::erode) call is
    /// for. Droplet algorithms reseed their random stream from it; noise
    /// based ones sample the world at the placement origin.
    fn set_chunk(&mut self, placement: ChunkPlacement);

    /// Erode `heights`, a row-major `side × side` buffer.
    fn erode(&mut self, heights: &mut [f32]);
}

/// Selects one of the built-in algorithms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErosionKind {
    #[default]
    Droplet,
    ShallowWater,
    River,
}

impl ErosionKind {
    pub const ALL: [ErosionKind; 3] = [
        ErosionKind::Droplet,
        ErosionKind::ShallowWater,
        ErosionKind::River,
    ];

    /// Lowercase name, matching the command-line spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            ErosionKind::Droplet => "droplet",
            ErosionKind::ShallowWater => "shallow-water",
            ErosionKind::River => "river",
        }
    }
}

impl std::fmt::Display for ErosionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErosionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErosionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown erosion algorithm '{s}'"))
    }
}

/// Tunables for every algorithm, so switching [`ErosionKind`] keeps each
/// algorithm's own settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErosionSettings {
    pub droplet: DropletParams,
    pub shallow_water: ShallowWaterParams,
    pub river: RiverParams,
}

impl ErosionSettings {
    /// Construct the selected algorithm for a world seed.
    pub fn build(&self, kind: ErosionKind, seed: u64) -> Box<dyn ErosionAlgorithm> {
        match kind {
            ErosionKind::Droplet => Box::new(DropletErosion::new(self.droplet.clone(), seed)),
            ErosionKind::ShallowWater => {
                Box::new(ShallowWaterErosion::new(self.shallow_water.clone(), seed))
            }
            ErosionKind::River => Box::new(RiverCarving::new(self.river.clone(), seed)),
        }
    }
}

//! River-valley carving.
//!
//! Rather than simulating flow, this algorithm builds the terrain outright:
//! noise masks mark river cells, every other cell gets its slope-weighted
//! travel distance to the nearest river, and that distance becomes the
//! height. Each cell inherits the slope of the river it drains to, so every
//! basin rises as an even ramp away from its river.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use strata_noise::NoiseLayer;
use strata_noise::presets::{river_masks, river_slope};

use crate::kernel::{box_blur, grid_side};
use crate::{ChunkPlacement, ErosionAlgorithm};

/// Which neighbours a distance step may reach.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Neighborhood {
    /// Edge-adjacent cells only.
    Four,
    /// Edge- and corner-adjacent cells.
    #[default]
    Eight,
}

impl Neighborhood {
    fn offsets(self) -> &'static [(i64, i64)] {
        const FOUR: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
        const EIGHT: [(i64, i64); 8] = [
            (-1, -1),
            (0, -1),
            (1, -1),
            (-1, 0),
            (1, 0),
            (-1, 1),
            (0, 1),
            (1, 1),
        ];
        match self {
            Neighborhood::Four => &FOUR,
            Neighborhood::Eight => &EIGHT,
        }
    }
}

/// Noise periods of one river channel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiverChannelParams {
    /// Period of the notched layer tracing the river course.
    pub course_frequency: f32,
    /// Period of the layer deciding which stretches of the course hold water.
    pub gate_frequency: f32,
}

/// Tunables for [`RiverCarving`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiverParams {
    /// Period of the slope weight noise.
    pub slope_frequency: f32,
    /// Final heights are `distance * slope / divider`, with the slope carried
    /// from the nearest river.
    pub divider: f32,
    /// Largest height step allowed between 4-neighbours by cliff smoothing.
    pub cliff_threshold: f32,
    pub cliff_smoothing: bool,
    /// Side of the box blur kernel applied last.
    pub blur_size: usize,
    pub neighborhood: Neighborhood,
    /// A channel's course must be at or below this for a cell to be a river.
    pub course_cutoff: f32,
    /// A channel's gate must be at or above this for a cell to be a river.
    pub gate_cutoff: f32,
    /// Square the blurred heights, flattening valley floors.
    pub square_output: bool,
    pub channels: Vec<RiverChannelParams>,
}

impl Default for RiverParams {
    fn default() -> Self {
        let channel = |course_frequency, gate_frequency| RiverChannelParams {
            course_frequency,
            gate_frequency,
        };
        Self {
            slope_frequency: 400.0,
            divider: 82.828,
            cliff_threshold: 0.01132,
            cliff_smoothing: false,
            blur_size: 28,
            neighborhood: Neighborhood::Eight,
            course_cutoff: 0.4,
            gate_cutoff: 0.5,
            square_output: true,
            channels: vec![
                channel(1200.0, 800.0),
                channel(1200.0, 800.0),
                channel(200.0, 480.0),
            ],
        }
    }
}

/// Per-cell inputs and result of the distance pass.
#[derive(Clone, Debug)]
pub struct DistanceField {
    /// Slope noise sampled at each cell.
    pub slope: Vec<f32>,
    pub seeds: Vec<bool>,
    pub distance: Vec<f32>,
    /// Slope of the river cell each cell's shortest path starts from.
    pub carried_slope: Vec<f32>,
}

impl DistanceField {
    /// Carved height of cell `idx` before smoothing and blur.
    pub fn height(&self, idx: usize, divider: f32) -> f32 {
        self.distance[idx] * self.carried_slope[idx] / divider
    }
}

/// Distance-to-river valley carving over a square height buffer.
///
/// The input heights are ignored and fully replaced. Noise is sampled at
/// world coordinates (the placement origin plus the local offset), so
/// neighbouring chunks agree along their shared border.
pub struct RiverCarving {
    params: RiverParams,
    slope: NoiseLayer,
    masks: Vec<(NoiseLayer, NoiseLayer)>,
    origin: (i64, i64),
}

impl RiverCarving {
    pub fn new(params: RiverParams, seed: u64) -> Self {
        let seed = seed as u32;
        let periods: Vec<(f32, f32)> = params
            .channels
            .iter()
            .map(|c| (c.course_frequency, c.gate_frequency))
            .collect();
        Self {
            slope: river_slope(seed, params.slope_frequency),
            masks: river_masks(seed, &periods),
            params,
            origin: (0, 0),
        }
    }

    pub fn params(&self) -> &RiverParams {
        &self.params
    }

    /// Whether any channel marks the world cell `(x, y)` as river.
    fn is_river(&self, x: f32, y: f32) -> bool {
        self.masks.iter().any(|(course, gate)| {
            course.noise(x, y) <= self.params.course_cutoff
                && gate.noise(x, y) >= self.params.gate_cutoff
        })
    }

    /// Sample the slope and river masks for a `side × side` buffer at the
    /// current placement and relax distances from the river cells.
    pub fn distance_field(&self, side: usize) -> DistanceField {
        let mut slope = Vec::with_capacity(side * side);
        let mut seeds = Vec::with_capacity(side * side);
        for y in 0..side {
            for x in 0..side {
                let wx = (self.origin.0 + x as i64) as f32;
                let wy = (self.origin.1 + y as i64) as f32;
                slope.push(self.slope.noise(wx, wy));
                seeds.push(self.is_river(wx, wy));
            }
        }
        let (distance, carried_slope) =
            relax_distances(&slope, &seeds, side, self.params.neighborhood);
        DistanceField {
            slope,
            seeds,
            distance,
            carried_slope,
        }
    }
}

impl ErosionAlgorithm for RiverCarving {
    fn name(&self) -> &'static str {
        "river"
    }

    fn set_chunk(&mut self, placement: ChunkPlacement) {
        self.origin = (placement.origin_x, placement.origin_y);
    }

    fn erode(&mut self, heights: &mut [f32]) {
        let side = grid_side(heights.len());
        let field = self.distance_field(side);
        let p = &self.params;

        for (i, height) in heights.iter_mut().enumerate() {
            *height = field.height(i, p.divider);
        }
        if p.cliff_smoothing {
            smooth_cliffs(heights, p.cliff_threshold);
        }
        box_blur(heights, p.blur_size);
        if p.square_output {
            for height in heights.iter_mut() {
                *height *= *height;
            }
        }

        tracing::debug!(
            rivers = field.seeds.iter().filter(|&&s| s).count(),
            side,
            "river carving finished"
        );
    }
}

/// Multi-source shortest distances from every seed cell.
///
/// Returns `(distance, carried_slope)`. A neighbour whose distance improves
/// takes over the slope of the cell it was reached from, so every cell ends
/// up carrying the slope of its seed, and stepping out of a cell costs that
/// carried slope. Cells are re-queued whenever their distance improves. With
/// no seeds at all every distance is zero and slopes are returned unchanged.
pub fn relax_distances(
    slope: &[f32],
    seeds: &[bool],
    side: usize,
    neighborhood: Neighborhood,
) -> (Vec<f32>, Vec<f32>) {
    assert_eq!(slope.len(), side * side, "slope map does not match grid");
    assert_eq!(seeds.len(), side * side, "seed map does not match grid");

    let mut carried = slope.to_vec();
    if !seeds.iter().any(|&s| s) {
        return (vec![0.0; side * side], carried);
    }

    let mut distance = vec![f32::INFINITY; side * side];
    let mut queued = vec![false; side * side];
    let mut queue = VecDeque::new();
    for (idx, _) in seeds.iter().enumerate().filter(|&(_, &s)| s) {
        distance[idx] = 0.0;
        queued[idx] = true;
        queue.push_back(idx);
    }

    while let Some(idx) = queue.pop_front() {
        queued[idx] = false;
        let x = (idx % side) as i64;
        let y = (idx / side) as i64;
        let candidate = distance[idx] + carried[idx];
        let source_slope = carried[idx];

        for &(dx, dy) in neighborhood.offsets() {
            let nx = x + dx;
            let ny = y + dy;
            if nx < 0 || ny < 0 || nx >= side as i64 || ny >= side as i64 {
                continue;
            }
            let n = nx as usize + ny as usize * side;
            if candidate < distance[n] {
                distance[n] = candidate;
                carried[n] = source_slope;
                if !queued[n] {
                    queued[n] = true;
                    queue.push_back(n);
                }
            }
        }
    }

    (distance, carried)
}

/// Lower every cell that stands more than `threshold` above one of its
/// 4-neighbours until no adjacent pair differs by more than `threshold`.
///
/// Lowered cells put their neighbours back on the work list, so the pass
/// runs to a fixed point. Heights never increase.
pub fn smooth_cliffs(heights: &mut [f32], threshold: f32) {
    let side = grid_side(heights.len());
    let neighbours = |idx: usize| {
        let x = idx % side;
        let y = idx / side;
        [
            (x > 0).then(|| idx - 1),
            (x + 1 < side).then(|| idx + 1),
            (y > 0).then(|| idx - side),
            (y + 1 < side).then(|| idx + side),
        ]
        .into_iter()
        .flatten()
    };

    let mut queued = vec![true; heights.len()];
    let mut queue: VecDeque<usize> = (0..heights.len()).collect();
    let mut lowered = 0u64;

    while let Some(idx) = queue.pop_front() {
        queued[idx] = false;
        let lowest = neighbours(idx)
            .map(|n| heights[n])
            .fold(f32::INFINITY, f32::min);
        let limit = lowest + threshold;
        if heights[idx] <= limit {
            continue;
        }

        heights[idx] = limit;
        lowered += 1;
        for n in neighbours(idx) {
            if !queued[n] {
                queued[n] = true;
                queue.push_back(n);
            }
        }
    }

    tracing::trace!(lowered, "cliff smoothing converged");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds_at(side: usize, cells: &[(usize, usize)]) -> Vec<bool> {
        let mut seeds = vec![false; side * side];
        for &(x, y) in cells {
            seeds[x + y * side] = true;
        }
        seeds
    }

    #[test]
    fn test_seed_cells_have_zero_distance() {
        let side = 9;
        let slope = vec![0.5; side * side];
        let seeds = seeds_at(side, &[(1, 1), (7, 4)]);
        let (distance, _) = relax_distances(&slope, &seeds, side, Neighborhood::Eight);
        assert_eq!(distance[1 + side], 0.0);
        assert_eq!(distance[7 + 4 * side], 0.0);
        assert!(distance.iter().all(|d| d.is_finite()));
    }

    #[test]
    fn test_four_neighbourhood_uses_manhattan_steps() {
        let side = 5;
        let slope = vec![1.0; side * side];
        let seeds = seeds_at(side, &[(0, 0)]);
        let (distance, _) = relax_distances(&slope, &seeds, side, Neighborhood::Four);
        assert_eq!(distance[4 + 4 * side], 8.0);

        let (distance, _) = relax_distances(&slope, &seeds, side, Neighborhood::Eight);
        assert_eq!(distance[4 + 4 * side], 4.0);
    }

    #[test]
    fn test_cells_carry_their_river_slope() {
        let side = 3;
        let mut slope = vec![0.9; side * side];
        slope[0] = 0.2;
        let seeds = seeds_at(side, &[(0, 0)]);
        let (distance, carried) = relax_distances(&slope, &seeds, side, Neighborhood::Four);

        // Two steps from the river at the river's slope, not the local 0.9.
        assert!((distance[2] - 0.4).abs() < 1e-6, "got {}", distance[2]);
        assert!((distance[2 + 2 * side] - 0.8).abs() < 1e-6);
        assert!(carried.iter().all(|&s| s == 0.2));

        let field = DistanceField {
            slope,
            seeds,
            distance,
            carried_slope: carried,
        };
        let divider = 2.0;
        assert!((field.height(2, divider) - 0.4 * 0.2 / divider).abs() < 1e-6);
        assert_eq!(field.height(0, divider), 0.0);
    }

    #[test]
    fn test_cheapest_river_wins() {
        let side = 5;
        let mut slope = vec![0.5; side * side];
        slope[0] = 1.0;
        slope[4] = 0.1;
        let seeds = seeds_at(side, &[(0, 0), (4, 0)]);
        let (distance, carried) = relax_distances(&slope, &seeds, side, Neighborhood::Four);

        // Cell (1, 0) is one steep step from the left river but three gentle
        // steps from the right one.
        assert!((distance[1] - 0.3).abs() < 1e-6, "got {}", distance[1]);
        assert_eq!(carried[1], 0.1);
    }

    #[test]
    fn test_no_seeds_gives_zero_distance() {
        let side = 4;
        let slope = vec![0.3; 16];
        let (distance, carried) =
            relax_distances(&slope, &vec![false; 16], side, Neighborhood::Eight);
        assert!(distance.iter().all(|&d| d == 0.0));
        assert_eq!(carried, slope);
    }

    #[test]
    fn test_smooth_cliffs_bounds_adjacent_steps() {
        let side = 16;
        let mut heights: Vec<f32> = (0..side * side)
            .map(|i| ((i * 7919) % 101) as f32 / 100.0)
            .collect();
        let threshold = 0.05;
        smooth_cliffs(&mut heights, threshold);

        for y in 0..side {
            for x in 0..side {
                let h = heights[x + y * side];
                if x + 1 < side {
                    let diff = (h - heights[x + 1 + y * side]).abs();
                    assert!(diff <= threshold + 1e-5, "step {diff} at ({x}, {y})");
                }
                if y + 1 < side {
                    let diff = (h - heights[x + (y + 1) * side]).abs();
                    assert!(diff <= threshold + 1e-5, "step {diff} at ({x}, {y})");
                }
            }
        }
    }

    #[test]
    fn test_smooth_cliffs_keeps_gentle_terrain() {
        let side = 8;
        let original: Vec<f32> = (0..side * side).map(|i| (i % side) as f32 * 0.01).collect();
        let mut heights = original.clone();
        smooth_cliffs(&mut heights, 0.02);
        assert_eq!(heights, original);
    }

    #[test]
    fn test_distance_field_marks_seeds_at_zero() {
        let params = RiverParams {
            channels: vec![RiverChannelParams {
                course_frequency: 12.0,
                gate_frequency: 1000.0,
            }],
            gate_cutoff: 0.0,
            ..Default::default()
        };
        let carving = RiverCarving::new(params, 4);
        let field = carving.distance_field(48);
        assert!(field.seeds.iter().any(|&s| s), "short course period should cross the grid");
        for (i, &seed) in field.seeds.iter().enumerate() {
            if seed {
                assert_eq!(field.distance[i], 0.0);
            }
        }
    }

    #[test]
    fn test_erode_output_is_finite_and_non_negative() {
        let mut heights = vec![0.3; 65 * 65];
        let mut carving = RiverCarving::new(RiverParams::default(), 17);
        carving.set_chunk(ChunkPlacement::new(1, 1, 64, 64));
        carving.erode(&mut heights);
        assert!(heights.iter().all(|h| h.is_finite() && *h >= 0.0));
    }

    #[test]
    fn test_shared_border_matches_between_neighbours() {
        let side = 17;
        let params = RiverParams {
            blur_size: 1,
            channels: vec![RiverChannelParams {
                course_frequency: 10.0,
                gate_frequency: 1000.0,
            }],
            gate_cutoff: 0.0,
            ..Default::default()
        };
        let carving = RiverCarving::new(params, 2);
        let field = carving.distance_field(side);

        let mut shifted = RiverCarving::new(carving.params().clone(), 2);
        shifted.set_chunk(ChunkPlacement::new(1, 0, (side - 1) as i64, 0));
        let right = shifted.distance_field(side);

        // Column side-1 of the left buffer is column 0 of the right one.
        for y in 0..side {
            assert_eq!(field.slope[side - 1 + y * side], right.slope[y * side]);
            assert_eq!(field.seeds[side - 1 + y * side], right.seeds[y * side]);
        }
    }
}

//! Particle-droplet hydraulic erosion.
//!
//! Simulates individual rain droplets running downhill. Each droplet follows
//! the local gradient (smoothed by inertia), picks up sediment while it is
//! fast and carrying less than its capacity, and drops sediment when it slows
//! down, overflows, or climbs. Repeated over many droplets this carves
//! channelized gullies and fills basins.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::kernel::{brush_weights, gaussian_blur, grid_side};
use crate::seed::chunk_rng;
use crate::{ChunkPlacement, ErosionAlgorithm};

/// Tunables for [`DropletErosion`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DropletParams {
    /// Number of droplets simulated per run.
    pub cycles: u32,
    /// Side of the square block of cells a droplet erodes from.
    pub erosion_radius: usize,
    /// Maximum number of steps a droplet lives.
    pub max_path_length: u32,
    /// How much of the previous direction is kept each step, in `[0, 1]`.
    pub inertia: f32,
    /// Slope floor used when computing capacity, so droplets on flat ground
    /// can still carry a little sediment.
    pub min_slope: f32,
    /// Sediment capacity multiplier.
    pub capacity: f32,
    /// Speed gained per unit of height descended.
    pub gravity: f32,
    /// Fraction of water lost per step.
    pub evaporation: f32,
    /// Fraction of excess sediment dropped per step.
    pub deposition: f32,
    /// Fraction of free capacity filled by erosion per step.
    pub erosion: f32,
    /// Starting speed of a droplet.
    pub initial_speed: f32,
    /// Starting water volume of a droplet.
    pub initial_water: f32,
    /// Run a 5×5 Gaussian pass over the result.
    pub smoothing: bool,
}

impl Default for DropletParams {
    fn default() -> Self {
        Self {
            cycles: 70_000,
            erosion_radius: 3,
            max_path_length: 30,
            inertia: 0.05,
            min_slope: 0.01,
            capacity: 4.0,
            gravity: 4.0,
            evaporation: 0.01,
            deposition: 0.3,
            erosion: 0.3,
            initial_speed: 1.0,
            initial_water: 1.0,
            smoothing: false,
        }
    }
}

struct Droplet {
    x: f32,
    y: f32,
    dir_x: f32,
    dir_y: f32,
    speed: f32,
    water: f32,
    sediment: f32,
}

/// Particle-droplet erosion over a square height buffer.
pub struct DropletErosion {
    params: DropletParams,
    seed: u64,
    rng: ChaCha8Rng,
    brush: Vec<(usize, f32)>,
}

impl DropletErosion {
    /// Create the algorithm with the given tunables and world seed.
    ///
    /// # Panics
    ///
    /// Panics if `params.erosion_radius` is zero.
    pub fn new(params: DropletParams, seed: u64) -> Self {
        assert!(params.erosion_radius > 0, "erosion radius must be positive");
        Self {
            params,
            seed,
            rng: chunk_rng(seed, 0, 0),
            brush: Vec::new(),
        }
    }

    /// The configured tunables.
    pub fn params(&self) -> &DropletParams {
        &self.params
    }

    /// Run every droplet once. Returns the sediment carried off the grid by
    /// droplets that left it.
    fn simulate(&mut self, heights: &mut [f32], side: usize) -> f64 {
        let p = &self.params;
        // Droplets live on [0, side - 1) so the four bilinear corners stay in the grid.
        let limit = (side - 1) as f32;
        let inside = |x: f32, y: f32| x >= 0.0 && y >= 0.0 && x < limit && y < limit;

        let mut exited = 0u32;
        let mut lost = 0.0_f64;
        for _ in 0..p.cycles {
            let angle = self.rng.random::<f32>() * std::f32::consts::TAU;
            let mut drop = Droplet {
                x: self.rng.random::<f32>() * limit,
                y: self.rng.random::<f32>() * limit,
                dir_x: angle.cos(),
                dir_y: angle.sin(),
                speed: p.initial_speed,
                water: p.initial_water,
                sediment: 0.0,
            };
            if !inside(drop.x, drop.y) {
                continue;
            }

            let mut in_grid = true;
            for step in 0..p.max_path_length {
                let (height, grad_x, grad_y) = height_and_gradient(heights, side, drop.x, drop.y);

                drop.dir_x = drop.dir_x * p.inertia - grad_x * (1.0 - p.inertia);
                drop.dir_y = drop.dir_y * p.inertia - grad_y * (1.0 - p.inertia);
                let len_sq = drop.dir_x * drop.dir_x + drop.dir_y * drop.dir_y;
                if len_sq < f32::EPSILON {
                    break;
                }
                let len = len_sq.sqrt();
                drop.dir_x /= len;
                drop.dir_y /= len;

                let new_x = drop.x + drop.dir_x;
                let new_y = drop.y + drop.dir_y;
                if !inside(new_x, new_y) {
                    in_grid = false;
                    break;
                }

                let (new_height, _, _) = height_and_gradient(heights, side, new_x, new_y);
                let height_diff = new_height - height;
                let capacity =
                    (-height_diff).max(p.min_slope) * drop.speed * drop.water * p.capacity;

                if drop.sediment > capacity || height_diff > 0.0 {
                    let dropped = if height_diff > 0.0 {
                        height_diff.min(drop.sediment)
                    } else {
                        (drop.sediment - capacity) * p.deposition
                    };
                    deposit(heights, side, drop.x, drop.y, dropped);
                    drop.sediment -= dropped;
                } else {
                    let taken = ((capacity - drop.sediment) * p.erosion).min(-height_diff);
                    let anchor = (drop.x.floor() as i64, drop.y.floor() as i64);
                    brush_weights(
                        (drop.x, drop.y),
                        anchor,
                        p.erosion_radius,
                        side,
                        &mut self.brush,
                    );
                    for &(idx, weight) in &self.brush {
                        heights[idx] -= taken * weight;
                    }
                    drop.sediment += taken;
                }

                let speed_sq = drop.speed * drop.speed - height_diff * p.gravity;
                drop.speed = speed_sq.max(0.0).sqrt();
                drop.water *= 1.0 - p.evaporation;
                drop.x = new_x;
                drop.y = new_y;

                if drop.speed <= 0.0 || drop.water <= 0.0 || step + 1 >= p.max_path_length {
                    break;
                }
            }

            if in_grid {
                // Whatever the droplet still carries settles where it stopped.
                if drop.sediment != 0.0 {
                    deposit(heights, side, drop.x, drop.y, drop.sediment);
                }
            } else {
                exited += 1;
                lost += drop.sediment as f64;
            }
        }

        tracing::debug!(
            cycles = p.cycles,
            exited,
            sediment_lost = lost,
            "droplet erosion finished"
        );
        lost
    }
}

impl ErosionAlgorithm for DropletErosion {
    fn name(&self) -> &'static str {
        "droplet"
    }

    fn set_chunk(&mut self, placement: ChunkPlacement) {
        self.rng = chunk_rng(self.seed, placement.chunk_x, placement.chunk_y);
    }

    fn erode(&mut self, heights: &mut [f32]) {
        let side = grid_side(heights.len());
        if side < 2 {
            return;
        }
        self.simulate(heights, side);
        if self.params.smoothing {
            gaussian_blur(heights);
        }
    }
}

/// Bilinear height and gradient at a fractional position inside the grid.
fn height_and_gradient(heights: &[f32], side: usize, x: f32, y: f32) -> (f32, f32, f32) {
    let ix = x as usize;
    let iy = y as usize;
    let fx = x - ix as f32;
    let fy = y - iy as f32;

    let idx = ix + iy * side;
    let h00 = heights[idx];
    let h10 = heights[idx + 1];
    let h01 = heights[idx + side];
    let h11 = heights[idx + side + 1];

    let grad_x = (h10 - h00) * (1.0 - fy) + (h11 - h01) * fy;
    let grad_y = (h01 - h00) * (1.0 - fx) + (h11 - h10) * fx;
    let height = (1.0 - fy) * ((1.0 - fx) * h00 + fx * h10) + fy * ((1.0 - fx) * h01 + fx * h11);
    (height, grad_x, grad_y)
}

/// Spread `amount` over the four cells around `(x, y)` with bilinear weights.
fn deposit(heights: &mut [f32], side: usize, x: f32, y: f32, amount: f32) {
    let ix = x as usize;
    let iy = y as usize;
    let fx = x - ix as f32;
    let fy = y - iy as f32;

    let idx = ix + iy * side;
    heights[idx] += amount * (1.0 - fx) * (1.0 - fy);
    heights[idx + 1] += amount * fx * (1.0 - fy);
    heights[idx + side] += amount * (1.0 - fx) * fy;
    heights[idx + side + 1] += amount * fx * fy;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ridge(side: usize) -> Vec<f32> {
        (0..side * side)
            .map(|i| {
                let x = (i % side) as f32 / side as f32;
                let y = (i / side) as f32 / side as f32;
                (x * 9.0).sin() * 0.3 + (y * 5.0).cos() * 0.2 + 0.5
            })
            .collect()
    }

    fn quick_params(cycles: u32) -> DropletParams {
        DropletParams {
            cycles,
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_cycles_is_identity() {
        let mut heights = vec![0.0; 257 * 257];
        DropletErosion::new(quick_params(0), 1).erode(&mut heights);
        assert!(heights.iter().all(|&h| h == 0.0));
    }

    #[test]
    fn test_flat_zero_terrain_is_unchanged() {
        let mut heights = vec![0.0; 64 * 64];
        DropletErosion::new(quick_params(2_000), 9).erode(&mut heights);
        assert!(
            heights.iter().all(|&h| h == 0.0),
            "droplets on flat ground have nothing to erode"
        );
    }

    #[test]
    fn test_flat_raised_terrain_is_unchanged() {
        let mut heights = vec![0.5; 48 * 48];
        DropletErosion::new(quick_params(1_000), 4).erode(&mut heights);
        assert!(heights.iter().all(|&h| (h - 0.5).abs() < 1e-5));
    }

    #[test]
    fn test_output_is_finite_and_same_length() {
        let side = 129;
        let mut heights = ridge(side);
        DropletErosion::new(quick_params(5_000), 7).erode(&mut heights);
        assert_eq!(heights.len(), side * side);
        assert!(heights.iter().all(|h| h.is_finite()), "erosion produced NaN/Inf");
    }

    #[test]
    fn test_erosion_changes_sloped_terrain() {
        let side = 65;
        let original = ridge(side);
        let mut heights = original.clone();
        DropletErosion::new(quick_params(3_000), 3).erode(&mut heights);
        assert!(heights.iter().zip(&original).any(|(a, b)| (a - b).abs() > 1e-6));
    }

    #[test]
    fn test_mass_only_leaves_through_edges() {
        // A bowl: every droplet runs toward the centre and none can leave.
        let side = 65;
        let c = (side / 2) as f32;
        let mut heights: Vec<f32> = (0..side * side)
            .map(|i| {
                let dx = (i % side) as f32 - c;
                let dy = (i / side) as f32 - c;
                (dx * dx + dy * dy) / (c * c)
            })
            .collect();
        let before: f64 = heights.iter().map(|&h| h as f64).sum();

        let params = DropletParams {
            cycles: 2_000,
            inertia: 0.0,
            ..Default::default()
        };
        DropletErosion::new(params, 11).erode(&mut heights);
        let after: f64 = heights.iter().map(|&h| h as f64).sum();

        assert!(
            (before - after).abs() < 1e-2,
            "mass drifted from {before} to {after} without droplets leaving"
        );
    }

    #[test]
    fn test_mass_lost_equals_sediment_carried_off_edge() {
        // A plane falling toward x = 0: droplets run off the low edge.
        let side = 65;
        let mut heights: Vec<f32> = (0..side * side)
            .map(|i| (i % side) as f32 / side as f32 + 0.2)
            .collect();
        let before: f64 = heights.iter().map(|&h| h as f64).sum();

        let params = DropletParams {
            cycles: 2_000,
            inertia: 0.0,
            ..Default::default()
        };
        let mut erosion = DropletErosion::new(params, 13);
        let lost = erosion.simulate(&mut heights, side);
        let after: f64 = heights.iter().map(|&h| h as f64).sum();

        assert!(lost > 1.0, "droplets should carry sediment off the edge, lost {lost}");
        assert!(
            (before - after - lost).abs() < 5e-2,
            "removed {} but only {lost} left the grid",
            before - after
        );
    }

    #[test]
    fn test_same_chunk_erodes_identically() {
        let side = 65;
        let mut a = ridge(side);
        let mut b = ridge(side);
        let placement = ChunkPlacement::new(3, 4, 0, 0);

        let mut first = DropletErosion::new(quick_params(1_500), 21);
        first.set_chunk(placement);
        first.erode(&mut a);

        let mut second = DropletErosion::new(quick_params(1_500), 21);
        second.set_chunk(placement);
        second.erode(&mut b);

        assert_eq!(a, b);
    }

    #[test]
    fn test_smoothing_keeps_buffer_finite() {
        let side = 65;
        let mut heights = ridge(side);
        let params = DropletParams {
            cycles: 500,
            smoothing: true,
            ..Default::default()
        };
        DropletErosion::new(params, 2).erode(&mut heights);
        assert!(heights.iter().all(|h| h.is_finite()));
    }

    #[test]
    #[should_panic(expected = "not square")]
    fn test_non_square_buffer_panics() {
        DropletErosion::new(quick_params(1), 0).erode(&mut vec![0.0; 10]);
    }

    #[test]
    #[should_panic(expected = "erosion radius must be positive")]
    fn test_zero_radius_panics() {
        DropletErosion::new(
            DropletParams {
                erosion_radius: 0,
                ..Default::default()
            },
            0,
        );
    }
}

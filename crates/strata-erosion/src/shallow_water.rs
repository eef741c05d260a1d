//! Eulerian shallow-water erosion.
//!
//! Water is tracked per cell instead of per droplet. Each cycle rains on a
//! handful of random cells, moves water between 4-neighbours through a
//! virtual pipe model, derives a velocity field from the net flux, erodes or
//! deposits toward a slope- and speed-dependent capacity, carries suspended
//! sediment along the velocity field, and evaporates a fraction of the water.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::kernel::{brush_weights, grid_side};
use crate::seed::chunk_rng;
use crate::{ChunkPlacement, ErosionAlgorithm};

/// How suspended sediment is looked up at the upstream position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvectionMode {
    /// Take the sediment of the cell containing the upstream point.
    #[default]
    Nearest,
    /// Bilinearly interpolate the four cells around the upstream point.
    Bilinear,
}

/// Tunables for [`ShallowWaterErosion`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShallowWaterParams {
    pub cycles: u32,
    /// Cells that receive rain each cycle.
    pub droplets_per_cycle: u32,
    /// Water added to a rained-on cell, per unit of time step.
    pub water_increment: f32,
    pub pipe_area: f32,
    pub gravity: f32,
    pub pipe_length: f32,
    /// Sediment capacity constant.
    pub capacity: f32,
    pub erosion: f32,
    pub deposition: f32,
    pub evaporation: f32,
    /// Outflows below this are snapped to zero.
    pub flux_epsilon: f32,
    pub time_step: f32,
    /// Side of the block erosion is spread over. `1` erodes only the cell itself.
    pub erosion_radius: usize,
    pub advection: AdvectionMode,
}

impl Default for ShallowWaterParams {
    fn default() -> Self {
        Self {
            cycles: 248,
            droplets_per_cycle: 100,
            water_increment: 0.0316,
            pipe_area: 1.0,
            gravity: 9.81,
            pipe_length: 1.0,
            capacity: 0.003934,
            erosion: 0.084,
            deposition: 0.02,
            evaporation: 0.09,
            flux_epsilon: 1e-6,
            time_step: 1.0,
            erosion_radius: 5,
            advection: AdvectionMode::Nearest,
        }
    }
}

/// Outflow toward each neighbour.
#[derive(Clone, Copy, Default)]
struct Flux {
    left: f32,
    right: f32,
    up: f32,
    down: f32,
}

impl Flux {
    fn total(&self) -> f32 {
        self.left + self.right + self.up + self.down
    }
}

/// Per-cell simulation state, alive for one `erode` call.
#[derive(Clone, Copy, Default)]
struct Cell {
    water: f32,
    flux: Flux,
    velocity_x: f32,
    velocity_y: f32,
    sediment: f32,
}

/// Pipe-model shallow-water erosion over a square height buffer.
pub struct ShallowWaterErosion {
    params: ShallowWaterParams,
    seed: u64,
    rng: ChaCha8Rng,
    brush: Vec<(usize, f32)>,
}

impl ShallowWaterErosion {
    /// # Panics
    ///
    /// Panics if `params.erosion_radius` is zero.
    pub fn new(params: ShallowWaterParams, seed: u64) -> Self {
        assert!(params.erosion_radius > 0, "erosion radius must be positive");
        Self {
            params,
            seed,
            rng: chunk_rng(seed, 0, 0),
            brush: Vec::new(),
        }
    }

    pub fn params(&self) -> &ShallowWaterParams {
        &self.params
    }

    fn rain(&mut self, cells: &mut [Cell], side: usize) {
        let amount = self.params.water_increment * self.params.time_step;
        for _ in 0..self.params.droplets_per_cycle {
            let x = self.rng.random_range(0..side);
            let y = self.rng.random_range(0..side);
            cells[x + y * side].water += amount;
        }
    }

    fn update_flux(&self, heights: &[f32], cells: &mut [Cell], side: usize) {
        let p = &self.params;
        let dt = p.time_step;
        let factor = dt * p.pipe_area * p.gravity / p.pipe_length;

        for y in 0..side {
            for x in 0..side {
                let idx = x + y * side;
                let level = heights[idx] + cells[idx].water;
                let outflow = |previous: f32, neighbour: Option<usize>| -> f32 {
                    // Closed boundary: nothing flows toward a missing neighbour.
                    let Some(n) = neighbour else {
                        return 0.0;
                    };
                    let diff = level - heights[n] - cells[n].water;
                    let flux = (previous + factor * diff).max(0.0);
                    if flux < p.flux_epsilon { 0.0 } else { flux }
                };

                let previous = cells[idx].flux;
                let mut flux = Flux {
                    left: outflow(previous.left, (x > 0).then(|| idx - 1)),
                    right: outflow(previous.right, (x + 1 < side).then(|| idx + 1)),
                    up: outflow(previous.up, (y + 1 < side).then(|| idx + side)),
                    down: outflow(previous.down, (y > 0).then(|| idx - side)),
                };

                let total = flux.total();
                // Never send away more water than the cell holds.
                let scale = if total < f32::EPSILON {
                    0.0
                } else {
                    (cells[idx].water / (total * dt)).min(1.0)
                };
                flux.left *= scale;
                flux.right *= scale;
                flux.up *= scale;
                flux.down *= scale;
                cells[idx].flux = flux;
            }
        }
    }

    fn erode_and_deposit(&mut self, heights: &mut [f32], cells: &mut [Cell], side: usize) {
        let dt = self.params.time_step;

        // Water and velocity are derived from the flux of the whole grid first so
        // every cell sees its neighbours' outflow from the same step.
        for y in 0..side {
            for x in 0..side {
                let idx = x + y * side;
                let from_left = if x > 0 { cells[idx - 1].flux.right } else { 0.0 };
                let from_right = if x + 1 < side { cells[idx + 1].flux.left } else { 0.0 };
                let from_up = if y + 1 < side { cells[idx + side].flux.down } else { 0.0 };
                let from_down = if y > 0 { cells[idx - side].flux.up } else { 0.0 };

                let cell = &cells[idx];
                let inflow = from_left + from_right + from_up + from_down;
                let volume_change = dt * (inflow - cell.flux.total());
                let average_water = cell.water + volume_change / 2.0;

                let move_x = (from_left + cell.flux.right - from_right - cell.flux.left) / 2.0;
                let move_y = (from_down + cell.flux.up - from_up - cell.flux.down) / 2.0;

                let cell = &mut cells[idx];
                cell.water = (cell.water + volume_change).max(0.0);
                if average_water.abs() < f32::EPSILON {
                    cell.velocity_x = 0.0;
                    cell.velocity_y = 0.0;
                } else {
                    cell.velocity_x = move_x / average_water;
                    cell.velocity_y = move_y / average_water;
                }
            }
        }

        let p = &self.params;
        for y in 0..side {
            for x in 0..side {
                let idx = x + y * side;
                let here = heights[idx];
                let left = if x > 0 { heights[idx - 1] } else { here };
                let right = if x + 1 < side { heights[idx + 1] } else { here };
                let up = if y + 1 < side { heights[idx + side] } else { here };
                let down = if y > 0 { heights[idx - side] } else { here };

                let dx_sq = (right - left) * (right - left);
                let dy_sq = (up - down) * (up - down);
                let sin_tilt = (dx_sq + dy_sq).sqrt() / (dx_sq + dy_sq + 1.0).sqrt();

                let cell = cells[idx];
                let speed = (cell.velocity_x * cell.velocity_x
                    + cell.velocity_y * cell.velocity_y)
                    .sqrt();
                let capacity = p.capacity * sin_tilt * speed;

                if capacity > cell.sediment {
                    let removed = p.erosion * (capacity - cell.sediment);
                    brush_weights(
                        (x as f32, y as f32),
                        (x as i64, y as i64),
                        p.erosion_radius,
                        side,
                        &mut self.brush,
                    );
                    for &(target, weight) in &self.brush {
                        heights[target] -= removed * weight;
                    }
                    cells[idx].sediment += removed;
                } else {
                    let added = p.deposition * (cell.sediment - capacity);
                    heights[idx] += added;
                    cells[idx].sediment -= added;
                }
            }
        }
    }

    fn advect_and_evaporate(&self, cells: &mut [Cell], scratch: &mut Vec<f32>, side: usize) {
        let p = &self.params;
        scratch.clear();
        scratch.extend(cells.iter().map(|c| c.sediment));

        for y in 0..side {
            for x in 0..side {
                let idx = x + y * side;
                let cell = cells[idx];
                let source_x = x as f32 - cell.velocity_x * p.time_step;
                let source_y = y as f32 - cell.velocity_y * p.time_step;
                cells[idx].sediment = match p.advection {
                    AdvectionMode::Nearest => sample_nearest(scratch, side, source_x, source_y),
                    AdvectionMode::Bilinear => sample_bilinear(scratch, side, source_x, source_y),
                };
                cells[idx].water *= 1.0 - p.evaporation;
            }
        }
    }
}

impl ErosionAlgorithm for ShallowWaterErosion {
    fn name(&self) -> &'static str {
        "shallow-water"
    }

    fn set_chunk(&mut self, placement: ChunkPlacement) {
        self.rng = chunk_rng(self.seed, placement.chunk_x, placement.chunk_y);
    }

    fn erode(&mut self, heights: &mut [f32]) {
        let side = grid_side(heights.len());
        if side == 0 {
            return;
        }

        let mut cells = vec![Cell::default(); heights.len()];
        let mut scratch = Vec::with_capacity(heights.len());
        for _ in 0..self.params.cycles {
            self.rain(&mut cells, side);
            self.update_flux(heights, &mut cells, side);
            self.erode_and_deposit(heights, &mut cells, side);
            self.advect_and_evaporate(&mut cells, &mut scratch, side);
        }

        let water: f32 = cells.iter().map(|c| c.water).sum();
        let sediment: f32 = cells.iter().map(|c| c.sediment).sum();
        tracing::debug!(
            cycles = self.params.cycles,
            water,
            sediment,
            "shallow-water erosion finished"
        );
    }
}

fn sample_nearest(sediment: &[f32], side: usize, x: f32, y: f32) -> f32 {
    let sx = (x + 0.5).floor();
    let sy = (y + 0.5).floor();
    let limit = side as f32;
    if sx < 0.0 || sy < 0.0 || sx >= limit || sy >= limit {
        return edge_fallback(sediment, side, sx as i64, sy as i64);
    }
    sediment[sx as usize + sy as usize * side]
}

fn sample_bilinear(sediment: &[f32], side: usize, x: f32, y: f32) -> f32 {
    let limit = (side - 1) as f32;
    if side < 2 || x < 0.0 || y < 0.0 || x >= limit || y >= limit {
        return edge_fallback(sediment, side, x.round() as i64, y.round() as i64);
    }
    let ix = x as usize;
    let iy = y as usize;
    let fx = x - ix as f32;
    let fy = y - iy as f32;
    let idx = ix + iy * side;
    (1.0 - fy) * ((1.0 - fx) * sediment[idx] + fx * sediment[idx + 1])
        + fy * ((1.0 - fx) * sediment[idx + side] + fx * sediment[idx + side + 1])
}

/// Average of the (up to) four valid cells closest to an upstream point that
/// lies outside the grid. The point is clamped onto the grid first so there
/// is always at least one candidate.
fn edge_fallback(sediment: &[f32], side: usize, x: i64, y: i64) -> f32 {
    let max = side as i64 - 1;
    let cx = x.clamp(0, max);
    let cy = y.clamp(0, max);

    let mut closest: Vec<(i64, usize)> = Vec::with_capacity(25);
    for oy in -2..=2_i64 {
        for ox in -2..=2_i64 {
            let nx = cx + ox;
            let ny = cy + oy;
            if nx < 0 || ny < 0 || nx > max || ny > max {
                continue;
            }
            let distance = (nx - x) * (nx - x) + (ny - y) * (ny - y);
            closest.push((distance, nx as usize + ny as usize * side));
        }
    }
    closest.sort_by_key(|&(distance, _)| distance);
    closest.truncate(4);

    let total: f32 = closest.iter().map(|&(_, idx)| sediment[idx]).sum();
    total / closest.len() as f32
}

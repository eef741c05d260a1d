//! Grid helpers shared by the erosion algorithms: side length checks,
//! inverse-distance erosion brushes and convolution passes.

/// Side length of a square height buffer.
///
/// # Panics
///
/// Panics if `len` is not a perfect square.
pub fn grid_side(len: usize) -> usize {
    let side = (len as f64).sqrt().round() as usize;
    assert!(
        side * side == len,
        "height buffer of length {len} is not square"
    );
    side
}

/// Inverse-distance weights for the cells of an erosion brush.
///
/// The brush is a `radius × radius` block of cells centred on `anchor`.
/// Each in-grid cell is weighted by how close it is to `center` relative to
/// the nearest and farthest cells of the block, and the weights are
/// normalized to sum to one. Cells outside the grid get no weight, so the
/// full eroded amount always lands inside the grid.
///
/// Results are written to `out` as `(cell index, weight)` pairs.
pub(crate) fn brush_weights(
    center: (f32, f32),
    anchor: (i64, i64),
    radius: usize,
    side: usize,
    out: &mut Vec<(usize, f32)>,
) {
    assert!(radius > 0, "erosion radius must be positive");
    out.clear();

    let half = (radius / 2) as i64;
    let mut nearest = f32::MAX;
    let mut farthest = 0.0_f32;

    for ry in 0..radius as i64 {
        for rx in 0..radius as i64 {
            let x = anchor.0 + rx - half;
            let y = anchor.1 + ry - half;
            if x < 0 || y < 0 || x >= side as i64 || y >= side as i64 {
                continue;
            }
            let dx = center.0 - x as f32;
            let dy = center.1 - y as f32;
            let distance = (dx * dx + dy * dy).sqrt();
            nearest = nearest.min(distance);
            farthest = farthest.max(distance);
            out.push((x as usize + y as usize * side, distance));
        }
    }

    let span = farthest - nearest;
    let mut total = 0.0;
    for (_, weight) in out.iter_mut() {
        *weight = if span > f32::EPSILON {
            1.0 - (*weight - nearest) / span
        } else {
            1.0
        };
        total += *weight;
    }

    if total > 0.0 {
        for (_, weight) in out.iter_mut() {
            *weight /= total;
        }
    }
}

/// 5×5 Gaussian (σ = 1) smoothing of interior cells. Border cells that the
/// kernel cannot cover are copied through unchanged.
pub fn gaussian_blur(heights: &mut [f32]) {
    const SIZE: usize = 5;
    const SIGMA: f32 = 1.0;
    let side = grid_side(heights.len());
    let half = SIZE / 2;
    if side <= SIZE {
        return;
    }

    let mut kernel = [0.0_f32; SIZE * SIZE];
    let mut sum = 0.0;
    for ky in 0..SIZE {
        for kx in 0..SIZE {
            let dx = kx as f32 - half as f32;
            let dy = ky as f32 - half as f32;
            let value = (-(dx * dx + dy * dy) / (2.0 * SIGMA * SIGMA)).exp();
            kernel[kx + ky * SIZE] = value;
            sum += value;
        }
    }
    for value in &mut kernel {
        *value /= sum;
    }

    let source = heights.to_vec();
    for y in half..side - half {
        for x in half..side - half {
            let mut total = 0.0;
            for ky in 0..SIZE {
                for kx in 0..SIZE {
                    let idx = (x + kx - half) + (y + ky - half) * side;
                    total += source[idx] * kernel[kx + ky * SIZE];
                }
            }
            heights[x + y * side] = total;
        }
    }
}

/// Box blur with a `size × size` kernel. Edge cells average only the taps
/// that fall inside the grid.
pub fn box_blur(heights: &mut [f32], size: usize) {
    let side = grid_side(heights.len());
    if size <= 1 || side == 0 {
        return;
    }

    let half = (size / 2) as i64;
    let source = heights.to_vec();
    for y in 0..side as i64 {
        for x in 0..side as i64 {
            let mut total = 0.0;
            let mut taps = 0u32;
            for ky in 0..size as i64 {
                let sy = y + ky - half;
                if sy < 0 || sy >= side as i64 {
                    continue;
                }
                for kx in 0..size as i64 {
                    let sx = x + kx - half;
                    if sx < 0 || sx >= side as i64 {
                        continue;
                    }
                    total += source[sx as usize + sy as usize * side];
                    taps += 1;
                }
            }
            heights[x as usize + y as usize * side] = total / taps as f32;
        }
    }
}

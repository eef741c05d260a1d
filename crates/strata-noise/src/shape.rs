//! Continent silhouettes that bias heights toward the centre of the world.

use serde::{Deserialize, Serialize};

/// Read-time height shaping based on the distance from the world centre.
///
/// The distance `d` is normalized so that `d = 1` is the edge of the inscribed
/// circle (or rounded square). Heights are pulled toward `1.0` with weight
/// `max(0, 1 - d)^smooth_power`, so the centre is always a peak and the
/// terrain past the rim is left untouched.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ShapeMask {
    /// Circular continent.
    CirclePeak {
        /// How quickly heights fade toward 1 near the centre. Larger values
        /// concentrate the peak.
        smooth_power: f32,
    },
    /// Rounded-square continent (superellipse).
    SquarePeak {
        /// Per-axis distance exponent. Must be a positive even number;
        /// higher values give sharper corners.
        angularity: f32,
        /// How quickly heights fade toward 1 near the centre.
        smooth_power: f32,
    },
}

impl ShapeMask {
    /// Normalized distance of `(x, y)` from the centre of a `size`-wide world.
    pub fn distance(&self, size: f32, x: f32, y: f32) -> f32 {
        let half = size * 0.5;
        if half <= 0.0 {
            return 0.0;
        }
        let dx = ((x - half) / half).abs();
        let dy = ((y - half) / half).abs();

        match *self {
            ShapeMask::CirclePeak { .. } => (dx * dx + dy * dy).sqrt(),
            ShapeMask::SquarePeak { angularity, .. } => {
                assert!(
                    angularity > 0.0 && angularity % 2.0 == 0.0,
                    "square peak angularity must be a positive even number, got {angularity}"
                );
                (dx.powf(angularity) + dy.powf(angularity)).powf(1.0 / angularity)
            }
        }
    }

    /// Apply the mask to `height` sampled at `(x, y)`.
    pub fn transform(&self, size: f32, x: f32, y: f32, height: f32) -> f32 {
        let smooth_power = match *self {
            ShapeMask::CirclePeak { smooth_power } | ShapeMask::SquarePeak { smooth_power, .. } => {
                smooth_power
            }
        };

        let d = self.distance(size, x, y);
        let weight = (1.0 - d).max(0.0).powf(smooth_power);
        height + (1.0 - height) * weight
    }
}

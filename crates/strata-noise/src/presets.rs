//! Ready-made generator configurations.

use crate::curve::Curve;
use crate::fractal::FractalNoise;
use crate::generator::{SuccessPredicate, WorldGenerator};
use crate::layer::{BlendMode, HeightField, NoiseLayer};

/// Build the default multiplicative terrain: broad continents, rolling hills
/// and fine surface detail.
///
/// `zoom` scales every octave period; larger values stretch the terrain out.
/// Each layer gets its own seed derived from `seed`.
pub fn default_terrain(seed: u32, zoom: f32) -> WorldGenerator {
    let mut field = HeightField::new(BlendMode::Multiply);

    let continents = FractalNoise::new(seed)
        .with_octave(1.0, 220.0 * zoom)
        .with_octave(0.5, 110.0 * zoom)
        .with_octave(0.25, 55.0 * zoom);
    field.add_layer(NoiseLayer::new(
        continents,
        Curve::from_nodes(&[
            (0.0, 0.0),
            (0.35, 0.1),
            (0.5, 0.55),
            (0.7, 0.85),
            (1.0, 1.0),
        ]),
    ));

    let hills = FractalNoise::new(seed.wrapping_add(1))
        .with_octave(1.0, 60.0 * zoom)
        .with_octave(0.5, 30.0 * zoom)
        .with_octave(0.25, 12.0 * zoom);
    field.add_layer(NoiseLayer::new(
        hills,
        Curve::from_nodes(&[(0.0, 0.55), (0.6, 0.85), (1.0, 1.0)]),
    ));

    let detail = FractalNoise::new(seed.wrapping_add(2)).with_octave(1.0, 6.0 * zoom);
    field.add_layer(NoiseLayer::new(
        detail,
        Curve::from_nodes(&[(0.0, 0.92), (1.0, 1.0)]),
    ));

    WorldGenerator::new(field, 256.0 * zoom)
}

/// Course and gate layers of one river channel.
///
/// The course layer is a notch around the noise midline: it drops to zero
/// along a thin band where the noise crosses 0.5 and is one elsewhere. The
/// gate layer is a plain linear remap and decides which stretches of that
/// band carry water.
pub fn river_channel(seed: u32, course_frequency: f32, gate_frequency: f32) -> (NoiseLayer, NoiseLayer) {
    let course = NoiseLayer::new(
        FractalNoise::new(seed).with_octave(1.0, course_frequency),
        Curve::from_nodes(&[
            (0.0, 1.0),
            (0.45, 1.0),
            (0.5, 0.0),
            (0.55, 1.0),
            (1.0, 1.0),
        ]),
    );
    let gate = NoiseLayer::new(
        FractalNoise::new(seed.wrapping_add(1)).with_octave(1.0, gate_frequency),
        Curve::linear(),
    );
    (course, gate)
}

/// Build one [`river_channel`] per `(course_frequency, gate_frequency)` pair.
/// Channel `i` is seeded from `seed + 1 + 2i` so it never shares a stream with
/// the slope layer made by [`river_slope`].
pub fn river_masks(seed: u32, channels: &[(f32, f32)]) -> Vec<(NoiseLayer, NoiseLayer)> {
    channels
        .iter()
        .enumerate()
        .map(|(i, &(course, gate))| {
            river_channel(seed.wrapping_add(1 + 2 * i as u32), course, gate)
        })
        .collect()
}

/// Single-octave linear layer used as the per-cell slope weight when carving
/// river valleys.
pub fn river_slope(seed: u32, frequency: f32) -> NoiseLayer {
    NoiseLayer::new(
        FractalNoise::new(seed).with_octave(1.0, frequency),
        Curve::linear(),
    )
}

/// Acceptance predicates for a playable world: a coastline crossing
/// `sea_level` somewhere and at least one steep slope.
pub fn standard_predicates(sea_level: f32, min_slope: f32) -> Vec<SuccessPredicate> {
    vec![
        SuccessPredicate::new("coastline", move |current, previous| {
            (current >= sea_level) != (previous >= sea_level)
        }),
        SuccessPredicate::new("steep slope", move |current, previous| {
            (current - previous).abs() >= min_slope
        }),
    ]
}

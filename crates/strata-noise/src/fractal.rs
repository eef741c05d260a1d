//! Weighted multi-octave Perlin noise.
//!
//! Each octave is an explicit `(amplitude, frequency)` pair rather than a
//! lacunarity/persistence progression, so layers can mix arbitrary bands.

use noise::{NoiseFn, Perlin};

/// One weighted frequency band of fractal noise.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Octave {
    /// Weight of this band in the sum.
    pub amplitude: f32,
    /// Spatial period in world units. Coordinates are divided by this value
    /// before sampling, so larger values give broader features.
    pub frequency: f32,
}

/// A weighted sum of Perlin octaves sampled at 2D coordinates.
#[derive(Clone, Debug)]
pub struct FractalNoise {
    perlin: Perlin,
    seed: u32,
    octaves: Vec<Octave>,
}

impl FractalNoise {
    /// Create an empty composition seeded with `seed`.
    pub fn new(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
            seed,
            octaves: Vec::new(),
        }
    }

    /// Append an octave.
    ///
    /// # Panics
    ///
    /// Panics if `frequency` is not strictly positive.
    pub fn add_octave(&mut self, amplitude: f32, frequency: f32) {
        assert!(
            frequency > 0.0,
            "octave frequency must be positive, got {frequency}"
        );
        self.octaves.push(Octave {
            amplitude,
            frequency,
        });
    }

    /// Builder-style variant of [`add_octave`](Self::add_octave).
    pub fn with_octave(mut self, amplitude: f32, frequency: f32) -> Self {
        self.add_octave(amplitude, frequency);
        self
    }

    /// The seed the basis noise was built with.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// The configured octaves in insertion order.
    pub fn octaves(&self) -> &[Octave] {
        &self.octaves
    }

    /// Raw weighted sum `Σ amplitude · perlin(x / frequency, y / frequency)`.
    ///
    /// Each basis sample lies in roughly `[-1, 1]`, so the result lies in
    /// `[-total_amplitude, total_amplitude]`.
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let mut total = 0.0_f64;
        for octave in &self.octaves {
            let freq = octave.frequency as f64;
            let value = self.perlin.get([x as f64 / freq, y as f64 / freq]);
            total += value * octave.amplitude as f64;
        }
        total as f32
    }

    /// The sample remapped into `[0, 1]`, which is the domain curves are defined on.
    ///
    /// Returns `0.5` when the composition has no octaves or only zero amplitudes.
    pub fn sample_unit(&self, x: f32, y: f32) -> f32 {
        let total = self.total_amplitude();
        if total <= 0.0 {
            return 0.5;
        }
        ((self.sample(x, y) / total + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    /// Sum of absolute octave amplitudes.
    pub fn total_amplitude(&self) -> f32 {
        self.octaves.iter().map(|o| o.amplitude.abs()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    fn sampler(seed: u32) -> FractalNoise {
        FractalNoise::new(seed)
            .with_octave(1.0, 64.0)
            .with_octave(0.5, 32.0)
            .with_octave(0.25, 16.0)
    }

    #[test]
    fn test_determinism_same_seed_same_coord() {
        let a = sampler(42);
        let b = sampler(42);
        let h1 = a.sample(100.3, 200.7);
        let h2 = b.sample(100.3, 200.7);
        assert!(
            (h1 - h2).abs() < EPSILON,
            "Same seed + same coord must produce identical value: {h1} vs {h2}"
        );
    }

    #[test]
    fn test_different_seeds_produce_different_values() {
        let a = sampler(1);
        let b = sampler(999);
        let differs = (0..64).any(|i| {
            let x = i as f32 * 7.31 + 0.5;
            (a.sample(x, x * 0.7) - b.sample(x, x * 0.7)).abs() > EPSILON
        });
        assert!(differs, "Different seeds should produce different noise");
    }

    #[test]
    fn test_sample_within_total_amplitude() {
        let noise = sampler(7);
        let max_amp = noise.total_amplitude();
        for x in 0..60 {
            for y in 0..60 {
                let v = noise.sample(x as f32 * 3.7, y as f32 * 2.3);
                assert!(
                    v.abs() <= max_amp + EPSILON,
                    "Sample {v} exceeds total amplitude {max_amp}"
                );
            }
        }
    }

    #[test]
    fn test_unit_sample_in_unit_range() {
        let noise = sampler(11);
        for i in 0..500 {
            let v = noise.sample_unit(i as f32 * 1.37, i as f32 * 0.91);
            assert!((0.0..=1.0).contains(&v), "unit sample {v} outside [0, 1]");
        }
    }

    #[test]
    fn test_no_octaves_is_flat() {
        let noise = FractalNoise::new(3);
        assert_eq!(noise.sample(12.5, 4.25), 0.0);
        assert_eq!(noise.sample_unit(12.5, 4.25), 0.5);
    }

    #[test]
    fn test_zero_amplitude_returns_zero() {
        let noise = FractalNoise::new(5).with_octave(0.0, 50.0);
        assert!(noise.sample(123.4, 456.7).abs() < EPSILON);
    }

    #[test]
    #[should_panic(expected = "frequency must be positive")]
    fn test_zero_frequency_panics() {
        FractalNoise::new(0).add_octave(1.0, 0.0);
    }
}

//! World height queries and seed acceptance testing.

use std::fmt;
use std::sync::Arc;

use crate::layer::HeightField;
use crate::shape::ShapeMask;

/// A named boolean test over two adjacent height samples `(current, previous)`.
///
/// Used by [`WorldGenerator::try_predicates`] to accept or reject a seed,
/// e.g. "somewhere the terrain is steep enough" or "both samples are above
/// sea level".
#[derive(Clone)]
pub struct SuccessPredicate {
    name: String,
    test: Arc<dyn Fn(f32, f32) -> bool + Send + Sync>,
}

impl SuccessPredicate {
    /// Wrap a closure as a predicate.
    pub fn new(name: impl Into<String>, test: impl Fn(f32, f32) -> bool + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            test: Arc::new(test),
        }
    }

    /// The predicate's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the predicate on a `(current, previous)` sample pair.
    pub fn is_true(&self, current: f32, previous: f32) -> bool {
        (self.test)(current, previous)
    }
}

impl fmt::Debug for SuccessPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuccessPredicate")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Composes a [`HeightField`] with an optional [`ShapeMask`] over a world of fixed size.
#[derive(Clone, Debug)]
pub struct WorldGenerator {
    field: HeightField,
    shape: Option<ShapeMask>,
    size: f32,
    peak_lift: Option<f32>,
    predicates: Vec<SuccessPredicate>,
}

impl Default for WorldGenerator {
    fn default() -> Self {
        Self {
            field: HeightField::default(),
            shape: None,
            size: 100.0,
            peak_lift: None,
            predicates: Vec::new(),
        }
    }
}

impl WorldGenerator {
    /// Create a generator around an existing height field.
    pub fn new(field: HeightField, size: f32) -> Self {
        Self {
            field,
            size,
            ..Default::default()
        }
    }

    /// Set the world size used by the shape mask and the predicate scan.
    pub fn set_size(&mut self, size: f32) {
        self.size = size;
    }

    /// The world size.
    pub fn size(&self) -> f32 {
        self.size
    }

    /// Set or clear the continent shape.
    pub fn set_shape(&mut self, shape: Option<ShapeMask>) {
        self.shape = shape;
    }

    /// The continent shape, if any.
    pub fn shape(&self) -> Option<&ShapeMask> {
        self.shape.as_ref()
    }

    /// Set or clear the peak lift threshold.
    ///
    /// Heights above the threshold `t` are pushed up quadratically, which
    /// turns rolling hills above `t` into steeper mountains while leaving
    /// lowlands untouched.
    pub fn set_peak_lift(&mut self, threshold: Option<f32>) {
        self.peak_lift = threshold;
    }

    /// Register an acceptance predicate.
    pub fn add_predicate(&mut self, predicate: SuccessPredicate) {
        self.predicates.push(predicate);
    }

    /// The underlying height field.
    pub fn height_field(&self) -> &HeightField {
        &self.field
    }

    /// Mutable access to the underlying height field.
    pub fn height_field_mut(&mut self) -> &mut HeightField {
        &mut self.field
    }

    /// Height at `(x, y)`.
    ///
    /// Nominally in `[0, 1]`, but blend modes, shapes and the peak lift can
    /// push it outside that range; callers clamp where the range matters.
    pub fn height(&self, x: f32, y: f32) -> f32 {
        let mut height = self.field.height(x, y);

        if let Some(shape) = &self.shape {
            height = shape.transform(self.size, x, y, height);
        }

        if let Some(threshold) = self.peak_lift {
            height = lift_peak(height, threshold);
        }

        height
    }

    /// Scan the world at `step` spacing and check that every predicate holds
    /// for at least one adjacent sample pair.
    ///
    /// The first pass walks columns (`x` outer, `y` inner), the second walks
    /// rows. Satisfied predicates are dropped from the working set as soon
    /// as they succeed. Returns `true` immediately when no predicates are
    /// registered.
    ///
    /// # Panics
    ///
    /// Panics if `step` is zero.
    pub fn try_predicates(&self, step: usize) -> bool {
        assert!(step > 0, "predicate scan step must be positive");

        if self.predicates.is_empty() {
            return true;
        }

        let mut pending: Vec<&SuccessPredicate> = self.predicates.iter().collect();
        let size = self.size.max(0.0) as usize;

        self.scan(&mut pending, size, step, |outer, inner| (outer, inner));
        if pending.is_empty() {
            return true;
        }

        self.scan(&mut pending, size, step, |outer, inner| (inner, outer));
        if !pending.is_empty() {
            tracing::debug!(
                unsatisfied = ?pending.iter().map(|p| p.name()).collect::<Vec<_>>(),
                "seed rejected by predicates"
            );
        }
        pending.is_empty()
    }

    fn scan(
        &self,
        pending: &mut Vec<&SuccessPredicate>,
        size: usize,
        step: usize,
        to_xy: impl Fn(f32, f32) -> (f32, f32),
    ) {
        for outer in (0..size).step_by(step) {
            let (x, y) = to_xy(outer as f32, 0.0);
            let mut previous = self.height(x, y);

            for inner in (1..size).step_by(step) {
                let (x, y) = to_xy(outer as f32, inner as f32);
                let current = self.height(x, y);
                pending.retain(|predicate| !predicate.is_true(current, previous));
                if pending.is_empty() {
                    return;
                }
                previous = current;
            }
        }
    }
}

fn lift_peak(height: f32, threshold: f32) -> f32 {
    if height <= threshold {
        return height;
    }
    let x_offset = 0.5 - threshold;
    let lifted = height + x_offset;
    lifted * lifted + (0.5 - 0.5 * 0.5) - x_offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::Curve;
    use crate::fractal::FractalNoise;
    use crate::layer::{BlendMode, NoiseLayer};

    fn generator(seed: u32) -> WorldGenerator {
        let mut field = HeightField::new(BlendMode::Average);
        field.add_layer(NoiseLayer::new(
            FractalNoise::new(seed).with_octave(1.0, 20.0),
            Curve::linear(),
        ));
        WorldGenerator::new(field, 64.0)
    }

    #[test]
    fn test_height_without_shape_matches_field() {
        let world = generator(3);
        let field = world.height_field().clone();
        assert_eq!(world.height(7.5, 12.25), field.height(7.5, 12.25));
    }

    #[test]
    fn test_shape_is_applied_after_field() {
        let mut world = generator(3);
        let shape = ShapeMask::CirclePeak { smooth_power: 2.0 };
        world.set_shape(Some(shape));
        let raw = world.height_field().height(20.0, 30.0);
        assert_eq!(
            world.height(20.0, 30.0),
            shape.transform(64.0, 20.0, 30.0, raw)
        );
        assert!((world.height(32.0, 32.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_peak_lift_leaves_low_ground_alone() {
        assert_eq!(lift_peak(0.2, 0.25), 0.2);
        // Continuous at the threshold.
        assert!((lift_peak(0.25 + 1e-6, 0.25) - 0.25).abs() < 1e-4);
        assert!(lift_peak(0.6, 0.25) > 0.6);
    }

    #[test]
    fn test_no_predicates_accepts() {
        assert!(generator(1).try_predicates(4));
    }

    #[test]
    fn test_always_true_predicate_accepts() {
        let mut world = generator(1);
        world.add_predicate(SuccessPredicate::new("any", |_, _| true));
        assert!(world.try_predicates(8));
    }

    #[test]
    fn test_impossible_predicate_rejects() {
        let mut world = generator(1);
        world.add_predicate(SuccessPredicate::new("any", |_, _| true));
        world.add_predicate(SuccessPredicate::new("above sky", |h, _| h > 10.0));
        assert!(!world.try_predicates(4));
    }

    #[test]
    fn test_predicates_are_not_consumed_between_calls() {
        let mut world = generator(2);
        world.add_predicate(SuccessPredicate::new("varies", |h, p| h != p));
        let first = world.try_predicates(3);
        let second = world.try_predicates(3);
        assert_eq!(first, second);
    }

    #[test]
    #[should_panic(expected = "step must be positive")]
    fn test_zero_step_panics() {
        generator(0).try_predicates(0);
    }
}

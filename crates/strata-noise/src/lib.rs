//! Procedural height generation: layered fractal noise, remapping curves,
//! blend rules, continent shapes and seed acceptance tests.

mod curve;
mod fractal;
mod generator;
mod layer;
mod shape;

pub mod presets;

pub use curve::Curve;
pub use fractal::{FractalNoise, Octave};
pub use generator::{SuccessPredicate, WorldGenerator};
pub use layer::{BlendMode, HeightField, NoiseLayer};
pub use shape::ShapeMask;

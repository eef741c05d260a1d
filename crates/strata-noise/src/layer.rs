//! Noise layers and their blended combination into a height field.

use serde::{Deserialize, Serialize};

use crate::curve::Curve;
use crate::fractal::FractalNoise;

/// One fractal noise source reshaped by a curve: `value = curve(noise(x, y))`.
#[derive(Clone, Debug)]
pub struct NoiseLayer {
    noise: FractalNoise,
    curve: Curve,
}

impl NoiseLayer {
    /// Create a layer from a noise composition and a remapping curve.
    pub fn new(noise: FractalNoise, curve: Curve) -> Self {
        Self { noise, curve }
    }

    /// Sample the layer. The noise is normalized into `[0, 1]` before the
    /// curve is applied.
    pub fn noise(&self, x: f32, y: f32) -> f32 {
        self.curve.value(self.noise.sample_unit(x, y))
    }

    /// The underlying noise composition.
    pub fn fractal(&self) -> &FractalNoise {
        &self.noise
    }

    /// Mutable access to the noise composition, for adding octaves.
    pub fn fractal_mut(&mut self) -> &mut FractalNoise {
        &mut self.noise
    }

    /// The remapping curve.
    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    /// Mutable access to the remapping curve.
    pub fn curve_mut(&mut self) -> &mut Curve {
        &mut self.curve
    }
}

/// Rule for combining several layers into one height.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendMode {
    /// Product of all layer values.
    Multiply,
    /// Sum of all layer values.
    Add,
    /// Arithmetic mean of all layer values.
    #[default]
    Average,
}

/// An ordered set of noise layers combined by a [`BlendMode`].
#[derive(Clone, Debug, Default)]
pub struct HeightField {
    layers: Vec<NoiseLayer>,
    blend: BlendMode,
}

impl HeightField {
    /// Create an empty height field with the given blend mode.
    pub fn new(blend: BlendMode) -> Self {
        Self {
            layers: Vec::new(),
            blend,
        }
    }

    /// Append a layer. Layers are evaluated in insertion order.
    pub fn add_layer(&mut self, layer: NoiseLayer) {
        self.layers.push(layer);
    }

    /// Change the blend mode.
    pub fn set_blend_mode(&mut self, blend: BlendMode) {
        self.blend = blend;
    }

    /// The current blend mode.
    pub fn blend_mode(&self) -> BlendMode {
        self.blend
    }

    /// The layers in evaluation order.
    pub fn layers(&self) -> &[NoiseLayer] {
        &self.layers
    }

    /// Blend all layers at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the field has no layers and the blend mode is
    /// [`BlendMode::Multiply`] or [`BlendMode::Average`]; both are undefined
    /// for an empty set.
    pub fn height(&self, x: f32, y: f32) -> f32 {
        assert!(
            !self.layers.is_empty() || self.blend == BlendMode::Add,
            "height field needs at least one layer under {:?} blending",
            self.blend
        );

        let mut height = match self.blend {
            BlendMode::Multiply => 1.0,
            BlendMode::Add | BlendMode::Average => 0.0,
        };

        for layer in &self.layers {
            let value = layer.noise(x, y);
            match self.blend {
                BlendMode::Multiply => height *= value,
                BlendMode::Add | BlendMode::Average => height += value,
            }
        }

        if self.blend == BlendMode::Average {
            height /= self.layers.len() as f32;
        }

        height
    }
}

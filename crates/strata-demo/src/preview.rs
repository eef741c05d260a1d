//! Colour-banded PNG previews of chunk heightmaps.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// A 2D preview image stored as row-major RGBA pixels.
#[derive(Clone, Debug)]
pub struct DebugImage {
    pub width: u32,
    pub height: u32,
    /// Length = `width * height * 4`.
    pub pixels: Vec<u8>,
}

impl DebugImage {
    /// Create a black, fully transparent image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width * height * 4) as usize],
        }
    }

    /// Set an opaque pixel.
    ///
    /// # Panics
    ///
    /// Panics if `x >= width` or `y >= height`.
    pub fn set_rgb(&mut self, x: u32, y: u32, (r, g, b): (u8, u8, u8)) {
        let idx = ((y * self.width + x) * 4) as usize;
        self.pixels[idx..idx + 4].copy_from_slice(&[r, g, b, 255]);
    }

    pub fn rgb(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let idx = ((y * self.width + x) * 4) as usize;
        (self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2])
    }

    /// Count distinct colours, ignoring alpha.
    pub fn unique_color_count(&self) -> usize {
        let mut colors = std::collections::HashSet::new();
        for px in self.pixels.chunks_exact(4) {
            colors.insert((px[0], px[1], px[2]));
        }
        colors.len()
    }

    /// Encode as an 8-bit RGBA PNG at `path`.
    pub fn write_png(&self, path: &Path) -> Result<(), png::EncodingError> {
        let writer = BufWriter::new(File::create(path)?);
        let mut encoder = png::Encoder::new(writer, self.width, self.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&self.pixels)?;
        writer.finish()
    }
}

/// Map a height to a colour band relative to `sea_level`.
///
/// Bands: deep water, shallow water, beach, lowlands, mountains, snow.
pub fn height_to_color(height: f32, sea_level: f32) -> (u8, u8, u8) {
    let h = height.clamp(0.0, 1.0);
    if h < sea_level * 0.5 {
        (0, 0, 128)
    } else if h < sea_level {
        (30, 80, 200)
    } else if h < sea_level + 0.02 {
        (220, 200, 130)
    } else if h < 0.55 {
        let t = ((h - sea_level) / (0.55 - sea_level)).clamp(0.0, 1.0);
        (
            (30.0 + t * 80.0) as u8,
            (160.0 - t * 40.0) as u8,
            (30.0 + t * 20.0) as u8,
        )
    } else if h < 0.75 {
        let t = (h - 0.55) / 0.2;
        (
            (110.0 + t * 40.0) as u8,
            (120.0 - t * 50.0) as u8,
            (50.0 + t * 20.0) as u8,
        )
    } else {
        let base = (150.0 + (h - 0.75) / 0.25 * 105.0) as u8;
        (base, base, base)
    }
}

/// Render a row-major `side × side` height buffer.
pub fn render_heights(heights: &[f32], side: usize, sea_level: f32) -> DebugImage {
    let mut image = DebugImage::new(side as u32, side as u32);
    for (i, &h) in heights.iter().enumerate().take(side * side) {
        image.set_rgb((i % side) as u32, (i / side) as u32, height_to_color(h, sea_level));
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands_by_height() {
        assert_eq!(height_to_color(0.0, 0.3), (0, 0, 128));
        assert_eq!(height_to_color(0.2, 0.3), (30, 80, 200));
        assert_eq!(height_to_color(0.31, 0.3), (220, 200, 130));
        assert_eq!(height_to_color(1.0, 0.3), (255, 255, 255));
        // Out-of-range heights are clamped.
        assert_eq!(height_to_color(-4.0, 0.3), height_to_color(0.0, 0.3));
    }

    #[test]
    fn test_render_ramp_uses_several_bands() {
        let side = 16;
        let heights: Vec<f32> = (0..side * side)
            .map(|i| (i % side) as f32 / (side - 1) as f32)
            .collect();
        let image = render_heights(&heights, side, 0.3);
        assert_eq!((image.width, image.height), (16, 16));
        assert!(image.unique_color_count() > 5);
        assert_eq!(image.rgb(0, 3), (0, 0, 128));
        assert_eq!(image.rgb(15, 3), (255, 255, 255));
    }

    #[test]
    fn test_write_png_round_trip_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunk.png");
        let image = render_heights(&vec![0.5; 9 * 9], 9, 0.3);
        image.write_png(&path).unwrap();

        let decoder = png::Decoder::new(File::open(&path).unwrap());
        let reader = decoder.read_info().unwrap();
        assert_eq!(reader.info().width, 9);
        assert_eq!(reader.info().height, 9);
        assert_eq!(reader.info().color_type, png::ColorType::Rgba);
    }

    #[test]
    fn test_write_png_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let image = DebugImage::new(2, 2);
        assert!(image.write_png(&dir.path().join("nope").join("x.png")).is_err());
    }
}

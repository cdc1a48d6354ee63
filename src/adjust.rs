//! Pixel adjustments applied to a single raster layer.

use image::{imageops, Rgba, RgbaImage};

const BLUR_SIGMA_MAX: f32 = 100.0;

/// Factors follow the usual filter conventions: `1.0` is the identity for
/// brightness and contrast, `0.0` turns the image black or flat grey.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Adjustment {
    Brightness(f32),
    Contrast(f32),
    Grayscale,
    Invert,
    Blur { sigma: f32 },
    HueRotate { degrees: i32 },
    Sepia,
}

impl Adjustment {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Brightness(_) => "Brightness",
            Self::Contrast(_) => "Contrast",
            Self::Grayscale => "Grayscale",
            Self::Invert => "Invert",
            Self::Blur { .. } => "Blur",
            Self::HueRotate { .. } => "Hue rotate",
            Self::Sepia => "Sepia",
        }
    }

    /// Returns the adjusted copy. Only blur touches alpha.
    pub fn apply(&self, source: &RgbaImage) -> RgbaImage {
        match *self {
            Self::Brightness(factor) => {
                let factor = sanitize_factor(factor);
                map_rgb(source, |c| c * factor)
            }
            Self::Contrast(factor) => {
                let factor = sanitize_factor(factor);
                map_rgb(source, |c| (c - 127.5) * factor + 127.5)
            }
            Self::Grayscale => map_pixels(source, |[r, g, b]| {
                let luma = 0.2126 * r + 0.7152 * g + 0.0722 * b;
                [luma, luma, luma]
            }),
            Self::Invert => {
                let mut out = source.clone();
                imageops::invert(&mut out);
                out
            }
            Self::Blur { sigma } => {
                if !(sigma.is_finite() && sigma > 0.0) {
                    return source.clone();
                }
                imageops::blur(source, sigma.min(BLUR_SIGMA_MAX))
            }
            Self::HueRotate { degrees } => imageops::huerotate(source, degrees.rem_euclid(360)),
            Self::Sepia => map_pixels(source, |[r, g, b]| {
                [
                    0.393 * r + 0.769 * g + 0.189 * b,
                    0.349 * r + 0.686 * g + 0.168 * b,
                    0.272 * r + 0.534 * g + 0.131 * b,
                ]
            }),
        }
    }
}

fn sanitize_factor(factor: f32) -> f32 {
    if factor.is_finite() {
        factor.max(0.0)
    } else {
        1.0
    }
}

fn map_rgb(source: &RgbaImage, channel: impl Fn(f32) -> f32) -> RgbaImage {
    map_pixels(source, |[r, g, b]| [channel(r), channel(g), channel(b)])
}

fn map_pixels(source: &RgbaImage, pixel: impl Fn([f32; 3]) -> [f32; 3]) -> RgbaImage {
    let mut out = source.clone();
    for Rgba([r, g, b, _]) in out.pixels_mut() {
        let [nr, ng, nb] = pixel([f32::from(*r), f32::from(*g), f32::from(*b)]);
        *r = to_channel(nr);
        *g = to_channel(ng);
        *b = to_channel(nb);
    }
    out
}

fn to_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

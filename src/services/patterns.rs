//! Synthetic source images.

use pixel_pipeline::{BitmapData, Color32, KnownPixelFormat};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::AppError;
use crate::models::{Pattern, SourceConfig};

/// Side of a checkerboard cell in pixels.
const CHECKER_CELL: usize = 8;

/// Render the configured pattern into a new 32bpp ARGB bitmap.
pub fn generate(config: &SourceConfig) -> Result<BitmapData<'static>, AppError> {
    let SourceConfig {
        pattern,
        width,
        height,
        seed,
    } = *config;
    let mut bitmap = BitmapData::new(width, height, KnownPixelFormat::Format32bppArgb)?;
    let mut rng = StdRng::seed_from_u64(seed);

    let span = |n: usize| (n.max(2) - 1) as f32;
    for y in 0..height {
        let fy = y as f32 / span(height);
        for x in 0..width {
            let fx = x as f32 / span(width);
            let color = match pattern {
                Pattern::Gradient => Color32::from_gray(unit_to_byte(fx)),
                Pattern::Hue => {
                    let (r, g, b) = hsv_to_rgb(fx * 360.0, 1.0 - 0.5 * fy, 1.0 - 0.6 * fy);
                    Color32::from_rgb(r, g, b)
                }
                Pattern::Checker => {
                    if (x / CHECKER_CELL + y / CHECKER_CELL) % 2 == 0 {
                        Color32::from_rgb(0x1f, 0x3a, 0x93)
                    } else {
                        Color32::from_rgb(0xf5, 0xa6, 0x23)
                    }
                }
                Pattern::Noise => Color32::from_rgb(rng.gen(), rng.gen(), rng.gen()),
                Pattern::Alpha => {
                    let (r, g, b) = hsv_to_rgb(fx * 300.0, 0.9, 1.0);
                    Color32::new(unit_to_byte(1.0 - fy), r, g, b)
                }
            };
            bitmap.set_color32(x, y, color)?;
        }
    }

    tracing::debug!(pattern = pattern.name(), width, height, "Generated source pattern");
    Ok(bitmap)
}

fn unit_to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// `h` in degrees, `s` and `v` in 0..=1.
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (u8, u8, u8) {
    let h = h.rem_euclid(360.0) / 60.0;
    let c = v * s;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    (unit_to_byte(r + m), unit_to_byte(g + m), unit_to_byte(b + m))
}

//! Built-in palettes.

use super::Palette;
use crate::color::Color32;

/// The 16 standard system colors, in their usual 4bpp order.
const SYSTEM_COLORS: [u32; 16] = [
    0xFF000000, 0xFF800000, 0xFF008000, 0xFF808000, 0xFF000080, 0xFF800080, 0xFF008080,
    0xFFC0C0C0, 0xFF808080, 0xFFFF0000, 0xFF00FF00, 0xFFFFFF00, 0xFF0000FF, 0xFFFF00FF,
    0xFF00FFFF, 0xFFFFFFFF,
];

// Every table below has 2..=256 entries.
fn build(entries: Vec<Color32>) -> Palette {
    Palette::from_entries(entries)
}

fn gray_ramp(levels: usize) -> Vec<Color32> {
    let step = 255 / (levels - 1);
    (0..levels).map(|i| Color32::from_gray((i * step) as u8)).collect()
}

impl Palette {
    /// Black and white.
    pub fn black_and_white() -> Palette {
        build(vec![Color32::BLACK, Color32::WHITE])
    }

    /// 0, 85, 170 and 255.
    pub fn grayscale4() -> Palette {
        build(gray_ramp(4))
    }

    /// 16 evenly spaced gray levels (step 17).
    pub fn grayscale16() -> Palette {
        build(gray_ramp(16))
    }

    /// All 256 gray levels.
    pub fn grayscale256() -> Palette {
        build(gray_ramp(256))
    }

    /// The 16 system colors.
    pub fn system_4bpp() -> Palette {
        build(SYSTEM_COLORS.iter().map(|&c| Color32::from_argb_u32(c)).collect())
    }

    /// 256 colors: the 16 system colors, the 216 web-safe colors and 24
    /// additional gray shades.
    pub fn system_8bpp() -> Palette {
        let mut entries: Vec<Color32> = SYSTEM_COLORS
            .iter()
            .map(|&c| Color32::from_argb_u32(c))
            .collect();
        for r in 0..6u8 {
            for g in 0..6u8 {
                for b in 0..6u8 {
                    entries.push(Color32::from_rgb(r * 51, g * 51, b * 51));
                }
            }
        }
        entries.extend((0..24u8).map(|i| Color32::from_gray(8 + i * 10)));
        build(entries)
    }

    /// 3 bits red, 3 bits green, 2 bits blue; the index is the packed RGB332 value.
    pub fn rgb332() -> Palette {
        let expand3 = |v: u8| ((v as u32 * 255 + 3) / 7) as u8;
        build(
            (0..=255u8)
                .map(|i| Color32::from_rgb(expand3(i >> 5), expand3((i >> 2) & 7), (i & 3) * 85))
                .collect(),
        )
    }

    /// Default palette of an indexed format with `bits_per_pixel` bits.
    ///
    /// 1 bit: black and white, 2 bits: 4 grays, 4 bits: system colors,
    /// 8 bits and more: the 256-color system palette. Other sizes take the
    /// leading entries of the next larger palette.
    pub fn for_format(bits_per_pixel: u8) -> Palette {
        match bits_per_pixel {
            0 | 1 => Palette::black_and_white(),
            2 => Palette::grayscale4(),
            4 => Palette::system_4bpp(),
            3 => build(Palette::system_4bpp().entries()[..8].to_vec()),
            5..=7 => build(Palette::system_8bpp().entries()[..1 << bits_per_pixel].to_vec()),
            _ => Palette::system_8bpp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(Palette::black_and_white().len(), 2);
        assert_eq!(Palette::grayscale4().len(), 4);
        assert_eq!(Palette::grayscale16().len(), 16);
        assert_eq!(Palette::grayscale256().len(), 256);
        assert_eq!(Palette::system_4bpp().len(), 16);
        assert_eq!(Palette::system_8bpp().len(), 256);
        assert_eq!(Palette::rgb332().len(), 256);
    }

    #[test]
    fn test_gray_ramps_end_at_white() {
        for palette in [Palette::grayscale4(), Palette::grayscale16(), Palette::grayscale256()] {
            assert_eq!(palette.get(0), Some(Color32::BLACK));
            assert_eq!(palette.entries().last(), Some(&Color32::WHITE));
            assert!(palette.is_grayscale());
        }
        assert_eq!(Palette::grayscale4().get(1), Some(Color32::from_gray(85)));
    }

    #[test]
    fn test_rgb332_layout() {
        let palette = Palette::rgb332();
        assert_eq!(palette.get(0), Some(Color32::BLACK));
        assert_eq!(palette.get(255), Some(Color32::WHITE));
        assert_eq!(palette.get(0b111_000_00), Some(Color32::from_rgb(255, 0, 0)));
        assert_eq!(palette.get(0b000_000_11), Some(Color32::from_rgb(0, 0, 255)));
    }

    #[test]
    fn test_system_8bpp_extra_grays_are_new() {
        let palette = Palette::system_8bpp();
        let web_safe = &palette.entries()[16..232];
        for gray in &palette.entries()[232..] {
            assert!(!web_safe.contains(gray), "{gray:?}");
        }
        assert!(!palette.has_alpha());
    }

    #[test]
    fn test_for_format() {
        assert_eq!(Palette::for_format(1).len(), 2);
        assert_eq!(Palette::for_format(3).len(), 8);
        assert_eq!(Palette::for_format(4), Palette::system_4bpp());
        assert_eq!(Palette::for_format(6).len(), 64);
        assert_eq!(Palette::for_format(16).len(), 256);
    }
}

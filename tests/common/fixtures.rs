//! Test fixtures and constants.

/// A complete configuration touching every section.
pub const FULL_CONFIG: &str = r##"
source:
  pattern: gradient
  width: 48
  height: 12
  seed: 5
target_format: 4bppIndexed
quantizer:
  kind: median-cut
  colors: 6
  back_color: "#FFFFFF"
  color_space: linear
ditherer:
  kind: atkinson
  serpentine: true
threads: 2
"##;

/// A fixed four-color palette.
pub const PALETTE_CONFIG: &str = r##"
source:
  pattern: hue
  width: 20
  height: 20
target_format: 4bppIndexed
quantizer:
  kind: palette
  palette: ["#000000", "#FF0000", "#00FF00", "#0000FF"]
ditherer:
  kind: bayer4x4
"##;

/// Ditherer names accepted by the runner, one per ditherer family.
pub const DITHERERS: &[&str] = &[
    "floyd-steinberg",
    "sierra-lite",
    "bayer8x8",
    "dotted-halftone",
    "blue-noise",
    "random-noise",
    "interleaved-gradient-noise",
];

use std::path::Path;

use pixel_pipeline::{
    kernel_by_name, Color32, Ditherer, ErrorDiffusionDitherer, InterleavedGradientNoiseDitherer,
    KnownPixelFormat, OrderedDitherer, Palette, PredefinedQuantizer, Quantizer, RandomNoiseDitherer,
    WorkingColorSpace,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Largest pattern side the runner accepts.
pub const MAX_SIDE: usize = 4096;

/// A conversion run loaded from YAML
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// The synthetic source image
    pub source: SourceConfig,

    /// Pixel format of the result, e.g. `8bppIndexed`
    pub target_format: String,

    /// Color reduction; when missing the target format decides
    pub quantizer: Option<QuantizerConfig>,

    /// Dithering; when missing colors are mapped directly
    pub ditherer: Option<DithererConfig>,

    /// Worker threads, 0 for all cores
    pub threads: usize,

    /// Print an ASCII preview of the result
    pub preview: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            target_format: KnownPixelFormat::Format8bppIndexed.name().to_string(),
            quantizer: Some(QuantizerConfig::default()),
            ditherer: None,
            threads: 0,
            preview: false,
        }
    }
}

/// Test pattern kinds
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Pattern {
    /// Horizontal black to white ramp
    Gradient,
    /// Hue sweep with a vertical lightness ramp
    #[default]
    Hue,
    /// Two-color checkerboard
    Checker,
    /// Seeded random colors
    Noise,
    /// Color ramp over a vertical alpha ramp
    Alpha,
}

impl Pattern {
    pub const ALL: [Pattern; 5] = [
        Pattern::Gradient,
        Pattern::Hue,
        Pattern::Checker,
        Pattern::Noise,
        Pattern::Alpha,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Pattern::Gradient => "gradient",
            Pattern::Hue => "hue",
            Pattern::Checker => "checker",
            Pattern::Noise => "noise",
            Pattern::Alpha => "alpha",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    pub pattern: Pattern,
    pub width: usize,
    pub height: usize,
    /// Seed of the noise pattern
    pub seed: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            pattern: Pattern::default(),
            width: 64,
            height: 32,
            seed: 1,
        }
    }
}

/// Working color space names as written in the config
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    #[default]
    Default,
    Srgb,
    Linear,
}

impl From<ColorSpace> for WorkingColorSpace {
    fn from(space: ColorSpace) -> Self {
        match space {
            ColorSpace::Default => WorkingColorSpace::Default,
            ColorSpace::Srgb => WorkingColorSpace::Srgb,
            ColorSpace::Linear => WorkingColorSpace::Linear,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct QuantizerConfig {
    /// `octree`, `median-cut`, `wu`, `palette` or a predefined set such as
    /// `grayscale16` or `rgb565`
    pub kind: String,

    /// Palette size of the optimizing quantizers
    pub colors: usize,

    /// Octree depth or Wu histogram resolution
    pub bit_level: Option<u8>,

    /// Hex color partially transparent pixels are blended against
    pub back_color: Option<String>,

    pub alpha_threshold: Option<u8>,

    pub color_space: ColorSpace,

    /// Entries of the `palette` kind, as hex colors
    pub palette: Vec<String>,
}

impl Default for QuantizerConfig {
    fn default() -> Self {
        Self {
            kind: "wu".to_string(),
            colors: 16,
            bit_level: None,
            back_color: None,
            alpha_threshold: None,
            color_space: ColorSpace::Default,
            palette: Vec::new(),
        }
    }
}

fn predefined_by_name(name: &str) -> Option<PredefinedQuantizer> {
    use PredefinedQuantizer::*;
    [
        BlackAndWhite,
        Grayscale4,
        Grayscale16,
        Grayscale256,
        SystemDefault4Bpp,
        SystemDefault8Bpp,
        Rgb332,
        Rgb888,
        Rgb565,
        Rgb555,
        Argb1555,
        Argb8888,
        Grayscale,
    ]
    .into_iter()
    .find(|kind| kind.name() == name)
}

impl QuantizerConfig {
    pub fn build(&self) -> Result<Quantizer, AppError> {
        let name = self.kind.trim().to_ascii_lowercase();
        let mut quantizer = match name.as_str() {
            "octree" => Quantizer::octree(self.colors),
            "median-cut" | "mediancut" => Quantizer::median_cut(self.colors),
            "wu" => Quantizer::wu(self.colors),
            "palette" => {
                let entries = self
                    .palette
                    .iter()
                    .map(|c| c.parse::<Color32>())
                    .collect::<Result<Vec<_>, _>>()?;
                Quantizer::from_palette(Palette::new(entries)?)
            }
            other => predefined_by_name(other)
                .map(Quantizer::predefined)
                .ok_or_else(|| AppError::UnknownQuantizer(self.kind.clone()))?,
        };

        if let Some(color) = &self.back_color {
            quantizer = quantizer.with_back_color(color.parse()?);
        }
        if let Some(threshold) = self.alpha_threshold {
            quantizer = quantizer.with_alpha_threshold(threshold);
        }
        if let Some(level) = self.bit_level {
            quantizer = quantizer.with_bit_level(level);
        }
        Ok(quantizer.with_working_color_space(self.color_space.into()))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct DithererConfig {
    /// A kernel (`floyd-steinberg`, `atkinson`, ...), a matrix (`bayer8x8`,
    /// `dotted-halftone`, `blue-noise`), `random-noise`,
    /// `interleaved-gradient-noise` or `none`
    pub kind: String,

    /// 0.0..=1.0; missing means automatic for ordered and noise ditherers
    pub strength: Option<f32>,

    /// Error diffusion only
    pub serpentine: bool,

    /// Error diffusion only; missing follows the quantizer
    pub by_brightness: Option<bool>,

    /// Random noise only
    pub seed: Option<u64>,
}

impl Default for DithererConfig {
    fn default() -> Self {
        Self {
            kind: "floyd-steinberg".to_string(),
            strength: None,
            serpentine: false,
            by_brightness: None,
            seed: None,
        }
    }
}

impl DithererConfig {
    /// `None` for the `none` kind.
    pub fn build(&self) -> Result<Option<Ditherer>, AppError> {
        let name = self.kind.trim().to_ascii_lowercase();
        let ditherer: Ditherer = match name.as_str() {
            "none" | "" => return Ok(None),
            "bayer2x2" => OrderedDitherer::bayer2x2().into(),
            "bayer4x4" => OrderedDitherer::bayer4x4().into(),
            "bayer8x8" => OrderedDitherer::bayer8x8().into(),
            "dotted-halftone" => OrderedDitherer::dotted_halftone().into(),
            "blue-noise" => OrderedDitherer::blue_noise().into(),
            "random-noise" | "white-noise" => {
                let noise = RandomNoiseDitherer::new();
                match self.seed {
                    Some(seed) => noise.with_seed(seed).into(),
                    None => noise.into(),
                }
            }
            "interleaved-gradient-noise" | "ign" => InterleavedGradientNoiseDitherer::new().into(),
            other => {
                let kernel = kernel_by_name(other)
                    .ok_or_else(|| AppError::UnknownDitherer(self.kind.clone()))?;
                let mut diffusion = ErrorDiffusionDitherer::new(kernel).with_serpentine(self.serpentine);
                if let Some(by_brightness) = self.by_brightness {
                    diffusion = diffusion.with_by_brightness(by_brightness);
                }
                diffusion.into()
            }
        };
        Ok(Some(match self.strength {
            Some(strength) => ditherer.with_strength(strength),
            None => ditherer,
        }))
    }
}

impl RunConfig {
    pub fn from_yaml(content: &str) -> Result<Self, AppError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;
        tracing::info!(
            path = %path.display(),
            pattern = config.source.pattern.name(),
            target = %config.target_format,
            "Loaded run configuration"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let SourceConfig { width, height, .. } = self.source;
        if !(1..=MAX_SIDE).contains(&width) || !(1..=MAX_SIDE).contains(&height) {
            return Err(AppError::Invalid(format!(
                "source size {width}x{height} must be within 1..={MAX_SIDE}"
            )));
        }
        self.target_format()?;
        Ok(())
    }

    pub fn target_format(&self) -> Result<KnownPixelFormat, AppError> {
        Ok(self.target_format.parse()?)
    }

    /// Apply command line settings on top of the file.
    pub fn with_overrides(mut self, overrides: &Overrides) -> Self {
        if overrides.quantizer.is_some() || overrides.colors.is_some() {
            let quantizer = self.quantizer.get_or_insert_with(QuantizerConfig::default);
            if let Some(kind) = &overrides.quantizer {
                quantizer.kind = kind.clone();
            }
            if let Some(colors) = overrides.colors {
                quantizer.colors = colors;
            }
        }
        if let Some(kind) = &overrides.ditherer {
            self.ditherer.get_or_insert_with(DithererConfig::default).kind = kind.clone();
        }
        if let Some(threads) = overrides.threads {
            self.threads = threads;
        }
        if let Some(format) = &overrides.format {
            self.target_format = format.clone();
        }
        self
    }
}

/// Settings given on the command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub quantizer: Option<String>,
    pub colors: Option<usize>,
    pub ditherer: Option<String>,
    pub threads: Option<usize>,
    pub format: Option<String>,
}

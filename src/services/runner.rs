//! Runs a configured conversion and measures the result.

use std::fmt::Write as _;
use std::time::Instant;

use pixel_pipeline::{
    clone_bitmap, BitmapData, DrawingError, KnownPixelFormat, OperationContext, WorkingColorSpace,
};
use serde::Serialize;

use crate::error::AppError;
use crate::models::RunConfig;
use crate::services::patterns;

/// Characters of the preview from dark to light.
const PREVIEW_RAMP: &[u8] = b" .:-=+*#%@";
const PREVIEW_MAX_COLUMNS: usize = 64;

/// Outcome of a run
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunReport {
    pub pattern: String,
    pub width: usize,
    pub height: usize,
    pub target_format: String,
    /// Quantizer name, `None` when the target format picked the colors
    pub quantizer: Option<String>,
    pub ditherer: Option<String>,
    pub threads: usize,
    /// Palette of an indexed result as hex colors
    pub palette: Vec<String>,
    pub distinct_colors: usize,
    /// Mean squared error over premultiplied ARGB channels
    pub mse: f64,
    /// Peak signal to noise ratio in dB, `None` for an exact result
    pub psnr: Option<f64>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

/// Generate the source, convert it and report on the result.
pub fn run(config: &RunConfig) -> Result<RunReport, AppError> {
    config.validate()?;
    let format = config.target_format()?;
    let quantizer = config.quantizer.as_ref().map(|q| q.build()).transpose()?;
    let ditherer = config
        .ditherer
        .as_ref()
        .map(|d| d.build())
        .transpose()?
        .flatten();

    let source = patterns::generate(&config.source)?;
    let ctx = OperationContext::new().with_max_parallelism(config.threads);

    let started = Instant::now();
    let result = clone_bitmap(&source, format, quantizer.as_ref(), ditherer.as_ref(), &ctx)?
        .ok_or(AppError::Drawing(DrawingError::Canceled))?;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let mse = mean_squared_error(&source, &result)?;
    let psnr = (mse > 0.0).then(|| 10.0 * (255.0f64 * 255.0 / mse).log10());
    let palette = result
        .palette()
        .map(|p| p.entries().iter().map(|c| c.to_string()).collect())
        .unwrap_or_default();

    let report = RunReport {
        pattern: config.source.pattern.name().to_string(),
        width: result.width(),
        height: result.height(),
        target_format: format.name().to_string(),
        quantizer: quantizer.as_ref().map(|q| q.name().to_string()),
        ditherer: ditherer.as_ref().map(|d| d.name().to_string()),
        threads: config.threads,
        palette,
        distinct_colors: result.color_count()?,
        mse,
        psnr,
        elapsed_ms,
        preview: config.preview.then(|| ascii_preview(&result)).transpose()?,
    };

    tracing::info!(
        pattern = %report.pattern,
        format = %report.target_format,
        colors = report.distinct_colors,
        mse = report.mse,
        elapsed_ms = report.elapsed_ms,
        "Run finished"
    );
    Ok(report)
}

fn mean_squared_error(a: &BitmapData<'_>, b: &BitmapData<'_>) -> Result<f64, AppError> {
    let left = a.to_vec_color32()?;
    let right = b.to_vec_color32()?;
    if left.is_empty() {
        return Ok(0.0);
    }
    let sum: f64 = left
        .iter()
        .zip(&right)
        .map(|(x, y)| {
            let (x, y) = (x.to_premultiplied(), y.to_premultiplied());
            [(x.a, y.a), (x.r, y.r), (x.g, y.g), (x.b, y.b)]
                .into_iter()
                .map(|(p, q)| {
                    let d = f64::from(p) - f64::from(q);
                    d * d
                })
                .sum::<f64>()
        })
        .sum();
    Ok(sum / (left.len() * 4) as f64)
}

/// Render the bitmap as text, two source rows per character row.
pub fn ascii_preview(bitmap: &BitmapData<'_>) -> Result<String, AppError> {
    let (width, height) = (bitmap.width(), bitmap.height());
    let columns = width.min(PREVIEW_MAX_COLUMNS);
    let rows = (height * columns).div_ceil(width * 2).max(1);

    let mut out = String::with_capacity((columns + 1) * rows);
    for row in 0..rows {
        let y = row * height / rows;
        for column in 0..columns {
            let x = column * width / columns;
            let color = bitmap.get_color32(x, y)?;
            let level = u32::from(color.brightness(WorkingColorSpace::Srgb)) * u32::from(color.a) / 255;
            let slot = level as usize * (PREVIEW_RAMP.len() - 1) / 255;
            out.push(char::from(PREVIEW_RAMP[slot]));
        }
        out.push('\n');
    }
    Ok(out)
}

/// Human readable report.
pub fn format_text(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {}x{} -> {}",
        report.pattern, report.width, report.height, report.target_format
    );
    let _ = writeln!(
        out,
        "  quantizer: {}",
        report.quantizer.as_deref().unwrap_or("(format default)")
    );
    let _ = writeln!(out, "  ditherer:  {}", report.ditherer.as_deref().unwrap_or("none"));
    let threads = match report.threads {
        0 => "all".to_string(),
        n => n.to_string(),
    };
    let _ = writeln!(out, "  threads:   {threads}");
    let _ = writeln!(out, "  colors:    {}", report.distinct_colors);
    if !report.palette.is_empty() {
        let _ = writeln!(out, "  palette:   {}", report.palette.join(" "));
    }
    let psnr = report
        .psnr
        .map_or_else(|| "exact".to_string(), |p| format!("{p:.2} dB"));
    let _ = writeln!(out, "  mse:       {:.3} (psnr {psnr})", report.mse);
    let _ = writeln!(out, "  elapsed:   {} ms", report.elapsed_ms);
    if let Some(preview) = &report.preview {
        out.push('\n');
        out.push_str(preview);
    }
    out
}

/// Table of the built-in pixel formats.
pub fn format_table() -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<22} {:>4}  {:<8} {:<6} {:<14} {}",
        "FORMAT", "BPP", "INDEXED", "ALPHA", "PREMULTIPLIED", "PRECISION"
    );
    for format in KnownPixelFormat::ALL {
        let info = format.info();
        let yes_no = |on: bool| if on { "yes" } else { "no" };
        let _ = writeln!(
            out,
            "{:<22} {:>4}  {:<8} {:<6} {:<14} {:?}",
            format.name(),
            info.bits_per_pixel(),
            yes_no(info.is_indexed()),
            yes_no(info.has_alpha()),
            yes_no(info.has_premultiplied_alpha()),
            info.precision()
        );
    }
    out
}

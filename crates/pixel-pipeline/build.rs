use std::env;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// IEC 61966-2-1 exact formula: sRGB to linear
fn srgb_to_linear_exact(srgb: f64) -> f64 {
    if srgb <= 0.04045 {
        srgb / 12.92
    } else {
        ((srgb + 0.055) / 1.055).powf(2.4)
    }
}

fn write_table(
    file: &mut File,
    doc: &[&str],
    name: &str,
    len: usize,
    value: impl Fn(usize) -> f64,
) -> std::io::Result<()> {
    for line in doc {
        writeln!(file, "/// {line}")?;
    }
    writeln!(file, "pub static {name}: [f32; {len}] = [")?;
    for i in 0..len {
        if i > 0 && i % 8 == 0 {
            writeln!(file)?;
        }
        write!(file, "    {:.9},", value(i) as f32)?;
    }
    writeln!(file, "\n];")?;
    writeln!(file)
}

fn main() -> std::io::Result<()> {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    let dest_path = Path::new(&out_dir).join("gamma_lut.rs");
    let mut file = File::create(&dest_path)?;

    // Exact decode of every 8-bit sRGB level; keeps Color32 -> ColorF lossless.
    write_table(
        &mut file,
        &["Linear value of each 8-bit sRGB level."],
        "SRGB8_TO_LINEAR",
        256,
        |i| srgb_to_linear_exact(i as f64 / 255.0),
    )?;

    println!("cargo::rerun-if-changed=build.rs");
    Ok(())
}

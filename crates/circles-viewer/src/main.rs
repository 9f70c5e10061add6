//! Circles - GPU compute-rasterized circle field

mod app;
mod assets;
mod snapshot;

use anyhow::{Context, Result};
use circles_core::{FieldConfig, MAX_CIRCLES};
use clap::Parser;
use std::path::Path;

#[derive(Parser)]
#[command(name = "circles")]
#[command(about = "Animated circle field rasterized by a compute kernel", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<String>,

    /// Circles per frame (overrides the config file)
    #[arg(long)]
    count: Option<u32>,

    /// Directory of background images; defaults to built-in patterns
    #[arg(long)]
    textures: Option<String>,

    /// Render one frame offscreen instead of opening a window, e.g. 1024x768
    #[arg(long, value_name = "WIDTHxHEIGHT")]
    snapshot: Option<String>,

    /// Frame index to capture with --snapshot
    #[arg(long, default_value_t = 0)]
    frame: u32,

    /// Output path for --snapshot
    #[arg(long, default_value = "circles.png")]
    output: String,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(Path::new(path))?,
        None => FieldConfig::default(),
    };
    if let Some(count) = cli.count {
        config.circle_count = count.min(MAX_CIRCLES);
    }

    let images = match &cli.textures {
        Some(dir) => assets::load_directory(Path::new(dir), &config)?,
        None => assets::builtin_set(&config),
    };

    match &cli.snapshot {
        Some(size) => {
            let (width, height) = parse_size(size)?;
            let frame = snapshot::capture(width, height, &config, images, cli.frame)?;
            frame
                .save(&cli.output)
                .with_context(|| format!("Failed to write '{}'", cli.output))?;
            println!("Wrote {}x{} snapshot to {}", width, height, cli.output);
            Ok(())
        }
        None => app::run(config, images),
    }
}

fn load_config(path: &Path) -> Result<FieldConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config '{}'", path.display()))?;
    let table: toml::value::Table = toml::from_str(&text)
        .with_context(|| format!("Failed to parse config '{}'", path.display()))?;
    Ok(FieldConfig::from_toml(&table))
}

fn parse_size(s: &str) -> Result<(u32, u32)> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .with_context(|| format!("Expected WIDTHxHEIGHT, got '{s}'"))?;
    let width: u32 = w.trim().parse().context("Invalid width")?;
    let height: u32 = h.trim().parse().context("Invalid height")?;
    anyhow::ensure!(width > 0 && height > 0, "Snapshot size must be non-zero");
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_size_accepts_both_separators() {
        assert_eq!(parse_size("1024x768").unwrap(), (1024, 768));
        assert_eq!(parse_size("640X480").unwrap(), (640, 480));
    }

    #[test]
    fn parse_size_rejects_garbage() {
        assert!(parse_size("1024").is_err());
        assert!(parse_size("0x100").is_err());
        assert!(parse_size("axb").is_err());
    }
}

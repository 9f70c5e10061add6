//! Background image loading and procedural fallbacks

use anyhow::{Context, Result};
use circles_core::{FieldConfig, NoiseConfig, NoiseField};
use circles_render::ImageResource;
use image::{Rgba, RgbaImage};
use std::path::Path;

/// Load every PNG/JPEG in `dir` as a background image, sorted by file name
/// so layer order is stable across runs.
pub fn load_directory(dir: &Path, _config: &FieldConfig) -> Result<Vec<ImageResource>> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read texture directory '{}'", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("png") | Some("jpg") | Some("jpeg")
            )
        })
        .collect();
    paths.sort();

    let mut images = Vec::with_capacity(paths.len());
    for path in &paths {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("texture")
            .to_string();
        let img = ImageResource::from_file(&name, path).map_err(anyhow::Error::msg)?;
        log::info!("loaded texture '{}' ({}x{})", img.name(), img.width(), img.height());
        images.push(img);
    }
    Ok(images)
}

/// The built-in image set: four procedural patterns at the configured
/// texture size, derived from the same noise field the circles are.
pub fn builtin_set(config: &FieldConfig) -> Vec<ImageResource> {
    let size = config.texture_size;
    let field = NoiseField::new(NoiseConfig {
        seed: config.noise.seed ^ 0x7E57,
        ..config.noise
    });
    vec![
        ImageResource::new("rings", rings(size)),
        ImageResource::new("stripes", stripes(size)),
        ImageResource::new("clouds", clouds(size, &field)),
        ImageResource::new("dots", dots(size)),
    ]
}

fn rings(size: u32) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, y| {
        let (u, v) = centered(x, y, size);
        let r = (u * u + v * v).sqrt();
        let band = ((r * 12.0).sin() * 0.5 + 0.5 * (1.0 - r)).clamp(0.0, 1.0);
        gray(band)
    })
}

fn stripes(size: u32) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, y| {
        let (u, v) = centered(x, y, size);
        let band = (((u + v) * 10.0).sin() * 0.5 + 0.5).clamp(0.0, 1.0);
        gray(band)
    })
}

fn clouds(size: u32, field: &NoiseField) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, y| {
        let u = x as f32 / size as f32 * 8.0;
        let v = y as f32 / size as f32 * 8.0;
        let n = (field.value(u, v) * 0.5 + 0.5).clamp(0.0, 1.0);
        gray(n)
    })
}

fn dots(size: u32) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, y| {
        let (u, v) = centered(x, y, size);
        let fu = (u * 6.0).fract().abs() - 0.5;
        let fv = (v * 6.0).fract().abs() - 0.5;
        let d = (fu * fu + fv * fv).sqrt();
        gray(if d < 0.3 { 1.0 - d / 0.3 } else { 0.0 })
    })
}

fn centered(x: u32, y: u32, size: u32) -> (f32, f32) {
    (
        x as f32 / size as f32 * 2.0 - 1.0,
        y as f32 / size as f32 * 2.0 - 1.0,
    )
}

fn gray(level: f32) -> Rgba<u8> {
    let v = (level * 255.0) as u8;
    Rgba([v, v, v, 255])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_set_matches_configured_size() {
        let config = FieldConfig {
            texture_size: 32,
            ..Default::default()
        };
        let images = builtin_set(&config);
        assert_eq!(images.len(), 4);
        for img in &images {
            assert_eq!((img.width(), img.height()), (32, 32));
        }
    }

    #[test]
    fn builtin_names_are_distinct() {
        let config = FieldConfig::default();
        let images = builtin_set(&config);
        let mut names: Vec<_> = images.iter().map(|i| i.name().to_string()).collect();
        names.dedup();
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn patterns_are_not_flat() {
        for img in [rings(16), stripes(16), dots(16)] {
            let first = *img.get_pixel(0, 0);
            assert!(img.pixels().any(|p| *p != first));
        }
    }
}

//! Decoded background images and their CPU-side mip chains

use image::imageops::FilterType;
use image::RgbaImage;
use std::path::Path;

/// A decoded 2D image destined for one layer of the arena's array texture.
/// Read-only for the lifetime of the program; frames share it by reference.
pub struct ImageResource {
    name: String,
    image: RgbaImage,
}

impl ImageResource {
    pub fn new(name: impl Into<String>, image: RgbaImage) -> Self {
        Self {
            name: name.into(),
            image,
        }
    }

    /// Decode an image file from disk.
    pub fn from_file(name: &str, path: &Path) -> Result<Self, String> {
        let img = image::open(path)
            .map_err(|e| format!("Failed to open image '{}': {}", path.display(), e))?;
        Ok(Self::new(name, img.to_rgba8()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Number of mip levels for a full chain down to 1x1.
    pub fn mip_level_count(&self) -> u32 {
        mip_level_count(self.width(), self.height())
    }

    /// Full mip chain, level 0 first. Dimensions halve per level down to
    /// 1x1; each level is triangle-filtered from the source pixels, so the
    /// upload is a pure function of the image.
    pub fn mip_chain(&self) -> Vec<RgbaImage> {
        let mut levels = Vec::with_capacity(self.mip_level_count() as usize);
        levels.push(self.image.clone());
        let (mut w, mut h) = (self.width(), self.height());
        while w > 1 || h > 1 {
            w = (w / 2).max(1);
            h = (h / 2).max(1);
            levels.push(image::imageops::resize(
                &self.image,
                w,
                h,
                FilterType::Triangle,
            ));
        }
        levels
    }

    /// Bytes this image contributes to the arena plan: every mip level at
    /// 4 bytes per pixel, rows rounded up to the copy alignment the device
    /// reports for texture data.
    pub fn plan_bytes(&self, row_align: u64) -> u64 {
        let mut total = 0u64;
        let (mut w, mut h) = (self.width() as u64, self.height() as u64);
        loop {
            let row = align_row(w * 4, row_align);
            total += row * h;
            if w == 1 && h == 1 {
                break;
            }
            w = (w / 2).max(1);
            h = (h / 2).max(1);
        }
        total
    }
}

pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

fn align_row(bytes: u64, align: u64) -> u64 {
    if align == 0 {
        return bytes;
    }
    bytes.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(size: u32) -> ImageResource {
        let img = RgbaImage::from_fn(size, size, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgba([255, 255, 255, 255])
            } else {
                image::Rgba([0, 0, 0, 255])
            }
        });
        ImageResource::new("checker", img)
    }

    #[test]
    fn mip_levels_for_powers_of_two() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 2), 2);
        assert_eq!(mip_level_count(256, 256), 9);
        assert_eq!(mip_level_count(256, 64), 9);
    }

    #[test]
    fn mip_chain_halves_down_to_one_pixel() {
        let img = checker(8);
        let chain = img.mip_chain();
        assert_eq!(chain.len(), 4);
        assert_eq!(chain[0].dimensions(), (8, 8));
        assert_eq!(chain[1].dimensions(), (4, 4));
        assert_eq!(chain[3].dimensions(), (1, 1));
    }

    #[test]
    fn plan_bytes_accounts_for_row_alignment() {
        let img = checker(4);
        // Unaligned: (16*4 + 8*2 + 4*1) = 84 bytes
        assert_eq!(img.plan_bytes(1), 84);
        // 256-byte rows: 256*4 + 256*2 + 256*1
        assert_eq!(img.plan_bytes(256), 256 * 7);
    }
}

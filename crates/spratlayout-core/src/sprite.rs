//! Sprite preparation: decode (or recall from the image-metadata cache), trim, scale.

use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use image::{ImageReader, RgbaImage};

use crate::cache::image_meta::{ImageMetaEntry, ImageMetadataCache};
use crate::config::LayoutConfig;
use crate::error::{Result, SpratError, add_u32};
use crate::model::{Rect, Sprite, Trim};

/// Decoded image reduced to what layout needs: size plus one alpha byte per pixel (row-major).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaImage {
    pub width: u32,
    pub height: u32,
    pub alpha: Vec<u8>,
}

impl AlphaImage {
    pub fn new(width: u32, height: u32, alpha: Vec<u8>) -> Result<Self> {
        let expected = u64::from(width) * u64::from(height);
        if alpha.len() as u64 != expected {
            return Err(SpratError::InvalidInput(format!(
                "alpha buffer holds {} bytes, expected {expected} for {width}x{height}",
                alpha.len()
            )));
        }
        Ok(Self {
            width,
            height,
            alpha,
        })
    }

    /// Fully opaque image of the given size.
    pub fn opaque(width: u32, height: u32) -> Self {
        let len = (u64::from(width) * u64::from(height)) as usize;
        Self {
            width,
            height,
            alpha: vec![u8::MAX; len],
        }
    }

    pub fn from_rgba(rgba: &RgbaImage) -> Self {
        let (width, height) = rgba.dimensions();
        let alpha = rgba.pixels().map(|p| p[3]).collect();
        Self {
            width,
            height,
            alpha,
        }
    }

    fn alpha_at(&self, x: u32, y: u32) -> u8 {
        self.alpha[y as usize * self.width as usize + x as usize]
    }
}

/// Turns a file into pixel dimensions and alpha data.
pub trait ImageDecoder: Sync {
    fn decode(&self, path: &Path) -> Result<AlphaImage>;
}

/// Decoder backed by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, path: &Path) -> Result<AlphaImage> {
        let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
        Ok(AlphaImage::from_rgba(&img.to_rgba8()))
    }
}

/// File size and modification time, used to validate cached metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceStamp {
    pub size: u64,
    /// Nanoseconds since the Unix epoch (0 if the platform can't report it).
    pub mtime_ticks: u64,
}

impl SourceStamp {
    pub fn of(path: &Path) -> Result<Self> {
        let meta = fs::metadata(path)?;
        let mtime_ticks = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Ok(Self {
            size: meta.len(),
            mtime_ticks,
        })
    }
}

/// Smallest rectangle containing every pixel with non-zero alpha, and the trim that produces it.
/// A fully transparent image degrades to a 1x1 region at the origin.
pub fn compute_trim(img: &AlphaImage) -> (Rect, Trim) {
    let (w, h) = (img.width, img.height);
    let mut x1 = u32::MAX;
    let mut y1 = u32::MAX;
    let mut x2 = 0u32;
    let mut y2 = 0u32;
    let mut any = false;
    for y in 0..h {
        for x in 0..w {
            if img.alpha_at(x, y) != 0 {
                any = true;
                x1 = x1.min(x);
                y1 = y1.min(y);
                x2 = x2.max(x);
                y2 = y2.max(y);
            }
        }
    }
    if !any {
        let trim = Trim::new(0, 0, w.saturating_sub(1), h.saturating_sub(1));
        return (Rect::new(0, 0, 1, 1), trim);
    }
    let tw = x2 - x1 + 1;
    let th = y2 - y1 + 1;
    let trim = Trim::new(x1, y1, w - x2 - 1, h - y2 - 1);
    (Rect::new(x1, y1, tw, th), trim)
}

/// `round(dim * scale)`, at least 1.
pub fn scale_dimension(dim: u32, scale: f64) -> Result<u32> {
    let v = (f64::from(dim) * scale).round();
    if !v.is_finite() || v > f64::from(u32::MAX) {
        return Err(SpratError::DimensionOverflow("scaled sprite dimension"));
    }
    Ok((v as u32).max(1))
}

fn scale_offset(offset: u32, scale: f64) -> Result<u32> {
    if offset == 0 {
        return Ok(0);
    }
    let v = (f64::from(offset) * scale).round();
    if !v.is_finite() || v > f64::from(u32::MAX) {
        return Err(SpratError::DimensionOverflow("scaled trim offset"));
    }
    Ok(v as u32)
}

/// Pre-scale sprite geometry: trimmed size and trim offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseGeometry {
    pub w: u32,
    pub h: u32,
    pub trim: Trim,
}

impl BaseGeometry {
    pub fn from_image(img: &AlphaImage, trim: bool) -> Self {
        if trim {
            let (bounds, trim) = compute_trim(img);
            Self {
                w: bounds.w,
                h: bounds.h,
                trim,
            }
        } else {
            Self {
                w: img.width.max(1),
                h: img.height.max(1),
                trim: Trim::default(),
            }
        }
    }

    /// Applies `scale` and checks that the padded size stays representable.
    pub fn into_sprite(self, key: &str, scale: f64, padding: u32) -> Result<Sprite> {
        let (w, h, trim) = if scale == 1.0 {
            (self.w, self.h, self.trim)
        } else {
            let t = self.trim;
            (
                scale_dimension(self.w, scale)?,
                scale_dimension(self.h, scale)?,
                Trim::new(
                    scale_offset(t.left, scale)?,
                    scale_offset(t.top, scale)?,
                    scale_offset(t.right, scale)?,
                    scale_offset(t.bottom, scale)?,
                ),
            )
        };
        add_u32(w, padding, "padded sprite width")?;
        add_u32(h, padding, "padded sprite height")?;
        Ok(Sprite::new(key, w, h).with_trim(trim))
    }
}

/// Builds the pack-time sprite for `file`, consulting and refreshing `meta` when present.
///
/// A cache entry is only trusted when the file's size and modification time still match;
/// otherwise the image is decoded and the entry replaced.
pub fn prepare_sprite(
    key: &str,
    file: &Path,
    cfg: &LayoutConfig,
    decoder: &dyn ImageDecoder,
    meta: Option<&mut ImageMetadataCache>,
) -> Result<Sprite> {
    let Some(meta) = meta else {
        let img = decoder.decode(file)?;
        return BaseGeometry::from_image(&img, cfg.trim).into_sprite(key, cfg.scale, cfg.padding);
    };
    let stamp = SourceStamp::of(file)?;
    let file_key = file.to_string_lossy();
    let cached = meta
        .lookup(&file_key, cfg.trim, stamp)
        .map(ImageMetaEntry::geometry);
    let base = match cached {
        Some(base) => base,
        None => {
            let img = decoder.decode(file)?;
            let base = BaseGeometry::from_image(&img, cfg.trim);
            meta.insert(ImageMetaEntry::new(&file_key, cfg.trim, stamp, base));
            base
        }
    };
    base.into_sprite(key, cfg.scale, cfg.padding)
}

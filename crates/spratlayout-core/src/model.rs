use serde::{Deserialize, Serialize};

use crate::error::mul_area;

/// Axis-aligned rectangle (pixels). `x,y` is top-left; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    /// Exclusive right edge (`x + w`), widened so it can't wrap.
    pub fn right(&self) -> u64 {
        u64::from(self.x) + u64::from(self.w)
    }
    /// Exclusive bottom edge (`y + h`), widened so it can't wrap.
    pub fn bottom(&self) -> u64 {
        u64::from(self.y) + u64::from(self.h)
    }
    pub fn area(&self) -> u64 {
        mul_area(self.w, self.h)
    }
    /// Returns true if `r` is fully inside `self`.
    pub fn contains(&self, r: &Rect) -> bool {
        r.x >= self.x && r.y >= self.y && r.right() <= self.right() && r.bottom() <= self.bottom()
    }
    /// True when the interiors overlap (touching edges do not count).
    pub fn intersects(&self, r: &Rect) -> bool {
        !(u64::from(self.x) >= r.right()
            || u64::from(r.x) >= self.right()
            || u64::from(self.y) >= r.bottom()
            || u64::from(r.y) >= self.bottom())
    }
}

/// Pixels removed from each edge of the source image by transparency trimming.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct Trim {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Trim {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

/// One image in the working set.
///
/// `w,h` are the pack-time size (after trim and scale, before padding). `x,y` are assigned by a
/// packing strategy and are zero until then.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Sprite {
    pub path: String,
    pub w: u32,
    pub h: u32,
    pub trim: Trim,
    pub x: u32,
    pub y: u32,
}

impl Sprite {
    pub fn new(path: impl Into<String>, w: u32, h: u32) -> Self {
        Self {
            path: path.into(),
            w,
            h,
            trim: Trim::default(),
            x: 0,
            y: 0,
        }
    }

    pub fn with_trim(mut self, trim: Trim) -> Self {
        self.trim = trim;
        self
    }

    /// Placed rectangle without padding.
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h)
    }

    /// Placed rectangle grown by `padding` on the right and bottom. `None` if it overflows.
    pub fn padded_rect(&self, padding: u32) -> Option<Rect> {
        Some(Rect::new(
            self.x,
            self.y,
            self.w.checked_add(padding)?,
            self.h.checked_add(padding)?,
        ))
    }
}

/// A finished atlas layout: canvas size plus every placed sprite.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    pub scale: f64,
    /// Whether sprites carry trim offsets (controls the text format's optional fields).
    pub trim: bool,
    pub sprites: Vec<Sprite>,
}

impl Layout {
    /// Computes packing statistics for this layout.
    pub fn stats(&self) -> LayoutStats {
        let atlas_area = mul_area(self.width, self.height);
        let used_area: u64 = self.sprites.iter().map(|s| s.rect().area()).sum();
        let occupancy = if atlas_area > 0 {
            used_area as f64 / atlas_area as f64
        } else {
            0.0
        };
        LayoutStats {
            num_sprites: self.sprites.len(),
            atlas_area,
            used_area,
            occupancy,
            num_trimmed: self.sprites.iter().filter(|s| s.trim != Trim::default()).count(),
        }
    }

    pub fn find(&self, path: &str) -> Option<&Sprite> {
        self.sprites.iter().find(|s| s.path == path)
    }
}

/// Statistics about atlas packing efficiency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LayoutStats {
    pub num_sprites: usize,
    /// `width * height` of the atlas.
    pub atlas_area: u64,
    /// Sum of unpadded sprite areas.
    pub used_area: u64,
    /// used_area / atlas_area (0.0 to 1.0). Higher is better.
    pub occupancy: f64,
    pub num_trimmed: usize,
}

impl LayoutStats {
    /// Returns a human-readable summary of the statistics.
    pub fn summary(&self) -> String {
        format!(
            "Sprites: {}, Occupancy: {:.2}%, Atlas Area: {} px², Used Area: {} px², Trimmed: {}",
            self.num_sprites,
            self.occupancy * 100.0,
            self.atlas_area,
            self.used_area,
            self.num_trimmed,
        )
    }

    /// Returns wasted space in pixels.
    pub fn wasted_area(&self) -> u64 {
        self.atlas_area.saturating_sub(self.used_area)
    }
}

/// A full trial result from one packing attempt.
#[derive(Debug, Clone)]
pub struct PackingCandidate {
    pub valid: bool,
    pub w: u32,
    pub h: u32,
    pub area: u64,
    pub sprites: Vec<Sprite>,
}

impl PackingCandidate {
    pub fn new(w: u32, h: u32, sprites: Vec<Sprite>) -> Self {
        Self {
            valid: true,
            w,
            h,
            area: mul_area(w, h),
            sprites,
        }
    }

    pub fn invalid() -> Self {
        Self {
            valid: false,
            w: 0,
            h: 0,
            area: 0,
            sprites: Vec::new(),
        }
    }
}

/// Tight bounding box (`max x + w`, `max y + h`) of the given sprites.
pub fn tight_bounds(sprites: &[Sprite]) -> Option<(u32, u32)> {
    let mut w = 0u32;
    let mut h = 0u32;
    for s in sprites {
        w = w.max(s.x.checked_add(s.w)?);
        h = h.max(s.y.checked_add(s.h)?);
    }
    Some((w, h))
}

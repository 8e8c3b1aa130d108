use crate::error::{Result, SpratError, add_u32};
use crate::model::{PackingCandidate, Rect, Sprite, tight_bounds};

pub mod maxrects;
pub mod shelf;
pub mod tree;

/// A packer reserves rectangles inside one bin.
///
/// Implementations must never hand out overlapping slots. `insert` returns `Ok(None)` when the
/// slot cannot be placed and `Err` only when the packer's own arithmetic would overflow.
pub trait Packer {
    fn insert(&mut self, w: u32, h: u32) -> Result<Option<Rect>>;
}

/// Positions produced by placing a whole sprite sequence.
#[derive(Debug, Clone)]
pub struct Placement {
    /// `(x, y)` per sprite, in input order.
    pub positions: Vec<(u32, u32)>,
    /// Tight bounds of the unpadded sprites.
    pub width: u32,
    pub height: u32,
}

impl Placement {
    /// Copies `sprites` with the placed coordinates applied.
    pub fn into_candidate(self, sprites: &[Sprite]) -> PackingCandidate {
        let placed = sprites
            .iter()
            .zip(self.positions)
            .map(|(s, (x, y))| Sprite { x, y, ..s.clone() })
            .collect();
        PackingCandidate::new(self.width, self.height, placed)
    }
}

/// Places every sprite (grown by `padding`) in sequence. `Ok(None)` as soon as one doesn't fit.
pub fn place_all<P: Packer>(
    packer: &mut P,
    sprites: &[Sprite],
    padding: u32,
) -> Result<Option<Placement>> {
    let mut positions = Vec::with_capacity(sprites.len());
    let mut width = 0u32;
    let mut height = 0u32;
    for s in sprites {
        let pw = add_u32(s.w, padding, "padded sprite width")?;
        let ph = add_u32(s.h, padding, "padded sprite height")?;
        let Some(slot) = packer.insert(pw, ph)? else {
            return Ok(None);
        };
        width = width.max(add_u32(slot.x, s.w, "atlas width")?);
        height = height.max(add_u32(slot.y, s.h, "atlas height")?);
        positions.push((slot.x, slot.y));
    }
    Ok(Some(Placement {
        positions,
        width,
        height,
    }))
}

/// Checks that the padded rectangles of `sprites` are pairwise disjoint and lie inside
/// `max_w x max_h` (padded domain).
pub fn validate_placement(sprites: &[Sprite], padding: u32, max_w: u64, max_h: u64) -> Result<bool> {
    let mut rects = Vec::with_capacity(sprites.len());
    for s in sprites {
        let r = s
            .padded_rect(padding)
            .ok_or(SpratError::DimensionOverflow("padded sprite rectangle"))?;
        if r.right() > max_w || r.bottom() > max_h {
            return Ok(false);
        }
        rects.push(r);
    }
    for i in 0..rects.len() {
        for j in (i + 1)..rects.len() {
            if rects[i].intersects(&rects[j]) {
                return Ok(false);
            }
        }
    }
    Ok(tight_bounds(sprites).is_some())
}

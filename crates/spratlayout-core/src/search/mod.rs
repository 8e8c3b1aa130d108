//! Search orchestration: picks the packing strategy for the configured mode, reuses a seed
//! placement when possible and turns the winning candidate into a [`Layout`].

pub mod guided;
pub mod pot;

use std::cmp::Reverse;
use std::collections::HashMap;

use tracing::{debug, info, instrument};

use crate::cache::SeedEntry;
use crate::config::{LayoutConfig, LayoutMode, SortOrder};
use crate::error::{Result, SpratError, add_u32, add_u64, mul_area};
use crate::model::{Layout, PackingCandidate, Sprite, tight_bounds};
use crate::packer::shelf::ShelfPacker;
use crate::packer::{place_all, validate_placement};

/// How the final layout was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutOrigin {
    /// Served verbatim from the output cache.
    OutputCache,
    /// Previous placement revalidated from the seed cache.
    SeedReuse,
    /// Full search.
    Search,
}

/// Result of one orchestrated search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Winner for the configured optimize target.
    pub layout: Layout,
    /// Winner for the other target, when the mode tracks both.
    pub alternate: Option<Layout>,
    pub origin: LayoutOrigin,
    /// Combinations consumed from the budget.
    pub combinations: u64,
}

/// Sprites pre-sorted under every [`SortOrder`], plus the padded aggregates the strategies need.
pub struct WorkingSet {
    pub padding: u32,
    pub orders: Vec<(SortOrder, Vec<Sprite>)>,
    pub max_padded_w: u32,
    pub max_padded_h: u32,
    pub total_padded_area: u64,
    pub sum_padded_w: u64,
    pub sum_padded_h: u64,
    /// Padded-domain limits (`u32::MAX` when unbounded).
    pub limit_w: u32,
    pub limit_h: u32,
    pub bounded: bool,
}

fn sort_key_cmp(order: SortOrder, a: &Sprite, b: &Sprite) -> std::cmp::Ordering {
    let area = |s: &Sprite| mul_area(s.w, s.h);
    let max_side = |s: &Sprite| s.w.max(s.h);
    let min_side = |s: &Sprite| s.w.min(s.h);
    let perimeter = |s: &Sprite| u64::from(s.w) + u64::from(s.h);
    let primary = match order {
        SortOrder::HeightDesc => Reverse((a.h, a.w)).cmp(&Reverse((b.h, b.w))),
        SortOrder::WidthDesc => Reverse((a.w, a.h)).cmp(&Reverse((b.w, b.h))),
        SortOrder::AreaDesc => Reverse((area(a), a.h)).cmp(&Reverse((area(b), b.h))),
        SortOrder::MaxSideDesc => {
            Reverse((max_side(a), min_side(a))).cmp(&Reverse((max_side(b), min_side(b))))
        }
        SortOrder::PerimeterDesc => {
            Reverse((perimeter(a), max_side(a))).cmp(&Reverse((perimeter(b), max_side(b))))
        }
    };
    primary.then_with(|| a.path.cmp(&b.path))
}

impl WorkingSet {
    pub fn new(sprites: &[Sprite], cfg: &LayoutConfig) -> Result<Self> {
        if sprites.is_empty() {
            return Err(SpratError::Empty);
        }
        let padding = cfg.padding;
        let mut max_padded_w = 0u32;
        let mut max_padded_h = 0u32;
        let mut total_padded_area = 0u64;
        let mut sum_padded_w = 0u64;
        let mut sum_padded_h = 0u64;
        for s in sprites {
            let pw = add_u32(s.w, padding, "padded sprite width")?;
            let ph = add_u32(s.h, padding, "padded sprite height")?;
            max_padded_w = max_padded_w.max(pw);
            max_padded_h = max_padded_h.max(ph);
            total_padded_area = add_u64(total_padded_area, mul_area(pw, ph), "total sprite area")?;
            sum_padded_w = add_u64(sum_padded_w, u64::from(pw), "summed sprite width")?;
            sum_padded_h = add_u64(sum_padded_h, u64::from(ph), "summed sprite height")?;
        }
        let limit_w = cfg.max_width.unwrap_or(u32::MAX);
        let limit_h = cfg.max_height.unwrap_or(u32::MAX);
        if max_padded_w > limit_w || max_padded_h > limit_h {
            return Err(SpratError::BoundsExceeded(format!(
                "largest padded sprite is {max_padded_w}x{max_padded_h}, limits are {}x{}",
                fmt_limit(cfg.max_width),
                fmt_limit(cfg.max_height)
            )));
        }
        let orders = SortOrder::ALL
            .iter()
            .map(|&order| {
                let mut sorted = sprites.to_vec();
                sorted.sort_by(|a, b| sort_key_cmp(order, a, b));
                (order, sorted)
            })
            .collect();
        Ok(Self {
            padding,
            orders,
            max_padded_w,
            max_padded_h,
            total_padded_area,
            sum_padded_w,
            sum_padded_h,
            limit_w,
            limit_h,
            bounded: cfg.max_width.is_some() || cfg.max_height.is_some(),
        })
    }

    pub fn sprite_count(&self) -> usize {
        self.orders.first().map_or(0, |(_, s)| s.len())
    }

    pub fn sorted(&self, order: SortOrder) -> &[Sprite] {
        self.orders
            .iter()
            .find(|(o, _)| *o == order)
            .map(|(_, s)| s.as_slice())
            .unwrap_or(&[])
    }

    /// Smallest useful width: the widest padded sprite.
    pub fn min_width(&self) -> u32 {
        self.max_padded_w
    }

    /// Largest useful width: the limit, or every sprite side by side.
    pub fn max_width(&self) -> u32 {
        let side_by_side = u32::try_from(self.sum_padded_w).unwrap_or(u32::MAX);
        self.limit_w.min(side_by_side).max(self.min_width())
    }

    /// Bin height used for width-driven searches.
    pub fn bin_height(&self) -> u32 {
        let stacked = u32::try_from(self.sum_padded_h).unwrap_or(u32::MAX);
        self.limit_h.min(stacked).max(self.max_padded_h)
    }

    /// `ceil(sqrt(total padded area))` clamped to the useful width range.
    pub fn seed_width(&self) -> u32 {
        clamp_width(ceil_sqrt(self.total_padded_area), self)
    }

    /// Error for a search that found nothing: limits if any were set, otherwise a plain failure.
    pub(crate) fn exhausted(&self, attempts: u64) -> SpratError {
        if self.bounded {
            SpratError::BoundsExceeded(format!(
                "no layout fits within {}x{} after {attempts} combinations",
                self.limit_w, self.limit_h
            ))
        } else {
            SpratError::PackingFailed { attempts }
        }
    }
}

fn fmt_limit(v: Option<u32>) -> String {
    v.map_or_else(|| "unbounded".to_string(), |v| v.to_string())
}

pub(crate) fn clamp_width(w: u64, ws: &WorkingSet) -> u32 {
    let lo = u64::from(ws.min_width());
    let hi = u64::from(ws.max_width());
    // lo <= hi <= u32::MAX
    w.clamp(lo, hi) as u32
}

pub(crate) fn ceil_sqrt(v: u64) -> u64 {
    let mut s = (v as f64).sqrt() as u64;
    while s.checked_mul(s).is_some_and(|sq| sq < v) {
        s += 1;
    }
    while s > 0 && (s - 1).checked_mul(s - 1).is_some_and(|sq| sq >= v) {
        s -= 1;
    }
    s
}

/// Shelf-packs `sprites` at `row_width`. Returns the candidate and its padded used width.
pub(crate) fn shelf_candidate(
    sprites: &[Sprite],
    row_width: u32,
    ws: &WorkingSet,
) -> Result<Option<(PackingCandidate, u32)>> {
    let mut packer = ShelfPacker::new(row_width, Some(ws.limit_h));
    let Some(placement) = place_all(&mut packer, sprites, ws.padding)? else {
        return Ok(None);
    };
    let mut used_w = 0u32;
    for (s, (x, _)) in sprites.iter().zip(&placement.positions) {
        let right = add_u32(*x, s.w, "shelf width")?;
        used_w = used_w.max(add_u32(right, ws.padding, "shelf width")?);
    }
    Ok(Some((placement.into_candidate(sprites), used_w)))
}

/// Re-validates `seed` against the current sprites. Returns the reconstructed candidate when every
/// sprite matches by path, size and trim, counts agree, and the padded rectangles are disjoint and
/// inside the current limits.
pub fn try_reuse_seed(seed: &SeedEntry, sprites: &[Sprite], cfg: &LayoutConfig) -> Result<Option<PackingCandidate>> {
    if seed.padding != cfg.padding {
        debug!(old = seed.padding, new = cfg.padding, "seed rejected: padding changed");
        return Ok(None);
    }
    if seed.sprites.len() != sprites.len() {
        debug!(
            cached = seed.sprites.len(),
            current = sprites.len(),
            "seed rejected: entry count mismatch"
        );
        return Ok(None);
    }
    let by_path: HashMap<&str, &Sprite> = seed.sprites.iter().map(|s| (s.path.as_str(), s)).collect();
    let mut placed = Vec::with_capacity(sprites.len());
    for s in sprites {
        let Some(prev) = by_path.get(s.path.as_str()) else {
            debug!(path = %s.path, "seed rejected: unknown sprite");
            return Ok(None);
        };
        if prev.w != s.w || prev.h != s.h || prev.trim != s.trim {
            debug!(path = %s.path, "seed rejected: sprite geometry changed");
            return Ok(None);
        }
        placed.push(Sprite {
            x: prev.x,
            y: prev.y,
            ..s.clone()
        });
    }
    let limit_w = cfg.max_width.map_or(u64::MAX, u64::from);
    let limit_h = cfg.max_height.map_or(u64::MAX, u64::from);
    if !validate_placement(&placed, cfg.padding, limit_w, limit_h)? {
        debug!("seed rejected: placement no longer valid");
        return Ok(None);
    }
    let (w, h) = tight_bounds(&placed).ok_or(SpratError::DimensionOverflow("seed bounds"))?;
    Ok(Some(PackingCandidate::new(w, h, placed)))
}

/// Cached seed width carried over to the current padding.
///
/// The stored width is a tight bound, so the first row occupied `width + old_padding` padded
/// pixels; each of its sprites then grows by the padding delta.
pub fn seed_width_hint(seed: &SeedEntry, ws: &WorkingSet) -> u32 {
    let cols = seed.first_row_len().max(1) as i128;
    let delta = i128::from(ws.padding) - i128::from(seed.padding);
    let w = i128::from(seed.atlas_width) + i128::from(seed.padding) + cols * delta;
    clamp_width(w.clamp(0, i128::from(u32::MAX)) as u64, ws)
}

fn fast_search(ws: &WorkingSet) -> Result<PackingCandidate> {
    let sprites = ws.sorted(SortOrder::HeightDesc);
    for width in [ws.seed_width(), ws.max_width()] {
        if let Some((candidate, _)) = shelf_candidate(sprites, width, ws)? {
            return Ok(candidate);
        }
    }
    Err(ws.exhausted(2))
}

/// Converts a winning candidate into the emitted layout (sprites in path order).
fn finish(candidate: PackingCandidate, cfg: &LayoutConfig, keep_bin_size: bool) -> Result<Layout> {
    let mut sprites = candidate.sprites;
    sprites.sort_by(|a, b| a.path.cmp(&b.path));
    let (width, height) = if keep_bin_size {
        (candidate.w, candidate.h)
    } else {
        tight_bounds(&sprites).ok_or(SpratError::DimensionOverflow("atlas bounds"))?
    };
    Ok(Layout {
        width,
        height,
        scale: cfg.scale,
        trim: cfg.trim,
        sprites,
    })
}

/// Runs the configured mode over `sprites`, trying `seed` first.
#[instrument(skip_all, fields(sprites = sprites.len(), mode = cfg.mode.as_str()))]
pub fn search(sprites: &[Sprite], cfg: &LayoutConfig, seed: Option<&SeedEntry>) -> Result<SearchOutcome> {
    cfg.validate()?;
    let ws = WorkingSet::new(sprites, cfg)?;

    if cfg.mode != LayoutMode::Pot {
        if let Some(seed) = seed {
            if let Some(candidate) = try_reuse_seed(seed, sprites, cfg)? {
                info!(w = candidate.w, h = candidate.h, "reused seed layout");
                return Ok(SearchOutcome {
                    layout: finish(candidate, cfg, false)?,
                    alternate: None,
                    origin: LayoutOrigin::SeedReuse,
                    combinations: 0,
                });
            }
        }
    }

    let outcome = match cfg.mode {
        LayoutMode::Compact => {
            let hint = seed.map(|s| seed_width_hint(s, &ws));
            let result = guided::search_compact(&ws, cfg, hint)?;
            SearchOutcome {
                layout: finish(result.best, cfg, false)?,
                alternate: Some(finish(result.alternate, cfg, false)?),
                origin: LayoutOrigin::Search,
                combinations: result.combinations,
            }
        }
        LayoutMode::Fast => SearchOutcome {
            layout: finish(fast_search(&ws)?, cfg, false)?,
            alternate: None,
            origin: LayoutOrigin::Search,
            combinations: 1,
        },
        LayoutMode::Pot => {
            let result = pot::search_pot(&ws, cfg.optimize)?;
            SearchOutcome {
                layout: finish(result.best, cfg, true)?,
                alternate: None,
                origin: LayoutOrigin::Search,
                combinations: result.attempts,
            }
        }
    };
    info!(
        w = outcome.layout.width,
        h = outcome.layout.height,
        combinations = outcome.combinations,
        "layout selected"
    );
    Ok(outcome)
}

//! Power-of-two atlas search.
//!
//! Grows a square power-of-two bin until some sort order fits, then walks every smaller-or-equal
//! power-of-two rectangle and keeps the best by the evaluator. The emitted atlas is the bin itself.

use tracing::{debug, instrument, trace};

use super::WorkingSet;
use crate::config::{MaxRectsHeuristic, OptimizeTarget};
use crate::error::{Result, SpratError, mul_area};
use crate::evaluator::{BestCandidate, CandidateScore};
use crate::model::PackingCandidate;
use crate::packer::maxrects::MaxRectsPacker;
use crate::packer::tree::TreePacker;
use crate::packer::{Packer, place_all};

pub struct PotResult {
    pub best: PackingCandidate,
    /// Packer runs attempted, successful or not.
    pub attempts: u64,
}

/// Largest power of two `<= v` (`v > 0`).
fn floor_pow2(v: u32) -> u64 {
    1u64 << (31 - v.max(1).leading_zeros())
}

fn pow2_range(from: u32, to: u64) -> impl Iterator<Item = u64> {
    std::iter::successors(Some(u64::from(from).next_power_of_two()), |v| v.checked_mul(2))
        .take_while(move |&v| v <= to)
}

struct BinAttempt<'a> {
    ws: &'a WorkingSet,
    attempts: u64,
}

impl BinAttempt<'_> {
    fn run<P: Packer>(&mut self, mut packer: P, w: u32, h: u32, order: usize) -> Result<Option<PackingCandidate>> {
        self.attempts += 1;
        let sprites = &self.ws.orders[order].1;
        Ok(place_all(&mut packer, sprites, self.ws.padding)?.map(|p| {
            let mut c = p.into_candidate(sprites);
            c.w = w;
            c.h = h;
            c.area = mul_area(w, h);
            c
        }))
    }

    /// First packing that fits `w x h`: every order with the tree packer, then every MaxRects
    /// heuristic over every order.
    fn pack(&mut self, w: u32, h: u32) -> Result<Option<PackingCandidate>> {
        for order in 0..self.ws.orders.len() {
            if let Some(c) = self.run(TreePacker::new(w, h), w, h, order)? {
                return Ok(Some(c));
            }
        }
        for heuristic in MaxRectsHeuristic::ALL {
            for order in 0..self.ws.orders.len() {
                if let Some(c) = self.run(MaxRectsPacker::new(w, h, heuristic), w, h, order)? {
                    return Ok(Some(c));
                }
            }
        }
        Ok(None)
    }
}

#[instrument(skip_all, fields(sprites = ws.sprite_count(), target = target.as_str()))]
pub fn search_pot(ws: &WorkingSet, target: OptimizeTarget) -> Result<PotResult> {
    let cap_w = floor_pow2(ws.limit_w);
    let cap_h = floor_pow2(ws.limit_h);
    if cap_w < u64::from(ws.max_padded_w) || cap_h < u64::from(ws.max_padded_h) {
        return Err(SpratError::BoundsExceeded(format!(
            "largest padded sprite {}x{} exceeds the power-of-two limit {cap_w}x{cap_h}",
            ws.max_padded_w, ws.max_padded_h
        )));
    }
    let mut attempt = BinAttempt { ws, attempts: 0 };

    let mut side = u64::from(ws.max_padded_w.max(ws.max_padded_h)).next_power_of_two();
    let mut previous = None;
    let feasible = loop {
        // both caps are at most 2^31
        let bin = (side.min(cap_w) as u32, side.min(cap_h) as u32);
        if previous == Some(bin) {
            return Err(SpratError::BoundsExceeded(format!(
                "no power-of-two atlas up to {}x{} holds every sprite",
                bin.0, bin.1
            )));
        }
        previous = Some(bin);
        trace!(w = bin.0, h = bin.1, "trying square bin");
        if let Some(c) = attempt.pack(bin.0, bin.1)? {
            break c;
        }
        side = side.saturating_mul(2);
    };
    debug!(w = feasible.w, h = feasible.h, "feasible power-of-two bin");

    let budget_area = feasible.area;
    let mut best = BestCandidate::new(target);
    let (fw, fh) = (feasible.w, feasible.h);
    best.offer(feasible);

    for w in pow2_range(ws.max_padded_w, cap_w) {
        for h in pow2_range(ws.max_padded_h, cap_h) {
            if w * h > budget_area {
                break;
            }
            let (w, h) = (w as u32, h as u32);
            if (w, h) == (fw, fh) || !best.improves(&CandidateScore::new(w, h)) {
                continue;
            }
            if let Some(c) = attempt.pack(w, h)? {
                best.offer(c);
            }
        }
    }

    let attempts = attempt.attempts;
    let best = best.into_inner().ok_or(SpratError::PackingFailed { attempts })?;
    debug!(w = best.w, h = best.h, attempts, "power-of-two search finished");
    Ok(PotResult { best, attempts })
}


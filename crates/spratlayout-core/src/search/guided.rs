//! Guided compact search.
//!
//! Instead of scanning every width in range, a handful of anchor widths are expanded by
//! multiples of a step into a short candidate list. Every `(width, sort order, heuristic)` triple
//! costs one slot of the shared combination budget. Widths are split into contiguous ranges, one
//! per worker; each worker keeps its own best GPU and best SPACE candidate and the results are
//! folded in worker order, so the outcome does not depend on which thread finishes first.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, instrument};

use super::{WorkingSet, clamp_width, shelf_candidate};
use crate::config::{LayoutConfig, MaxRectsHeuristic, OptimizeTarget, SortOrder};
use crate::error::Result;
use crate::evaluator::{BestCandidate, CandidateScore};
use crate::model::{PackingCandidate, Sprite};
use crate::packer::maxrects::MaxRectsPacker;
use crate::packer::place_all;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Offsets (in steps) applied around every anchor width.
const GUIDE_OFFSETS: [i64; 9] = [-4, -3, -2, -1, 0, 1, 2, 3, 4];
const MIN_STEP: u32 = 8;
const STEP_DIVISOR: u32 = 24;

/// Global cap on search combinations, shared by all workers.
#[derive(Debug)]
pub struct CombinationBudget {
    used: AtomicU64,
    limit: Option<u64>,
}

impl CombinationBudget {
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            used: AtomicU64::new(0),
            limit,
        }
    }

    /// Claims one combination; false once the budget is spent.
    pub fn try_take(&self) -> bool {
        let n = self.used.fetch_add(1, Ordering::Relaxed);
        self.limit.is_none_or(|limit| n < limit)
    }

    /// Combinations actually granted.
    pub fn consumed(&self) -> u64 {
        let used = self.used.load(Ordering::Relaxed);
        self.limit.map_or(used, |limit| used.min(limit))
    }
}

/// Anchor widths for the guided list.
#[derive(Debug, Clone, Copy)]
pub struct Anchors {
    pub seed: u32,
    pub fast: Option<u32>,
    pub min: u32,
    pub cached: Option<u32>,
}

/// Expands `anchors` into an ascending, deduplicated list of widths inside the useful range.
pub fn guided_widths(anchors: &Anchors, ws: &WorkingSet) -> Vec<u32> {
    let range = ws.max_width() - ws.min_width();
    let step = i64::from(MIN_STEP.max(range / STEP_DIVISOR));
    let mut widths = BTreeSet::new();
    let points = [Some(anchors.seed), anchors.fast, Some(anchors.min), anchors.cached];
    for anchor in points.into_iter().flatten() {
        for k in GUIDE_OFFSETS {
            let w = (i64::from(anchor) + k * step).max(0) as u64;
            widths.insert(clamp_width(w, ws));
        }
    }
    widths.into_iter().collect()
}

/// One worker's slice of the search.
pub struct SearchWorker<'a> {
    pub widths: &'a [u32],
    pub orders: &'a [(SortOrder, Vec<Sprite>)],
    pub padding: u32,
    pub bin_height: u32,
    pub budget: &'a CombinationBudget,
}

/// Per-worker result slot.
pub struct WorkerResult {
    pub gpu: BestCandidate,
    pub space: BestCandidate,
    pub placed: u64,
}

impl WorkerResult {
    fn new() -> Self {
        Self {
            gpu: BestCandidate::new(OptimizeTarget::Gpu),
            space: BestCandidate::new(OptimizeTarget::Space),
            placed: 0,
        }
    }

    /// Offers a placement to both trackers, cloning the sprites only if one of them keeps it.
    fn offer(&mut self, w: u32, h: u32, make: impl FnOnce() -> PackingCandidate) {
        let score = CandidateScore::new(w, h);
        let for_gpu = self.gpu.improves(&score);
        let for_space = self.space.improves(&score);
        match (for_gpu, for_space) {
            (false, false) => {}
            (true, false) => self.gpu.offer(make()),
            (false, true) => self.space.offer(make()),
            (true, true) => {
                let c = make();
                self.gpu.offer(c.clone());
                self.space.offer(c);
            }
        }
    }

    fn merge(&mut self, other: WorkerResult) {
        self.gpu.merge(other.gpu);
        self.space.merge(other.space);
        self.placed += other.placed;
    }
}

impl SearchWorker<'_> {
    pub fn run(self) -> Result<WorkerResult> {
        let mut result = WorkerResult::new();
        for &width in self.widths {
            for (_, sprites) in self.orders {
                for heuristic in MaxRectsHeuristic::ALL {
                    if !self.budget.try_take() {
                        return Ok(result);
                    }
                    let mut packer = MaxRectsPacker::new(width, self.bin_height, heuristic);
                    if let Some(p) = place_all(&mut packer, sprites, self.padding)? {
                        result.placed += 1;
                        let (w, h) = (p.width, p.height);
                        result.offer(w, h, || p.into_candidate(sprites));
                    }
                }
            }
        }
        Ok(result)
    }
}

fn worker_count(cfg: &LayoutConfig, widths: usize) -> usize {
    let threads = cfg.threads.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });
    threads.clamp(1, widths.max(1))
}

#[cfg(feature = "parallel")]
fn run_workers(workers: Vec<SearchWorker<'_>>) -> Result<Vec<WorkerResult>> {
    if workers.len() <= 1 {
        return workers.into_iter().map(SearchWorker::run).collect();
    }
    match rayon::ThreadPoolBuilder::new()
        .num_threads(workers.len())
        .build()
    {
        Ok(pool) => pool.install(|| workers.into_par_iter().map(SearchWorker::run).collect()),
        Err(e) => {
            tracing::warn!(error = %e, "thread pool unavailable; searching sequentially");
            workers.into_iter().map(SearchWorker::run).collect()
        }
    }
}

#[cfg(not(feature = "parallel"))]
fn run_workers(workers: Vec<SearchWorker<'_>>) -> Result<Vec<WorkerResult>> {
    workers.into_iter().map(SearchWorker::run).collect()
}

/// Both objective winners from a compact search.
pub struct CompactResult {
    pub best: PackingCandidate,
    pub alternate: PackingCandidate,
    pub combinations: u64,
}

#[instrument(skip_all, fields(sprites = ws.sprite_count()))]
pub fn search_compact(ws: &WorkingSet, cfg: &LayoutConfig, cached_width: Option<u32>) -> Result<CompactResult> {
    let seed = ws.seed_width();
    let fast = shelf_candidate(ws.sorted(SortOrder::HeightDesc), seed, ws)?.map(|(_, w)| w);
    let anchors = Anchors {
        seed,
        fast: fast.map(|w| clamp_width(u64::from(w), ws)),
        min: ws.min_width(),
        cached: cached_width,
    };
    let widths = guided_widths(&anchors, ws);
    let workers = worker_count(cfg, widths.len());
    let chunk = widths.len().div_ceil(workers).max(1);
    debug!(?anchors, widths = widths.len(), workers, "guided search");

    let budget = CombinationBudget::new(cfg.max_combinations);
    let tasks: Vec<SearchWorker<'_>> = widths
        .chunks(chunk)
        .map(|range| SearchWorker {
            widths: range,
            orders: &ws.orders,
            padding: ws.padding,
            bin_height: ws.bin_height(),
            budget: &budget,
        })
        .collect();

    let mut merged = WorkerResult::new();
    for slot in run_workers(tasks)? {
        merged.merge(slot);
    }

    // shelf rows at the same widths as a cheap fallback
    for &width in &widths {
        for (_, sprites) in &ws.orders {
            if let Some((candidate, _)) = shelf_candidate(sprites, width, ws)? {
                let (w, h) = (candidate.w, candidate.h);
                merged.offer(w, h, || candidate);
            }
        }
    }

    let combinations = budget.consumed();
    debug!(combinations, placed = merged.placed, "guided search finished");
    let (best, alternate) = match cfg.optimize {
        OptimizeTarget::Gpu => (merged.gpu, merged.space),
        OptimizeTarget::Space => (merged.space, merged.gpu),
    };
    match (best.into_inner(), alternate.into_inner()) {
        (Some(best), Some(alternate)) => Ok(CompactResult {
            best,
            alternate,
            combinations,
        }),
        _ => Err(ws.exhausted(combinations)),
    }
}

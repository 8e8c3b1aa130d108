//! Candidate ranking for the two optimize targets.
//!
//! Both objectives end with a width comparison, so two candidates only compare equal when their
//! width and height are identical. That totality is what keeps the merged search result
//! independent of worker completion order.

use std::cmp::Ordering;

use crate::config::OptimizeTarget;
use crate::error::mul_area;
use crate::model::PackingCandidate;

/// The `(width, height, area)` triple a candidate is ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateScore {
    pub w: u32,
    pub h: u32,
    pub area: u64,
}

impl CandidateScore {
    pub fn new(w: u32, h: u32) -> Self {
        Self {
            w,
            h,
            area: mul_area(w, h),
        }
    }

    fn max_side(&self) -> u32 {
        self.w.max(self.h)
    }

    fn aspect_delta(&self) -> u32 {
        self.w.abs_diff(self.h)
    }
}

impl From<&PackingCandidate> for CandidateScore {
    fn from(c: &PackingCandidate) -> Self {
        Self {
            w: c.w,
            h: c.h,
            area: c.area,
        }
    }
}

/// Orders `a` against `b`; `Ordering::Less` means `a` is the better candidate.
///
/// - GPU: max side, area, |w - h|, width
/// - SPACE: area, max side, |w - h|, width
pub fn compare(target: OptimizeTarget, a: &CandidateScore, b: &CandidateScore) -> Ordering {
    let primary = match target {
        OptimizeTarget::Gpu => a
            .max_side()
            .cmp(&b.max_side())
            .then_with(|| a.area.cmp(&b.area)),
        OptimizeTarget::Space => a
            .area
            .cmp(&b.area)
            .then_with(|| a.max_side().cmp(&b.max_side())),
    };
    primary
        .then_with(|| a.aspect_delta().cmp(&b.aspect_delta()))
        .then_with(|| a.w.cmp(&b.w))
}

/// True if `candidate` strictly beats `best`. Invalid candidates never win; anything valid beats an
/// invalid best.
pub fn is_better(target: OptimizeTarget, candidate: &PackingCandidate, best: &PackingCandidate) -> bool {
    if !candidate.valid {
        return false;
    }
    if !best.valid {
        return true;
    }
    compare(
        target,
        &CandidateScore::from(candidate),
        &CandidateScore::from(best),
    ) == Ordering::Less
}

/// Best-so-far tracker for one objective. Keeps the earlier candidate on ties.
#[derive(Debug, Clone)]
pub struct BestCandidate {
    target: OptimizeTarget,
    best: PackingCandidate,
}

impl BestCandidate {
    pub fn new(target: OptimizeTarget) -> Self {
        Self {
            target,
            best: PackingCandidate::invalid(),
        }
    }

    /// Would a candidate with this score replace the current best?
    pub fn improves(&self, score: &CandidateScore) -> bool {
        !self.best.valid
            || compare(self.target, score, &CandidateScore::from(&self.best)) == Ordering::Less
    }

    pub fn offer(&mut self, candidate: PackingCandidate) {
        if is_better(self.target, &candidate, &self.best) {
            self.best = candidate;
        }
    }

    /// Folds another tracker in; `self` wins ties.
    pub fn merge(&mut self, other: BestCandidate) {
        self.offer(other.best);
    }

    pub fn get(&self) -> Option<&PackingCandidate> {
        self.best.valid.then_some(&self.best)
    }

    pub fn into_inner(self) -> Option<PackingCandidate> {
        self.best.valid.then_some(self.best)
    }
}

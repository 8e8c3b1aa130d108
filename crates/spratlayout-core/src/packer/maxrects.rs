use super::Packer;
use crate::config::MaxRectsHeuristic;
use crate::error::{Result, mul_area};
use crate::model::Rect;

/// MaxRects free-list packer over a fixed bin.
pub struct MaxRectsPacker {
    bin: Rect,
    free: Vec<Rect>,
    heuristic: MaxRectsHeuristic,
}

/// Lexicographic placement score; lower is better.
type Score = (u64, u64, u64, u64);

impl MaxRectsPacker {
    pub fn new(width: u32, height: u32, heuristic: MaxRectsHeuristic) -> Self {
        let bin = Rect::new(0, 0, width, height);
        Self {
            bin,
            free: vec![bin],
            heuristic,
        }
    }

    /// Bin this packer was created with.
    pub fn bin(&self) -> Rect {
        self.bin
    }

    fn place_rect(&mut self, node: &Rect) {
        let mut new_free: Vec<Rect> = Vec::new();
        let mut i = 0usize;
        while i < self.free.len() {
            let fr = self.free[i];
            if fr.intersects(node) {
                // remove this free rect; split into parts added to new_free
                self.free.swap_remove(i);
                split_free_node(fr, node, &mut new_free);
            } else {
                i += 1;
            }
        }
        self.free.extend(new_free);
        self.prune_free_list();
    }

    fn prune_free_list(&mut self) {
        let mut i = 0;
        while i < self.free.len() {
            let mut j = i + 1;
            let a = self.free[i];
            let mut remove_i = false;
            while j < self.free.len() {
                let b = self.free[j];
                if b.contains(&a) {
                    remove_i = true;
                    break;
                }
                if a.contains(&b) {
                    self.free.remove(j);
                    continue;
                }
                j += 1;
            }
            if remove_i {
                self.free.remove(i);
            } else {
                i += 1;
            }
        }
    }

    fn score(&self, fr: &Rect, w: u32, h: u32) -> Score {
        let leftover_h = u64::from(fr.w - w);
        let leftover_v = u64::from(fr.h - h);
        let short_fit = leftover_h.min(leftover_v);
        let long_fit = leftover_h.max(leftover_v);
        let area_fit = fr.area() - mul_area(w, h);
        let top = u64::from(fr.y);
        let left = u64::from(fr.x);
        match self.heuristic {
            MaxRectsHeuristic::BestShortSideFit => (short_fit, long_fit, top, left),
            MaxRectsHeuristic::BestAreaFit => (area_fit, long_fit, top, left),
            MaxRectsHeuristic::BottomLeft => (top, left, short_fit, 0),
        }
    }

    fn find_position(&self, w: u32, h: u32) -> Option<Rect> {
        let mut best: Option<(Score, Rect)> = None;
        for fr in &self.free {
            if fr.w < w || fr.h < h {
                continue;
            }
            let s = self.score(fr, w, h);
            if best.as_ref().is_none_or(|(b, _)| s < *b) {
                best = Some((s, Rect::new(fr.x, fr.y, w, h)));
            }
        }
        best.map(|(_, r)| r)
    }

    /// Current number of maximal free rectangles.
    pub fn free_list_len(&self) -> usize {
        self.free.len()
    }
}

/// Cuts `node` out of `fr`, pushing the (up to four) maximal leftover slivers.
fn split_free_node(fr: Rect, node: &Rect, out: &mut Vec<Rect>) {
    // both rects lie inside the bin, so these edges fit in u32
    let fr_x2 = fr.x + fr.w;
    let fr_y2 = fr.y + fr.h;
    let n_x2 = node.x + node.w;
    let n_y2 = node.y + node.h;

    // Left
    if node.x > fr.x && node.x < fr_x2 {
        out.push(Rect::new(fr.x, fr.y, node.x - fr.x, fr.h));
    }
    // Right
    if n_x2 > fr.x && n_x2 < fr_x2 {
        out.push(Rect::new(n_x2, fr.y, fr_x2 - n_x2, fr.h));
    }
    // Top
    if node.y > fr.y && node.y < fr_y2 {
        out.push(Rect::new(fr.x, fr.y, fr.w, node.y - fr.y));
    }
    // Bottom
    if n_y2 > fr.y && n_y2 < fr_y2 {
        out.push(Rect::new(fr.x, n_y2, fr.w, fr_y2 - n_y2));
    }
    out.retain(|r| r.w > 0 && r.h > 0);
}

impl Packer for MaxRectsPacker {
    fn insert(&mut self, w: u32, h: u32) -> Result<Option<Rect>> {
        if w == 0 || h == 0 || w > self.bin.w || h > self.bin.h {
            return Ok(None);
        }
        let Some(place) = self.find_position(w, h) else {
            return Ok(None);
        };
        self.place_rect(&place);
        Ok(Some(place))
    }
}

use super::Packer;
use crate::error::Result;
use crate::model::Rect;

#[derive(Debug, Clone)]
struct Node {
    rect: Rect,
    /// `(first, second)` indices into the arena once split.
    children: Option<(usize, usize)>,
    used: bool,
}

/// Binary free-node tree packer. Nodes live in one arena and refer to their children by index, so
/// inserts walk the tree with an explicit stack instead of recursion.
pub struct TreePacker {
    nodes: Vec<Node>,
}

impl TreePacker {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            nodes: vec![Node {
                rect: Rect::new(0, 0, width, height),
                children: None,
                used: false,
            }],
        }
    }

    /// Number of arena nodes, split-off free nodes included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn push(&mut self, rect: Rect) -> usize {
        self.nodes.push(Node {
            rect,
            children: None,
            used: false,
        });
        self.nodes.len() - 1
    }

    /// Splits leaf `idx` so its first child starts with a `w x h` region; returns the first child.
    fn split(&mut self, idx: usize, w: u32, h: u32) -> usize {
        let r = self.nodes[idx].rect;
        let dw = r.w - w;
        let dh = r.h - h;
        let (first, second) = if dw > dh {
            (
                Rect::new(r.x, r.y, w, r.h),
                Rect::new(r.x + w, r.y, dw, r.h),
            )
        } else {
            (
                Rect::new(r.x, r.y, r.w, h),
                Rect::new(r.x, r.y + h, r.w, dh),
            )
        };
        let a = self.push(first);
        let b = self.push(second);
        self.nodes[idx].children = Some((a, b));
        a
    }
}

impl Packer for TreePacker {
    fn insert(&mut self, w: u32, h: u32) -> Result<Option<Rect>> {
        if w == 0 || h == 0 {
            return Ok(None);
        }
        let mut stack = vec![0usize];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if let Some((a, b)) = node.children {
                // first child is explored first
                stack.push(b);
                stack.push(a);
                continue;
            }
            if node.used || node.rect.w < w || node.rect.h < h {
                continue;
            }
            if node.rect.w == w && node.rect.h == h {
                self.nodes[idx].used = true;
                return Ok(Some(self.nodes[idx].rect));
            }
            let first = self.split(idx, w, h);
            stack.push(first);
        }
        Ok(None)
    }
}

use super::Packer;
use crate::error::{Result, add_u32};
use crate::model::Rect;

/// Next-fit row packer: fills a row left to right and opens a new one below the tallest slot of
/// the current row once the next slot would cross `row_width`.
pub struct ShelfPacker {
    row_width: u32,
    max_height: Option<u32>,
    cursor_x: u32,
    row_y: u32,
    row_h: u32,
}

impl ShelfPacker {
    pub fn new(row_width: u32, max_height: Option<u32>) -> Self {
        Self {
            row_width,
            max_height,
            cursor_x: 0,
            row_y: 0,
            row_h: 0,
        }
    }

    /// Height used so far (bottom of the current row).
    pub fn used_height(&self) -> Result<u32> {
        add_u32(self.row_y, self.row_h, "shelf height")
    }
}

impl Packer for ShelfPacker {
    fn insert(&mut self, w: u32, h: u32) -> Result<Option<Rect>> {
        if w > self.row_width {
            return Ok(None);
        }
        let end_x = add_u32(self.cursor_x, w, "shelf row width")?;
        if end_x > self.row_width {
            self.row_y = self.used_height()?;
            self.cursor_x = 0;
            self.row_h = 0;
        }
        let bottom = add_u32(self.row_y, h, "shelf height")?;
        if self.max_height.is_some_and(|limit| bottom > limit) {
            return Ok(None);
        }
        let slot = Rect::new(self.cursor_x, self.row_y, w, h);
        self.cursor_x = add_u32(self.cursor_x, w, "shelf row width")?;
        self.row_h = self.row_h.max(h);
        Ok(Some(slot))
    }
}

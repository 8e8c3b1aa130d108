use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tracing::debug;

use super::Signature;
use crate::layout_text::{Token, quote_path, tokenize};
use crate::model::{Layout, Sprite, Trim};

pub const SEED_CACHE_TAG: &str = "spratlayout_seed_cache";
pub const SEED_CACHE_VERSION: u32 = 1;

/// A previous full placement, reusable when the sprite set hasn't changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedEntry {
    pub signature: Signature,
    pub padding: u32,
    pub atlas_width: u32,
    pub atlas_height: u32,
    pub sprites: Vec<Sprite>,
}

impl SeedEntry {
    pub fn from_layout(signature: Signature, padding: u32, layout: &Layout) -> Self {
        Self {
            signature,
            padding,
            atlas_width: layout.width,
            atlas_height: layout.height,
            sprites: layout.sprites.clone(),
        }
    }

    /// Reads the seed stored at `path`; `None` if missing, corrupt or for another signature.
    pub fn load(path: &Path, expected: Signature) -> Option<Self> {
        let text = fs::read_to_string(path).ok()?;
        let entry = Self::parse(&text);
        match entry {
            Some(e) if e.signature == expected => Some(e),
            Some(_) => {
                debug!(path = %path.display(), "seed cache signature mismatch");
                None
            }
            None => {
                debug!(path = %path.display(), "seed cache unreadable; ignoring");
                None
            }
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let mut lines = text.lines();
        let version = lines.next()?.strip_prefix(SEED_CACHE_TAG)?.trim();
        if version.parse::<u32>().ok()? != SEED_CACHE_VERSION {
            return None;
        }
        let signature = Signature::parse(lines.next()?.trim())?;
        let header: Vec<u32> = lines
            .next()?
            .split_whitespace()
            .map(|t| t.parse().ok())
            .collect::<Option<_>>()?;
        let [padding, atlas_width, atlas_height, count] = header.as_slice() else {
            return None;
        };
        let mut sprites = Vec::with_capacity(*count as usize);
        for line in lines.filter(|l| !l.trim().is_empty()) {
            sprites.push(parse_sprite(line)?);
        }
        if sprites.len() != *count as usize {
            return None;
        }
        Some(Self {
            signature,
            padding: *padding,
            atlas_width: *atlas_width,
            atlas_height: *atlas_height,
            sprites,
        })
    }

    pub fn to_text(&self) -> String {
        let mut out = format!("{SEED_CACHE_TAG} {SEED_CACHE_VERSION}\n{}\n", self.signature);
        let _ = writeln!(
            out,
            "{} {} {} {}",
            self.padding,
            self.atlas_width,
            self.atlas_height,
            self.sprites.len()
        );
        for s in &self.sprites {
            let _ = writeln!(
                out,
                "{} {} {} {} {} {} {} {} {}",
                quote_path(&s.path),
                s.x,
                s.y,
                s.w,
                s.h,
                s.trim.left,
                s.trim.top,
                s.trim.right,
                s.trim.bottom
            );
        }
        out
    }

    /// Sprites on the first row (`y == 0`); used to carry the width over a padding change.
    pub fn first_row_len(&self) -> usize {
        self.sprites.iter().filter(|s| s.y == 0).count()
    }
}

fn parse_sprite(line: &str) -> Option<Sprite> {
    let tokens = tokenize(line).ok()?;
    let [Token::Quoted(path), rest @ ..] = tokens.as_slice() else {
        return None;
    };
    let nums: Vec<u32> = rest
        .iter()
        .map(|t| t.bare().and_then(|s| s.parse().ok()))
        .collect::<Option<_>>()?;
    let [x, y, w, h, l, t, r, b] = nums.as_slice() else {
        return None;
    };
    Some(Sprite {
        path: path.clone(),
        w: *w,
        h: *h,
        trim: Trim::new(*l, *t, *r, *b),
        x: *x,
        y: *y,
    })
}

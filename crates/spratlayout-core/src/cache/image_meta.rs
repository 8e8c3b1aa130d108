use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tracing::debug;

use super::unix_now;
use crate::layout_text::{Token, quote_path, tokenize};
use crate::model::Trim;
use crate::sprite::{BaseGeometry, SourceStamp};

pub const IMAGE_CACHE_TAG: &str = "spratlayout_cache";
pub const IMAGE_CACHE_VERSION: u32 = 1;

/// Trimmed, unscaled geometry of one source image, valid while its size and mtime hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMetaEntry {
    pub path: String,
    pub trim_enabled: bool,
    pub file_size: u64,
    pub mtime_ticks: u64,
    pub width: u32,
    pub height: u32,
    pub trim: Trim,
    /// Unix seconds of the last refresh.
    pub cached_at: u64,
}

impl ImageMetaEntry {
    pub fn new(path: &str, trim_enabled: bool, stamp: SourceStamp, base: BaseGeometry) -> Self {
        Self {
            path: path.to_string(),
            trim_enabled,
            file_size: stamp.size,
            mtime_ticks: stamp.mtime_ticks,
            width: base.w,
            height: base.h,
            trim: base.trim,
            cached_at: unix_now(),
        }
    }

    pub fn geometry(&self) -> BaseGeometry {
        BaseGeometry {
            w: self.width,
            h: self.height,
            trim: self.trim,
        }
    }

    fn matches(&self, stamp: SourceStamp) -> bool {
        self.file_size == stamp.size && self.mtime_ticks == stamp.mtime_ticks
    }

    fn parse(line: &str) -> Option<Self> {
        let tokens = tokenize(line).ok()?;
        let [Token::Quoted(path), rest @ ..] = tokens.as_slice() else {
            return None;
        };
        let nums: Vec<u64> = rest
            .iter()
            .map(|t| t.bare().and_then(|s| s.parse::<u64>().ok()))
            .collect::<Option<_>>()?;
        let [trim_flag, size, mtime, w, h, l, t, r, b, cached_at] = nums.as_slice() else {
            return None;
        };
        let u32_of = |v: &u64| u32::try_from(*v).ok();
        Some(Self {
            path: path.clone(),
            trim_enabled: match *trim_flag {
                0 => false,
                1 => true,
                _ => return None,
            },
            file_size: *size,
            mtime_ticks: *mtime,
            width: u32_of(w)?,
            height: u32_of(h)?,
            trim: Trim::new(u32_of(l)?, u32_of(t)?, u32_of(r)?, u32_of(b)?),
            cached_at: *cached_at,
        })
    }
}

/// In-memory image-metadata cache; at most one entry per `(path, trim flag)`.
#[derive(Debug, Clone, Default)]
pub struct ImageMetadataCache {
    entries: BTreeMap<(String, bool), ImageMetaEntry>,
}

impl ImageMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `path`, dropping entries older than `max_age_secs` or whose file changed.
    /// A missing, foreign or corrupt file yields an empty cache.
    pub fn load(path: &Path, now: u64, max_age_secs: u64) -> Self {
        let Ok(text) = fs::read_to_string(path) else {
            return Self::new();
        };
        let Some(mut cache) = Self::parse(&text) else {
            debug!(path = %path.display(), "image cache unreadable; starting cold");
            return Self::new();
        };
        cache.entries.retain(|_, e| {
            if now.saturating_sub(e.cached_at) > max_age_secs {
                return false;
            }
            SourceStamp::of(Path::new(&e.path)).is_ok_and(|stamp| e.matches(stamp))
        });
        cache
    }

    pub fn parse(text: &str) -> Option<Self> {
        let mut lines = text.lines();
        let header = lines.next()?;
        let version = header.strip_prefix(IMAGE_CACHE_TAG)?.trim();
        if version.parse::<u32>().ok()? != IMAGE_CACHE_VERSION {
            return None;
        }
        let mut cache = Self::new();
        for line in lines.filter(|l| !l.trim().is_empty()) {
            cache.insert(ImageMetaEntry::parse(line)?);
        }
        Some(cache)
    }

    pub fn to_text(&self) -> String {
        let mut out = format!("{IMAGE_CACHE_TAG} {IMAGE_CACHE_VERSION}\n");
        for e in self.entries.values() {
            let _ = writeln!(
                out,
                "{} {} {} {} {} {} {} {} {} {} {}",
                quote_path(&e.path),
                u8::from(e.trim_enabled),
                e.file_size,
                e.mtime_ticks,
                e.width,
                e.height,
                e.trim.left,
                e.trim.top,
                e.trim.right,
                e.trim.bottom,
                e.cached_at
            );
        }
        out
    }

    /// Returns the entry for `(path, trim)` if it still describes the file, refreshing its
    /// timestamp. A mismatching entry is removed.
    pub fn lookup(&mut self, path: &str, trim: bool, stamp: SourceStamp) -> Option<&ImageMetaEntry> {
        let key = (path.to_string(), trim);
        if !self.entries.get(&key)?.matches(stamp) {
            self.entries.remove(&key);
            return None;
        }
        let entry = self.entries.get_mut(&key)?;
        entry.cached_at = unix_now();
        Some(entry)
    }

    pub fn insert(&mut self, entry: ImageMetaEntry) {
        self.entries
            .insert((entry.path.clone(), entry.trim_enabled), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

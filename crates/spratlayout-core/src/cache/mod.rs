//! On-disk caches for repeated layout runs over the same folder.
//!
//! Three independent caches live in one namespace directory per input folder:
//! - `images.cache`: per-image trimmed geometry, validated by file size and mtime
//! - `seed-<signature>.cache`: the last placement for a configuration (padding and sprite set
//!   excluded from the signature), reused without searching when nothing moved
//! - `output-<signature>.cache`: the emitted layout text for one exact set of inputs
//!
//! Every file starts with a format tag and version. Anything unreadable is a miss, never an
//! error, and every write goes through a temp file plus rename.

pub mod image_meta;
pub mod output;
pub mod seed;

use std::fmt;
use std::fs;
use std::hash::Hasher;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use twox_hash::XxHash64;

use crate::config::LayoutConfig;
use crate::error::Result;
use crate::sprite::SourceStamp;

pub use image_meta::{ImageMetaEntry, ImageMetadataCache};
pub use seed::SeedEntry;

const HASH_SEED: u64 = 0x5370_7261_744c_6179;
const DAY_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Root for all namespaces. None => `<temp dir>/spratlayout-cache`.
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Image-metadata entries older than this are dropped on load.
    #[serde(default = "default_image_max_age")]
    pub image_max_age_secs: u64,
    /// Output cache files older than this are treated as misses.
    #[serde(default = "default_output_max_age")]
    pub output_max_age_secs: u64,
    /// Namespace directories and seed/output files older than this are deleted by `prune`.
    #[serde(default = "default_stale_age")]
    pub stale_age_secs: u64,
    /// Seed and output files kept per namespace (newest first).
    #[serde(default = "default_retention")]
    pub retention: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            image_max_age_secs: default_image_max_age(),
            output_max_age_secs: default_output_max_age(),
            stale_age_secs: default_stale_age(),
            retention: default_retention(),
        }
    }
}

fn default_image_max_age() -> u64 {
    7 * DAY_SECS
}
fn default_output_max_age() -> u64 {
    DAY_SECS
}
fn default_stale_age() -> u64 {
    30 * DAY_SECS
}
fn default_retention() -> usize {
    32
}

/// 64-bit content signature, printed as 16 hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(pub u64);

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl Signature {
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 16 {
            return None;
        }
        u64::from_str_radix(s, 16).ok().map(Self)
    }
}

/// Field-by-field xxh64 hasher. Strings are length-prefixed so adjacent fields can't alias.
pub struct SignatureBuilder {
    hasher: XxHash64,
}

impl SignatureBuilder {
    pub fn new(tag: &str) -> Self {
        let mut b = Self {
            hasher: XxHash64::with_seed(HASH_SEED),
        };
        b.str(tag);
        b
    }
    pub fn str(&mut self, s: &str) -> &mut Self {
        self.hasher.write_u64(s.len() as u64);
        self.hasher.write(s.as_bytes());
        self
    }
    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.hasher.write_u64(v);
        self
    }
    pub fn opt_u32(&mut self, v: Option<u32>) -> &mut Self {
        match v {
            Some(v) => self.u64(1).u64(u64::from(v)),
            None => self.u64(0),
        }
    }
    pub fn finish(&self) -> Signature {
        Signature(self.hasher.finish())
    }
}

/// Signature of everything that shapes a placement except padding and the sprite set.
pub fn seed_signature(cfg: &LayoutConfig) -> Signature {
    let mut b = SignatureBuilder::new("seed");
    b.str(cfg.mode.as_str())
        .str(cfg.optimize.as_str())
        .opt_u32(cfg.max_width)
        .opt_u32(cfg.max_height)
        .u64(cfg.scale.to_bits())
        .u64(u64::from(cfg.trim))
        .u64(budget_key(cfg.max_combinations));
    b.finish()
}

// 0 for an unbounded search so a cap of 0 stays distinct.
fn budget_key(max_combinations: Option<u64>) -> u64 {
    max_combinations.map_or(0, |c| c.saturating_add(1))
}

/// Signature of every input that affects the emitted text, sources included.
pub fn output_signature(cfg: &LayoutConfig, sources: &[(&str, SourceStamp)]) -> Signature {
    let mut b = SignatureBuilder::new("output");
    b.str(cfg.mode.as_str())
        .str(cfg.optimize.as_str())
        .opt_u32(cfg.max_width)
        .opt_u32(cfg.max_height)
        .u64(u64::from(cfg.padding))
        .u64(cfg.scale.to_bits())
        .u64(u64::from(cfg.trim))
        .u64(budget_key(cfg.max_combinations))
        .u64(sources.len() as u64);
    for (key, stamp) in sources {
        b.str(key).u64(stamp.size).u64(stamp.mtime_ticks);
    }
    b.finish()
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn file_age(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    Some(SystemTime::now().duration_since(modified).unwrap_or_default())
}

/// Normalized absolute form of `folder` used to derive its namespace.
pub fn normalize_folder(folder: &Path) -> PathBuf {
    if let Ok(p) = fs::canonicalize(folder) {
        return p;
    }
    let abs = if folder.is_absolute() {
        folder.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(folder))
            .unwrap_or_else(|_| folder.to_path_buf())
    };
    let mut out = PathBuf::new();
    for c in abs.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Writes `contents` to `path` via a sibling temp file and rename. Returns false (after a
/// warning) when the cache write had to be abandoned; never fails the caller.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> bool {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(format!(".tmp.{}", std::process::id()));
    let tmp = path.with_file_name(tmp_name);
    if let Err(e) = fs::write(&tmp, contents) {
        warn!(path = %tmp.display(), error = %e, "cache write failed");
        return false;
    }
    if fs::rename(&tmp, path).is_ok() {
        return true;
    }
    let _ = fs::remove_file(path);
    match fs::rename(&tmp, path) {
        Ok(()) => true,
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            warn!(path = %path.display(), error = %e, "cache rename failed; skipping");
            false
        }
    }
}

/// Per-folder cache namespace with explicit load / prune / persist calls.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
    dir: PathBuf,
    config: CacheConfig,
}

impl CacheStore {
    /// Opens (creating if needed) the namespace for `folder`.
    pub fn open(folder: &Path, config: CacheConfig) -> Result<Self> {
        let root = config
            .root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("spratlayout-cache"));
        let normalized = normalize_folder(folder);
        let mut b = SignatureBuilder::new("folder");
        b.str(&normalized.to_string_lossy().replace('\\', "/"));
        let dir = root.join(b.finish().to_string());
        fs::create_dir_all(&dir)?;
        Ok(Self { root, dir, config })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn images_path(&self) -> PathBuf {
        self.dir.join("images.cache")
    }

    pub fn seed_path(&self, sig: Signature) -> PathBuf {
        self.dir.join(format!("seed-{sig}.cache"))
    }

    pub fn output_path(&self, sig: Signature) -> PathBuf {
        self.dir.join(format!("output-{sig}.cache"))
    }

    /// Best-effort cleanup: drops stale namespaces under the root and trims this namespace's
    /// seed/output files to the retention count.
    pub fn prune(&self) {
        let stale = Duration::from_secs(self.config.stale_age_secs);
        if let Ok(entries) = fs::read_dir(&self.root) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path == self.dir || !path.is_dir() {
                    continue;
                }
                if file_age(&path).is_some_and(|age| age > stale) {
                    debug!(path = %path.display(), "removing stale cache namespace");
                    let _ = fs::remove_dir_all(&path);
                }
            }
        }
        for prefix in ["seed-", "output-"] {
            self.prune_files(prefix, stale);
        }
    }

    fn prune_files(&self, prefix: &str, stale: Duration) {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return;
        };
        let mut files: Vec<(PathBuf, Duration)> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(prefix) && n.ends_with(".cache"))
            })
            .filter_map(|p| file_age(&p).map(|age| (p, age)))
            .collect();
        // newest first
        files.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        for (i, (path, age)) in files.iter().enumerate() {
            if i >= self.config.retention || *age > stale {
                debug!(path = %path.display(), "pruning cache file");
                let _ = fs::remove_file(path);
            }
        }
    }

    pub fn load_images(&self) -> ImageMetadataCache {
        ImageMetadataCache::load(
            &self.images_path(),
            unix_now(),
            self.config.image_max_age_secs,
        )
    }

    pub fn persist_images(&self, cache: &ImageMetadataCache) -> bool {
        write_atomic(&self.images_path(), &cache.to_text())
    }

    pub fn load_seed(&self, sig: Signature) -> Option<SeedEntry> {
        SeedEntry::load(&self.seed_path(sig), sig)
    }

    pub fn persist_seed(&self, entry: &SeedEntry) -> bool {
        write_atomic(&self.seed_path(entry.signature), &entry.to_text())
    }

    pub fn load_output(&self, sig: Signature) -> Option<String> {
        let path = self.output_path(sig);
        let max_age = Duration::from_secs(self.config.output_max_age_secs);
        if file_age(&path).is_none_or(|age| age > max_age) {
            return None;
        }
        output::load(&path, sig)
    }

    pub fn persist_output(&self, sig: Signature, text: &str) -> bool {
        write_atomic(&self.output_path(sig), &output::to_text(sig, text))
    }
}

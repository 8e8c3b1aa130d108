//! Core library for laying out sprites in a texture atlas.
//!
//! - Packers: MaxRects (BSSF/BAF/BL), Shelf, and an arena free-node tree for power-of-two bins
//! - Search: guided multi-width MaxRects search across workers, shelf-only fast mode, power-of-two mode
//! - Caches: per-folder image metadata, placement seeds and finished output, keyed by xxh64 signatures
//! - Output: a line-oriented layout text (parse + format) and JSON helpers
//!
//! Quick example:
//! ```ignore
//! use spratlayout_core::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! let sources = vec![
//!     SourceImage::new("hero.png", "assets/hero.png"),
//!     SourceImage::new("coin.png", "assets/coin.png"),
//! ];
//! let cfg = LayoutConfig::builder().padding(2).trim(true).build();
//! let out = build_layout(&sources, &cfg, &ImageCrateDecoder, None)?;
//! print!("{}", out.text);
//! # Ok(()) }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod export;
pub mod layout_text;
pub mod model;
pub mod packer;
pub mod pipeline;
pub mod search;
pub mod sprite;

pub use cache::{CacheConfig, CacheStore, SeedEntry, Signature};
pub use config::*;
pub use error::*;
pub use export::*;
pub use layout_text::{format_layout, parse_layout};
pub use model::*;
pub use pipeline::*;
pub use search::{LayoutOrigin, SearchOutcome};
pub use sprite::{AlphaImage, ImageCrateDecoder, ImageDecoder, SourceStamp};

/// Convenience prelude for common types and functions.
/// Importing `spratlayout_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::cache::{CacheConfig, CacheStore};
    pub use crate::config::{
        LayoutConfig, LayoutConfigBuilder, LayoutMode, MaxRectsHeuristic, OptimizeTarget,
        SortOrder,
    };
    pub use crate::error::{Result, SpratError};
    pub use crate::model::{Layout, LayoutStats, Rect, Sprite, Trim};
    pub use crate::search::LayoutOrigin;
    pub use crate::sprite::{AlphaImage, ImageCrateDecoder, ImageDecoder};
    pub use crate::{LayoutOutput, SourceImage, build_layout, format_layout, parse_layout, to_json};
}

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheStore, SeedEntry, output_signature, seed_signature};
use crate::config::LayoutConfig;
use crate::error::{Result, SpratError};
use crate::layout_text::{format_layout, parse_layout};
use crate::model::Layout;
use crate::search::{LayoutOrigin, search};
use crate::sprite::{ImageDecoder, SourceStamp, prepare_sprite};

/// One input image: the key written to the layout and the file it is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub key: String,
    pub path: PathBuf,
}

impl SourceImage {
    pub fn new(key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            key: key.into(),
            path: path.into(),
        }
    }
}

/// Final layout plus its text form.
#[derive(Debug, Clone)]
pub struct LayoutOutput {
    pub layout: Layout,
    pub text: String,
    pub origin: LayoutOrigin,
}

#[instrument(skip_all, fields(sources = sources.len()))]
/// Builds the layout for `sources` under `cfg`.
///
/// Notes:
/// - With a `cache`, an output-cache hit is returned without decoding a single image, decoded
///   geometry is reused across runs, and a previous placement is revalidated before searching.
/// - Cache problems never fail the call; they only cost a recomputation.
/// - Sprites are prepared in key order, so the result does not depend on the order of `sources`.
pub fn build_layout(
    sources: &[SourceImage],
    cfg: &LayoutConfig,
    decoder: &dyn ImageDecoder,
    cache: Option<&CacheStore>,
) -> Result<LayoutOutput> {
    cfg.validate()?;
    if sources.is_empty() {
        return Err(SpratError::Empty);
    }
    let mut ordered: Vec<&SourceImage> = sources.iter().collect();
    ordered.sort_by(|a, b| a.key.cmp(&b.key));
    let mut seen = HashSet::with_capacity(ordered.len());
    for s in &ordered {
        if !seen.insert(s.key.as_str()) {
            return Err(SpratError::InvalidInput(format!("duplicate sprite key '{}'", s.key)));
        }
    }

    let Some(store) = cache else {
        let t0 = Instant::now();
        let mut sprites = Vec::with_capacity(ordered.len());
        for s in &ordered {
            sprites.push(prepare_sprite(&s.key, &s.path, cfg, decoder, None)?);
        }
        debug!(ms = t0.elapsed().as_millis() as u64, "sprites prepared");
        let outcome = search(&sprites, cfg, None)?;
        let text = format_layout(&outcome.layout);
        return Ok(LayoutOutput {
            layout: outcome.layout,
            text,
            origin: outcome.origin,
        });
    };

    store.prune();
    let mut stamps = Vec::with_capacity(ordered.len());
    for s in &ordered {
        stamps.push((s.key.as_str(), SourceStamp::of(&s.path)?));
    }
    let out_sig = output_signature(cfg, &stamps);
    if let Some(text) = store.load_output(out_sig) {
        match parse_layout(&text) {
            Ok(layout) => {
                info!(signature = %out_sig, "output cache hit");
                return Ok(LayoutOutput {
                    layout,
                    text,
                    origin: LayoutOrigin::OutputCache,
                });
            }
            Err(e) => debug!(error = %e, "cached output does not parse; recomputing"),
        }
    }

    let t0 = Instant::now();
    let mut meta = store.load_images();
    let mut sprites = Vec::with_capacity(ordered.len());
    for s in &ordered {
        sprites.push(prepare_sprite(&s.key, &s.path, cfg, decoder, Some(&mut meta))?);
    }
    debug!(
        ms = t0.elapsed().as_millis() as u64,
        cached = meta.len(),
        "sprites prepared"
    );
    if !store.persist_images(&meta) {
        warn!("image metadata cache not saved");
    }

    let seed_sig = seed_signature(cfg);
    let seed = store.load_seed(seed_sig);
    let outcome = search(&sprites, cfg, seed.as_ref())?;
    let text = format_layout(&outcome.layout);

    store.persist_output(out_sig, &text);
    if let Some(alt) = &outcome.alternate {
        let alt_cfg = LayoutConfig {
            optimize: cfg.optimize.other(),
            ..cfg.clone()
        };
        store.persist_output(output_signature(&alt_cfg, &stamps), &format_layout(alt));
    }
    store.persist_seed(&SeedEntry::from_layout(seed_sig, cfg.padding, &outcome.layout));

    Ok(LayoutOutput {
        layout: outcome.layout,
        text,
        origin: outcome.origin,
    })
}

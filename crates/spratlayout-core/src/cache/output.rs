use std::fs;
use std::path::Path;

use tracing::debug;

use super::Signature;

pub const OUTPUT_CACHE_TAG: &str = "spratlayout_output_cache";
pub const OUTPUT_CACHE_VERSION: u32 = 1;

pub fn to_text(signature: Signature, layout_text: &str) -> String {
    format!("{OUTPUT_CACHE_TAG} {OUTPUT_CACHE_VERSION}\n{signature}\n{layout_text}")
}

/// Splits an output cache file into its signature and the verbatim layout text.
pub fn parse(text: &str) -> Option<(Signature, &str)> {
    let (header, rest) = text.split_once('\n')?;
    let version = header.strip_prefix(OUTPUT_CACHE_TAG)?.trim();
    if version.parse::<u32>().ok()? != OUTPUT_CACHE_VERSION {
        return None;
    }
    let (sig, body) = rest.split_once('\n')?;
    Some((Signature::parse(sig.trim())?, body))
}

pub fn load(path: &Path, expected: Signature) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    match parse(&text) {
        Some((sig, body)) if sig == expected => Some(body.to_string()),
        Some(_) => {
            debug!(path = %path.display(), "output cache signature mismatch");
            None
        }
        None => {
            debug!(path = %path.display(), "output cache unreadable; ignoring");
            None
        }
    }
}

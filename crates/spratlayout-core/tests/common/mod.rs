#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{Rgba, RgbaImage};
use rand::{Rng, SeedableRng};
use spratlayout_core::model::Sprite;
use spratlayout_core::sprite::{AlphaImage, ImageCrateDecoder, ImageDecoder};
use spratlayout_core::Result;

pub fn random_sprites(seed: u64, count: usize, min: u32, max: u32) -> Vec<Sprite> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let w = rng.gen_range(min..=max);
            let h = rng.gen_range(min..=max);
            Sprite::new(format!("s{i:03}.png"), w, h)
        })
        .collect()
}

pub fn disjoint(sprites: &[Sprite], padding: u32) -> bool {
    for i in 0..sprites.len() {
        for j in (i + 1)..sprites.len() {
            let a = sprites[i].padded_rect(padding).unwrap();
            let b = sprites[j].padded_rect(padding).unwrap();
            if a.intersects(&b) {
                return false;
            }
        }
    }
    true
}

/// Writes a `w x h` PNG; pixels inside `opaque` (x, y, w, h) are opaque, the rest transparent.
/// `None` makes the whole image opaque.
pub fn write_png(dir: &Path, name: &str, w: u32, h: u32, opaque: Option<(u32, u32, u32, u32)>) -> PathBuf {
    let img = RgbaImage::from_fn(w, h, |x, y| {
        let inside = match opaque {
            None => true,
            Some((ox, oy, ow, oh)) => x >= ox && x < ox + ow && y >= oy && y < oy + oh,
        };
        if inside {
            Rgba([200, 30, 30, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    });
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    img.save(&path).unwrap();
    path
}

/// Decoder that counts how many images it actually decoded.
#[derive(Default)]
pub struct CountingDecoder {
    pub decoded: AtomicUsize,
}

impl CountingDecoder {
    pub fn count(&self) -> usize {
        self.decoded.load(Ordering::SeqCst)
    }
}

impl ImageDecoder for CountingDecoder {
    fn decode(&self, path: &Path) -> Result<AlphaImage> {
        self.decoded.fetch_add(1, Ordering::SeqCst);
        ImageCrateDecoder.decode(path)
    }
}

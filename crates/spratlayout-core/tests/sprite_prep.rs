mod common;

use spratlayout_core::cache::ImageMetadataCache;
use spratlayout_core::config::LayoutConfig;
use spratlayout_core::model::{Rect, Trim};
use spratlayout_core::sprite::{
    AlphaImage, BaseGeometry, ImageCrateDecoder, compute_trim, prepare_sprite, scale_dimension,
};

fn block(w: u32, h: u32, x0: u32, y0: u32, bw: u32, bh: u32) -> AlphaImage {
    let mut alpha = vec![0u8; (w * h) as usize];
    for y in y0..y0 + bh {
        for x in x0..x0 + bw {
            alpha[(y * w + x) as usize] = 255;
        }
    }
    AlphaImage::new(w, h, alpha).unwrap()
}

#[test]
fn trim_finds_opaque_bounds() {
    let img = block(10, 10, 2, 5, 4, 3);
    let (rect, trim) = compute_trim(&img);
    assert_eq!(rect, Rect::new(2, 5, 4, 3));
    assert_eq!(trim, Trim::new(2, 5, 4, 2));
}

#[test]
fn fully_transparent_image_collapses_to_one_pixel() {
    let img = AlphaImage::new(8, 6, vec![0; 48]).unwrap();
    let (rect, trim) = compute_trim(&img);
    assert_eq!(rect, Rect::new(0, 0, 1, 1));
    assert_eq!(trim, Trim::new(0, 0, 7, 5));
}

#[test]
fn alpha_buffer_length_checked() {
    assert!(AlphaImage::new(4, 4, vec![0; 15]).is_err());
}

#[test]
fn scale_rounds_and_never_hits_zero() {
    assert_eq!(scale_dimension(50, 0.5).unwrap(), 25);
    assert_eq!(scale_dimension(3, 0.5).unwrap(), 2);
    assert_eq!(scale_dimension(1, 0.1).unwrap(), 1);
    assert!(scale_dimension(u32::MAX, 2.0).is_err());
}

#[test]
fn geometry_without_trim_uses_full_size() {
    let img = block(10, 10, 2, 5, 4, 3);
    let g = BaseGeometry::from_image(&img, false);
    assert_eq!((g.w, g.h, g.trim), (10, 10, Trim::default()));
    let s = g.into_sprite("k", 1.0, 0).unwrap();
    assert_eq!((s.w, s.h), (10, 10));
}

#[test]
fn scaled_trim_offsets_round() {
    let img = block(20, 20, 3, 4, 10, 10);
    let s = BaseGeometry::from_image(&img, true)
        .into_sprite("k", 0.5, 0)
        .unwrap();
    assert_eq!((s.w, s.h), (5, 5));
    // 3*0.5 = 1.5 -> 2, 4*0.5 -> 2, 7*0.5 = 3.5 -> 4, 6*0.5 -> 3
    assert_eq!(s.trim, Trim::new(2, 2, 4, 3));
}

#[test]
fn padded_size_overflow_is_reported() {
    let g = BaseGeometry {
        w: u32::MAX,
        h: 1,
        trim: Trim::default(),
    };
    assert!(g.into_sprite("k", 1.0, 1).is_err());
}

#[test]
fn scenario_half_scale_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_png(dir.path(), "big.png", 50, 50, None);
    let cfg = LayoutConfig::builder().scale(0.5).build();
    let s = prepare_sprite("big.png", &path, &cfg, &ImageCrateDecoder, None).unwrap();
    assert_eq!((s.w, s.h), (25, 25));
}

#[test]
fn metadata_cache_skips_second_decode() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_png(dir.path(), "t.png", 10, 10, Some((2, 5, 4, 3)));
    let cfg = LayoutConfig::builder().trim(true).build();
    let decoder = common::CountingDecoder::default();
    let mut meta = ImageMetadataCache::new();

    let a = prepare_sprite("t.png", &path, &cfg, &decoder, Some(&mut meta)).unwrap();
    let b = prepare_sprite("t.png", &path, &cfg, &decoder, Some(&mut meta)).unwrap();
    assert_eq!(decoder.count(), 1);
    assert_eq!(a, b);
    assert_eq!((a.w, a.h), (4, 3));
    assert_eq!(a.trim, Trim::new(2, 5, 4, 2));

    // the trim flag is part of the key
    let untrimmed = LayoutConfig::default();
    let c = prepare_sprite("t.png", &path, &untrimmed, &decoder, Some(&mut meta)).unwrap();
    assert_eq!(decoder.count(), 2);
    assert_eq!((c.w, c.h), (10, 10));
    assert_eq!(meta.len(), 2);

    let reloaded = ImageMetadataCache::parse(&meta.to_text()).unwrap();
    assert_eq!(reloaded.len(), 2);
}

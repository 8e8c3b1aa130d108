mod common;

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use spratlayout_core::cache::{
    CacheConfig, CacheStore, ImageMetaEntry, ImageMetadataCache, SeedEntry, Signature, output,
    output_signature, seed_signature,
};
use spratlayout_core::config::{LayoutConfig, OptimizeTarget};
use spratlayout_core::search::LayoutOrigin;
use spratlayout_core::sprite::SourceStamp;
use spratlayout_core::{ImageCrateDecoder, SourceImage, SpratError, build_layout, parse_layout};

fn fixture(dir: &Path) -> Vec<SourceImage> {
    let specs: [(&str, u32, u32, Option<(u32, u32, u32, u32)>); 5] = [
        ("hero.png", 40, 48, None),
        ("coin.png", 16, 16, Some((2, 2, 12, 12))),
        ("ui/panel.png", 64, 24, None),
        ("ui/icon.png", 20, 20, Some((0, 4, 20, 12))),
        ("fx/spark.png", 12, 30, None),
    ];
    specs
        .iter()
        .map(|&(name, w, h, opaque)| {
            let path = common::write_png(dir, name, w, h, opaque);
            SourceImage::new(name, path)
        })
        .collect()
}

fn store(folder: &Path, root: &Path) -> CacheStore {
    let cfg = CacheConfig {
        root: Some(root.to_path_buf()),
        ..CacheConfig::default()
    };
    CacheStore::open(folder, cfg).unwrap()
}

fn cache_files(store: &CacheStore, prefix: &str) -> Vec<std::path::PathBuf> {
    let mut v: Vec<_> = fs::read_dir(store.dir())
        .unwrap()
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix))
        })
        .collect();
    v.sort();
    v
}

#[test]
fn uncached_build_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let sources = fixture(dir.path());
    let cfg = LayoutConfig::builder().padding(2).trim(true).build();
    let a = build_layout(&sources, &cfg, &ImageCrateDecoder, None).unwrap();
    let mut reversed = sources.clone();
    reversed.reverse();
    let b = build_layout(&reversed, &cfg, &ImageCrateDecoder, None).unwrap();
    assert_eq!(a.text, b.text);
    assert_eq!(a.origin, LayoutOrigin::Search);
    assert_eq!(parse_layout(&a.text).unwrap(), a.layout);

    let coin = a.layout.find("coin.png").unwrap();
    assert_eq!((coin.w, coin.h), (12, 12));
    assert_eq!((coin.trim.left, coin.trim.top), (2, 2));
}

#[test]
fn output_cache_hit_skips_decoding() {
    let dir = tempfile::tempdir().unwrap();
    let cache_root = tempfile::tempdir().unwrap();
    let sources = fixture(dir.path());
    let store = store(dir.path(), cache_root.path());
    let cfg = LayoutConfig::builder().padding(1).build();
    let decoder = common::CountingDecoder::default();

    let first = build_layout(&sources, &cfg, &decoder, Some(&store)).unwrap();
    assert_eq!(first.origin, LayoutOrigin::Search);
    assert_eq!(decoder.count(), sources.len());
    assert!(store.images_path().exists());
    assert_eq!(cache_files(&store, "seed-").len(), 1);
    // primary + alternate objective
    assert_eq!(cache_files(&store, "output-").len(), 2);

    let second = build_layout(&sources, &cfg, &decoder, Some(&store)).unwrap();
    assert_eq!(second.origin, LayoutOrigin::OutputCache);
    assert_eq!(second.text, first.text);
    assert_eq!(decoder.count(), sources.len());
}

#[test]
fn deleting_output_cache_recomputes_identically() {
    let dir = tempfile::tempdir().unwrap();
    let cache_root = tempfile::tempdir().unwrap();
    let sources = fixture(dir.path());
    let store = store(dir.path(), cache_root.path());
    let cfg = LayoutConfig::builder().trim(true).build();
    let decoder = common::CountingDecoder::default();

    let first = build_layout(&sources, &cfg, &decoder, Some(&store)).unwrap();
    for p in cache_files(&store, "output-") {
        fs::remove_file(p).unwrap();
    }
    let again = build_layout(&sources, &cfg, &decoder, Some(&store)).unwrap();
    assert_eq!(again.text, first.text);
    assert_eq!(again.origin, LayoutOrigin::SeedReuse);
    // geometry came from the image metadata cache
    assert_eq!(decoder.count(), sources.len());
}

#[test]
fn alternate_objective_served_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache_root = tempfile::tempdir().unwrap();
    let sources = fixture(dir.path());
    let store = store(dir.path(), cache_root.path());
    let gpu = LayoutConfig::default();
    build_layout(&sources, &gpu, &ImageCrateDecoder, Some(&store)).unwrap();

    let space = LayoutConfig::builder().optimize(OptimizeTarget::Space).build();
    let cached = build_layout(&sources, &space, &ImageCrateDecoder, Some(&store)).unwrap();
    assert_eq!(cached.origin, LayoutOrigin::OutputCache);

    let fresh = build_layout(&sources, &space, &ImageCrateDecoder, None).unwrap();
    assert_eq!(cached.text, fresh.text);
}

#[test]
fn corrupt_cache_files_are_misses() {
    let dir = tempfile::tempdir().unwrap();
    let cache_root = tempfile::tempdir().unwrap();
    let sources = fixture(dir.path());
    let store = store(dir.path(), cache_root.path());
    let cfg = LayoutConfig::default();
    let first = build_layout(&sources, &cfg, &ImageCrateDecoder, Some(&store)).unwrap();

    for entry in fs::read_dir(store.dir()).unwrap().flatten() {
        fs::write(entry.path(), "garbage\n\"unterminated").unwrap();
    }
    let decoder = common::CountingDecoder::default();
    let again = build_layout(&sources, &cfg, &decoder, Some(&store)).unwrap();
    assert_eq!(again.origin, LayoutOrigin::Search);
    assert_eq!(again.text, first.text);
    assert_eq!(decoder.count(), sources.len());
}

#[test]
fn new_sprite_invalidates_output_and_seed() {
    let dir = tempfile::tempdir().unwrap();
    let cache_root = tempfile::tempdir().unwrap();
    let mut sources = fixture(dir.path());
    let store = store(dir.path(), cache_root.path());
    let cfg = LayoutConfig::default();
    build_layout(&sources, &cfg, &ImageCrateDecoder, Some(&store)).unwrap();

    let extra = common::write_png(dir.path(), "zz.png", 18, 18, None);
    sources.push(SourceImage::new("zz.png", extra));
    let out = build_layout(&sources, &cfg, &ImageCrateDecoder, Some(&store)).unwrap();
    assert_eq!(out.origin, LayoutOrigin::Search);
    assert_eq!(out.layout.sprites.len(), 6);
}

#[test]
fn duplicate_keys_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut sources = fixture(dir.path());
    sources.push(sources[0].clone());
    let err = build_layout(&sources, &LayoutConfig::default(), &ImageCrateDecoder, None).unwrap_err();
    assert!(matches!(err, SpratError::InvalidInput(_)));
    assert!(matches!(
        build_layout(&[], &LayoutConfig::default(), &ImageCrateDecoder, None),
        Err(SpratError::Empty)
    ));
}

#[test]
fn signatures_cover_the_right_fields() {
    let base = LayoutConfig::default();
    let padded = LayoutConfig::builder().padding(3).build();
    assert_eq!(seed_signature(&base), seed_signature(&padded));
    assert_ne!(seed_signature(&base), seed_signature(&LayoutConfig::builder().trim(true).build()));
    let capped = LayoutConfig::builder().max_combinations(Some(4)).build();
    assert_ne!(seed_signature(&base), seed_signature(&capped));
    assert_ne!(
        seed_signature(&LayoutConfig::builder().max_combinations(Some(0)).build()),
        seed_signature(&base)
    );

    let stamp = SourceStamp {
        size: 10,
        mtime_ticks: 99,
    };
    let newer = SourceStamp {
        size: 10,
        mtime_ticks: 100,
    };
    let a = output_signature(&base, &[("a.png", stamp)]);
    assert_ne!(a, output_signature(&padded, &[("a.png", stamp)]));
    assert_ne!(a, output_signature(&base, &[("a.png", newer)]));
    assert_ne!(a, output_signature(&base, &[("b.png", stamp)]));
    assert_eq!(a, output_signature(&base, &[("a.png", stamp)]));
    assert_eq!(Signature::parse(&a.to_string()), Some(a));
}

#[test]
fn cache_file_formats_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let sources = fixture(dir.path());
    let cfg = LayoutConfig::builder().trim(true).padding(2).build();
    let out = build_layout(&sources, &cfg, &ImageCrateDecoder, None).unwrap();

    let sig = seed_signature(&cfg);
    let seed = SeedEntry::from_layout(sig, cfg.padding, &out.layout);
    assert_eq!(SeedEntry::parse(&seed.to_text()), Some(seed.clone()));
    assert!(SeedEntry::parse(&seed.to_text().replace("spratlayout_seed_cache 1", "spratlayout_seed_cache 9")).is_none());

    let text = output::to_text(sig, &out.text);
    let (parsed_sig, body) = output::parse(&text).unwrap();
    assert_eq!(parsed_sig, sig);
    assert_eq!(body, out.text);
}

#[test]
fn namespaces_are_per_folder_and_prunable() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let cfg = CacheConfig {
        root: Some(root.path().to_path_buf()),
        retention: 1,
        ..CacheConfig::default()
    };
    let sa = CacheStore::open(a.path(), cfg.clone()).unwrap();
    let sb = CacheStore::open(b.path(), cfg.clone()).unwrap();
    assert_ne!(sa.dir(), sb.dir());
    assert_eq!(CacheStore::open(a.path(), cfg).unwrap().dir(), sa.dir());

    sa.persist_output(Signature(1), "atlas 1,1\n");
    sa.persist_output(Signature(2), "atlas 2,2\n");
    sa.prune();
    assert_eq!(cache_files(&sa, "output-").len(), 1);
    assert!(sb.dir().exists());
}

#[test]
fn capped_run_does_not_seed_unbounded_run() {
    let dir = tempfile::tempdir().unwrap();
    let cache_root = tempfile::tempdir().unwrap();
    let sources = fixture(dir.path());
    let store = store(dir.path(), cache_root.path());
    let capped = LayoutConfig::builder()
        .threads(Some(1))
        .max_combinations(Some(1))
        .build();
    let unbounded = LayoutConfig::builder().threads(Some(1)).build();

    build_layout(&sources, &capped, &ImageCrateDecoder, Some(&store)).unwrap();
    let out = build_layout(&sources, &unbounded, &ImageCrateDecoder, Some(&store)).unwrap();
    assert_eq!(out.origin, LayoutOrigin::Search);

    let reference = build_layout(&sources, &unbounded, &ImageCrateDecoder, None).unwrap();
    assert_eq!(out.text, reference.text);
}

fn meta_entry(path: &Path, size: u64, mtime_ticks: u64, cached_at: u64) -> ImageMetaEntry {
    ImageMetaEntry {
        path: path.to_string_lossy().into_owned(),
        trim_enabled: false,
        file_size: size,
        mtime_ticks,
        width: 8,
        height: 8,
        trim: Default::default(),
        cached_at,
    }
}

#[test]
fn image_cache_drops_old_and_changed_entries() {
    let dir = tempfile::tempdir().unwrap();
    let fresh = common::write_png(dir.path(), "fresh.png", 8, 8, None);
    let old = common::write_png(dir.path(), "old.png", 8, 8, None);
    let changed = common::write_png(dir.path(), "changed.png", 8, 8, None);
    let stamp = |p: &Path| SourceStamp::of(p).unwrap();

    let max_age = 100;
    let now = 10_000;
    let mut cache = ImageMetadataCache::new();
    let s = stamp(&fresh);
    cache.insert(meta_entry(&fresh, s.size, s.mtime_ticks, now - max_age));
    let s = stamp(&old);
    cache.insert(meta_entry(&old, s.size, s.mtime_ticks, now - max_age - 1));
    let s = stamp(&changed);
    cache.insert(meta_entry(&changed, s.size + 1, s.mtime_ticks, now));
    let s = stamp(&fresh);
    let mut moved = meta_entry(&fresh, s.size, s.mtime_ticks.wrapping_add(1), now);
    moved.trim_enabled = true;
    cache.insert(moved);
    assert_eq!(cache.len(), 4);

    let file = dir.path().join("images.cache");
    fs::write(&file, cache.to_text()).unwrap();
    let mut loaded = ImageMetadataCache::load(&file, now, max_age);
    assert_eq!(loaded.len(), 1);
    assert!(loaded.lookup(&fresh.to_string_lossy(), false, stamp(&fresh)).is_some());

    // the same file read later ages out the remaining entry
    assert!(ImageMetadataCache::load(&file, now + 1, max_age).is_empty());
}

#[test]
fn output_cache_expires_by_age() {
    let dir = tempfile::tempdir().unwrap();
    let cache_root = tempfile::tempdir().unwrap();
    let sources = fixture(dir.path());
    let store = CacheStore::open(
        dir.path(),
        CacheConfig {
            root: Some(cache_root.path().to_path_buf()),
            output_max_age_secs: 60,
            ..CacheConfig::default()
        },
    )
    .unwrap();
    let cfg = LayoutConfig::default();
    let first = build_layout(&sources, &cfg, &ImageCrateDecoder, Some(&store)).unwrap();

    let files = cache_files(&store, "output-");
    assert!(!files.is_empty());
    let past = SystemTime::now() - Duration::from_secs(2 * 60 * 60);
    for p in &files {
        fs::OpenOptions::new()
            .write(true)
            .open(p)
            .unwrap()
            .set_modified(past)
            .unwrap();
    }
    assert!(store.load_output(Signature(7)).is_none());
    store.persist_output(Signature(7), "atlas 1,1\n");
    assert_eq!(store.load_output(Signature(7)).as_deref(), Some("atlas 1,1\n"));

    let again = build_layout(&sources, &cfg, &ImageCrateDecoder, Some(&store)).unwrap();
    assert_ne!(again.origin, LayoutOrigin::OutputCache);
    assert_eq!(again.text, first.text);
}

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgAction, Parser};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use spratlayout_core::config::{LayoutConfig, LayoutMode, OptimizeTarget};
use spratlayout_core::{CacheConfig, CacheStore, ImageCrateDecoder, SourceImage, build_layout};
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(
    name = "spratlayout",
    about = "Compute a sprite atlas layout for a folder of images",
    version,
    author
)]
struct Cli {
    // Input/Output
    /// Folder containing the sprite images
    #[arg(help_heading = "Input/Output")]
    folder: PathBuf,
    /// Write the layout to this file instead of stdout
    #[arg(short, long, help_heading = "Input/Output")]
    out: Option<PathBuf>,
    /// Output format: text | json | json-hash
    #[arg(long, default_value = "text", value_parser = ["text", "json", "json-hash"], help_heading = "Input/Output")]
    format: String,
    /// YAML config file; command-line flags override its values
    #[arg(long, help_heading = "Input/Output")]
    config: Option<PathBuf>,
    /// Include patterns (glob). If set, only files matching any pattern are considered
    #[arg(long, help_heading = "Input/Output")]
    include: Vec<String>,
    /// Exclude patterns (glob). Files matching any pattern will be ignored
    #[arg(long, help_heading = "Input/Output")]
    exclude: Vec<String>,

    // Layout
    /// Layout mode: compact | fast | pot
    #[arg(long, help_heading = "Layout")]
    mode: Option<LayoutMode>,
    /// Optimize target: gpu | space
    #[arg(long, help_heading = "Layout")]
    optimize: Option<OptimizeTarget>,
    /// Max atlas width (unbounded if unset)
    #[arg(long, help_heading = "Layout")]
    max_width: Option<u32>,
    /// Max atlas height (unbounded if unset)
    #[arg(long, help_heading = "Layout")]
    max_height: Option<u32>,
    /// Padding between sprites
    #[arg(long, help_heading = "Layout")]
    padding: Option<u32>,

    // Image Processing
    /// Scale factor applied to every sprite
    #[arg(long, help_heading = "Image Processing")]
    scale: Option<f64>,
    /// Trim transparent borders
    #[arg(long, action = ArgAction::Set, num_args = 0..=1, default_missing_value = "true", help_heading = "Image Processing")]
    trim: Option<bool>,

    // Search
    /// Worker threads for the compact search (default: available parallelism)
    #[arg(long, help_heading = "Search")]
    threads: Option<usize>,
    /// Cap on (width, order, heuristic) combinations tried by the compact search
    #[arg(long, help_heading = "Search")]
    max_combinations: Option<u64>,

    // Cache
    /// Disable all on-disk caches
    #[arg(long, default_value_t = false, help_heading = "Cache")]
    no_cache: bool,
    /// Cache root directory (default: <temp>/spratlayout-cache)
    #[arg(long, help_heading = "Cache")]
    cache_dir: Option<PathBuf>,

    // Export
    /// Print the merged configuration (after CLI/YAML) and exit
    #[arg(long, default_value_t = false, help_heading = "Export")]
    print_config: bool,
    /// Output format for --print-config: json|yaml
    #[arg(long, default_value = "json", value_parser = ["json", "yaml"], help_heading = "Export")]
    print_config_format: String,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, help_heading = "Logging")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(short, long, default_value_t = false, help_heading = "Logging")]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    run(&cli)
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let base = match &cli.config {
        Some(path) => {
            let file = fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            let y: YamlConfig = serde_yaml::from_str(&file)
                .with_context(|| format!("parse config {}", path.display()))?;
            y.into_layout_config(LayoutConfig::default())?
        }
        None => LayoutConfig::default(),
    };
    let cfg = apply_flags(cli, base);

    if cli.print_config {
        match cli.print_config_format.as_str() {
            "yaml" => println!("{}", serde_yaml::to_string(&cfg)?),
            _ => println!("{}", serde_json::to_string_pretty(&cfg)?),
        }
        return Ok(());
    }
    cfg.validate()?;

    let sources = gather_sources(&cli.folder, &cli.include, &cli.exclude)?;
    info!(count = sources.len(), folder = %cli.folder.display(), "collected images");
    if sources.is_empty() {
        anyhow::bail!("no images found in {}", cli.folder.display());
    }

    let store = if cli.no_cache {
        None
    } else {
        let cache_cfg = CacheConfig {
            root: cli.cache_dir.clone(),
            ..CacheConfig::default()
        };
        Some(
            CacheStore::open(&cli.folder, cache_cfg)
                .with_context(|| format!("open cache for {}", cli.folder.display()))?,
        )
    };
    if let Some(s) = &store {
        debug!(dir = %s.dir().display(), "cache namespace");
    }

    let out = build_layout(&sources, &cfg, &ImageCrateDecoder, store.as_ref())?;
    let stats = out.layout.stats();
    info!(origin = ?out.origin, "{}", stats.summary());

    let rendered = match cli.format.as_str() {
        "json" | "json-hash" => {
            let value = if cli.format == "json" {
                spratlayout_core::to_json(&out.layout)
            } else {
                spratlayout_core::to_json_hash(&out.layout)
            };
            let mut s = serde_json::to_string_pretty(&value)?;
            s.push('\n');
            s
        }
        _ => out.text,
    };
    match &cli.out {
        Some(path) => {
            fs::write(path, &rendered).with_context(|| format!("write {}", path.display()))?;
            info!(path = %path.display(), "layout written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(rendered.as_bytes())
                .context("write layout to stdout")?;
        }
    }
    Ok(())
}

fn apply_flags(cli: &Cli, mut cfg: LayoutConfig) -> LayoutConfig {
    if let Some(v) = cli.mode {
        cfg.mode = v;
    }
    if let Some(v) = cli.optimize {
        cfg.optimize = v;
    }
    if cli.max_width.is_some() {
        cfg.max_width = cli.max_width;
    }
    if cli.max_height.is_some() {
        cfg.max_height = cli.max_height;
    }
    if let Some(v) = cli.padding {
        cfg.padding = v;
    }
    if let Some(v) = cli.scale {
        cfg.scale = v;
    }
    if let Some(v) = cli.trim {
        cfg.trim = v;
    }
    if cli.threads.is_some() {
        cfg.threads = cli.threads;
    }
    if cli.max_combinations.is_some() {
        cfg.max_combinations = cli.max_combinations;
    }
    cfg
}

/// Images under `folder`, keyed by their `/`-separated path relative to it, sorted by key.
fn gather_sources(folder: &Path, include: &[String], exclude: &[String]) -> anyhow::Result<Vec<SourceImage>> {
    let inc_set = build_globset(include)?;
    let exc_set = build_globset(exclude)?;
    if !folder.is_dir() {
        anyhow::bail!("{} is not a directory", folder.display());
    }
    let mut list = Vec::new();
    for entry in WalkDir::new(folder).into_iter().filter_map(|e| e.ok()) {
        let p = entry.path();
        if !p.is_file() || !is_image(p) {
            continue;
        }
        let rel = p.strip_prefix(folder).unwrap_or(p);
        let key = rel.to_string_lossy().replace('\\', "/");
        if should_skip(&key, inc_set.as_ref(), exc_set.as_ref()) {
            continue;
        }
        list.push(SourceImage::new(key, p));
    }
    list.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(list)
}

fn build_globset(patterns: &[String]) -> anyhow::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut b = GlobSetBuilder::new();
    for pat in patterns {
        b.add(Glob::new(pat).with_context(|| format!("bad glob '{pat}'"))?);
    }
    Ok(Some(b.build()?))
}

fn should_skip(key: &str, include: Option<&GlobSet>, exclude: Option<&GlobSet>) -> bool {
    if let Some(ex) = exclude {
        if ex.is_match(key) {
            return true;
        }
    }
    if let Some(inc) = include {
        if !inc.is_match(key) {
            return true;
        }
    }
    false
}

fn is_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_ascii_lowercase()),
        Some(ext) if matches!(ext.as_str(), "png" | "jpg" | "jpeg" | "bmp" | "tga" | "gif")
    )
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => "info".into(),
            1 => "debug".into(),
            _ => "trace".into(),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct YamlConfig {
    mode: Option<String>,
    optimize: Option<String>,
    max_width: Option<u32>,
    max_height: Option<u32>,
    padding: Option<u32>,
    scale: Option<f64>,
    trim: Option<bool>,
    threads: Option<usize>,
    max_combinations: Option<u64>,
}

impl YamlConfig {
    fn into_layout_config(self, mut cfg: LayoutConfig) -> anyhow::Result<LayoutConfig> {
        if let Some(v) = self.mode {
            cfg.mode = v.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(v) = self.optimize {
            cfg.optimize = v.parse().map_err(anyhow::Error::msg)?;
        }
        if self.max_width.is_some() {
            cfg.max_width = self.max_width;
        }
        if self.max_height.is_some() {
            cfg.max_height = self.max_height;
        }
        if let Some(v) = self.padding {
            cfg.padding = v;
        }
        if let Some(v) = self.scale {
            cfg.scale = v;
        }
        if let Some(v) = self.trim {
            cfg.trim = v;
        }
        if self.threads.is_some() {
            cfg.threads = self.threads;
        }
        if self.max_combinations.is_some() {
            cfg.max_combinations = self.max_combinations;
        }
        Ok(cfg)
    }
}

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Layout engine configuration.
/// Key notes:
///   - `mode` selects the packing family (guided MaxRects search, shelf rows, power-of-two grid)
///   - `optimize` picks which objective the candidate evaluator ranks by
///   - `threads` and `max_combinations` bound the guided search
///
/// Search modes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    /// Guided MaxRects search over candidate widths, sort orders and heuristics (best density).
    Compact,
    /// Single shelf pass (fastest, coarse).
    Fast,
    /// Power-of-two atlas sides (legacy GPU constraint).
    Pot,
}

impl LayoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Fast => "fast",
            Self::Pot => "pot",
        }
    }
}

impl FromStr for LayoutMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "fast" => Ok(Self::Fast),
            "pot" | "pow2" => Ok(Self::Pot),
            other => Err(format!("unknown layout mode: {other}")),
        }
    }
}

/// Objective used to rank packing candidates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OptimizeTarget {
    /// Smallest longest side first (GPU texture size classes).
    Gpu,
    /// Smallest area first.
    Space,
}

impl OptimizeTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpu => "gpu",
            Self::Space => "space",
        }
    }

    /// The objective that is not `self`.
    pub fn other(&self) -> Self {
        match self {
            Self::Gpu => Self::Space,
            Self::Space => Self::Gpu,
        }
    }
}

impl FromStr for OptimizeTarget {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gpu" => Ok(Self::Gpu),
            "space" => Ok(Self::Space),
            other => Err(format!("unknown optimize target: {other}")),
        }
    }
}

/// MaxRects placement heuristics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MaxRectsHeuristic {
    BestShortSideFit,
    BestAreaFit,
    BottomLeft,
}

impl MaxRectsHeuristic {
    pub const ALL: [MaxRectsHeuristic; 3] = [
        MaxRectsHeuristic::BestShortSideFit,
        MaxRectsHeuristic::BestAreaFit,
        MaxRectsHeuristic::BottomLeft,
    ];
}

impl FromStr for MaxRectsHeuristic {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bssf" | "bestshortsidefit" => Ok(Self::BestShortSideFit),
            "baf" | "bestareafit" => Ok(Self::BestAreaFit),
            "bl" | "bottomleft" => Ok(Self::BottomLeft),
            other => Err(format!("unknown maxrects heuristic: {other}")),
        }
    }
}

/// Sprite orderings tried by the search. All are descending; ties fall back to the other
/// dimension and then to the path so every order is total.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    HeightDesc,
    WidthDesc,
    AreaDesc,
    MaxSideDesc,
    PerimeterDesc,
}

impl SortOrder {
    pub const ALL: [SortOrder; 5] = [
        SortOrder::HeightDesc,
        SortOrder::WidthDesc,
        SortOrder::AreaDesc,
        SortOrder::MaxSideDesc,
        SortOrder::PerimeterDesc,
    ];
}

impl FromStr for SortOrder {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "height_desc" => Ok(Self::HeightDesc),
            "width_desc" => Ok(Self::WidthDesc),
            "area_desc" => Ok(Self::AreaDesc),
            "max_side_desc" => Ok(Self::MaxSideDesc),
            "perimeter_desc" => Ok(Self::PerimeterDesc),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutConfig {
    #[serde(default = "default_mode")]
    pub mode: LayoutMode,
    #[serde(default = "default_optimize")]
    pub optimize: OptimizeTarget,
    /// Maximum atlas width in pixels (`None` = unbounded).
    #[serde(default)]
    pub max_width: Option<u32>,
    /// Maximum atlas height in pixels (`None` = unbounded).
    #[serde(default)]
    pub max_height: Option<u32>,
    /// Pixels reserved on the right/bottom of every sprite during placement.
    #[serde(default)]
    pub padding: u32,
    /// Global rescale factor applied before packing.
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Trim transparent borders.
    #[serde(default)]
    pub trim: bool,

    // search controls
    /// Worker thread cap. None => available parallelism.
    #[serde(default)]
    pub threads: Option<usize>,
    /// Cap on (width, sort order, heuristic) combinations. None => unbounded.
    #[serde(default)]
    pub max_combinations: Option<u64>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            optimize: default_optimize(),
            max_width: None,
            max_height: None,
            padding: 0,
            scale: default_scale(),
            trim: false,
            threads: None,
            max_combinations: None,
        }
    }
}

impl LayoutConfig {
    /// Validates the configuration parameters.
    ///
    /// Returns an error if:
    /// - `scale` is not a positive finite number
    /// - a dimension limit is zero
    /// - `threads` is zero
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::SpratError;

        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(SpratError::InvalidConfig(format!(
                "scale must be a positive finite number, got {}",
                self.scale
            )));
        }
        if self.max_width == Some(0) || self.max_height == Some(0) {
            return Err(SpratError::InvalidConfig(format!(
                "atlas limits must be non-zero ({:?}x{:?})",
                self.max_width, self.max_height
            )));
        }
        if self.threads == Some(0) {
            return Err(SpratError::InvalidConfig(
                "threads must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn default_mode() -> LayoutMode {
    LayoutMode::Compact
}
fn default_optimize() -> OptimizeTarget {
    OptimizeTarget::Gpu
}
fn default_scale() -> f64 {
    1.0
}

/// Builder for `LayoutConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct LayoutConfigBuilder {
    cfg: LayoutConfig,
}

impl LayoutConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: LayoutConfig::default(),
        }
    }
    pub fn mode(mut self, v: LayoutMode) -> Self {
        self.cfg.mode = v;
        self
    }
    pub fn optimize(mut self, v: OptimizeTarget) -> Self {
        self.cfg.optimize = v;
        self
    }
    pub fn with_max_dimensions(mut self, w: Option<u32>, h: Option<u32>) -> Self {
        self.cfg.max_width = w;
        self.cfg.max_height = h;
        self
    }
    pub fn padding(mut self, v: u32) -> Self {
        self.cfg.padding = v;
        self
    }
    pub fn scale(mut self, v: f64) -> Self {
        self.cfg.scale = v;
        self
    }
    pub fn trim(mut self, v: bool) -> Self {
        self.cfg.trim = v;
        self
    }
    pub fn threads(mut self, v: Option<usize>) -> Self {
        self.cfg.threads = v;
        self
    }
    pub fn max_combinations(mut self, v: Option<u64>) -> Self {
        self.cfg.max_combinations = v;
        self
    }
    pub fn build(self) -> LayoutConfig {
        self.cfg
    }
}

impl LayoutConfig {
    /// Create a fluent builder for `LayoutConfig`.
    pub fn builder() -> LayoutConfigBuilder {
        LayoutConfigBuilder::new()
    }
}

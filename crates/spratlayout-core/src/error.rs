use thiserror::Error;

/// A malformed line in layout text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// 1-based line number.
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SpratError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid layout text: {0}")]
    Parse(#[from] ParseError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Dimension overflow while computing {0}")]
    DimensionOverflow(&'static str),
    #[error("Atlas limits exceeded: {0}")]
    BoundsExceeded(String),
    #[error("No packing strategy produced a valid layout ({attempts} combinations tried)")]
    PackingFailed { attempts: u64 },
    #[error("Nothing to pack")]
    Empty,
}

pub type Result<T> = std::result::Result<T, SpratError>;

/// Checked `a + b` for pixel arithmetic.
pub(crate) fn add_u32(a: u32, b: u32, what: &'static str) -> Result<u32> {
    a.checked_add(b).ok_or(SpratError::DimensionOverflow(what))
}

/// Area of a `w x h` rectangle; two `u32` sides always fit in `u64`.
pub(crate) fn mul_area(w: u32, h: u32) -> u64 {
    u64::from(w) * u64::from(h)
}

pub(crate) fn add_u64(a: u64, b: u64, what: &'static str) -> Result<u64> {
    a.checked_add(b).ok_or(SpratError::DimensionOverflow(what))
}

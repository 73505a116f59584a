//! Shared types for the dalgona edge detection pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `RgbaImage` so downstream crates can hand decoded images to
/// the pipeline without depending on `image` directly.
pub use image::RgbaImage;

/// Re-export `GrayImage` for edge-mask conversion.
pub use image::GrayImage;

/// Tallest image the cut-out UI feeds into the pipeline.
///
/// Callers scale larger images down to this height before detection to
/// keep the O(width × height × kernel²) convolutions interactive. The
/// pipeline itself never resizes.
pub const MAX_IMAGE_HEIGHT: u32 = 300;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width as a buffer stride.
    #[must_use]
    pub const fn width_usize(self) -> usize {
        self.width as usize
    }

    /// Height as a row count.
    #[must_use]
    pub const fn height_usize(self) -> usize {
        self.height as usize
    }

    /// Number of pixels (`width * height`), the length of every scalar
    /// buffer derived from the source image.
    #[must_use]
    pub const fn pixel_count(self) -> usize {
        self.width_usize() * self.height_usize()
    }

    /// Row-major index of pixel `(x, y)`.
    #[must_use]
    pub const fn index(self, x: usize, y: usize) -> usize {
        y * self.width_usize() + x
    }

    /// Check that the dimensions are non-zero and that an RGBA buffer of
    /// this size is addressable, returning the expected byte length.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ZeroDimension`] if either side is zero and
    /// [`PipelineError::DimensionOverflow`] if `width * height * 4` does
    /// not fit in `usize`.
    pub fn rgba_len(self) -> Result<usize, PipelineError> {
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::ZeroDimension {
                width: self.width,
                height: self.height,
            });
        }
        self.width_usize()
            .checked_mul(self.height_usize())
            .and_then(|n| n.checked_mul(4))
            .ok_or(PipelineError::DimensionOverflow {
                width: self.width,
                height: self.height,
            })
    }
}

/// Byte layout of the caller's 4-byte pixels.
///
/// Luma is always `0.299 * red + 0.587 * green + 0.114 * blue`; the
/// channel order decides which byte of each pixel is treated as red,
/// green and blue. The fourth byte (alpha) is ignored either way.
///
/// Canvas `ImageData` is [`Rgba`](Self::Rgba). The cut-out UI this
/// pipeline was first written for read canvas bytes as if they were
/// [`Bgra`](Self::Bgra); select that order to reproduce its luma
/// exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    /// Bytes are `[R, G, B, A]`.
    #[default]
    Rgba,
    /// Bytes are `[B, G, R, A]`.
    Bgra,
}

impl ChannelOrder {
    /// Byte offsets of the red, green and blue channels within a pixel.
    #[must_use]
    pub const fn rgb_offsets(self) -> [usize; 3] {
        match self {
            Self::Rgba => [0, 1, 2],
            Self::Bgra => [2, 1, 0],
        }
    }
}

/// Lower/upper hysteresis thresholds on the max-normalized gradient
/// magnitude.
///
/// Once resolved by [`crate::threshold::resolve`], a pair always
/// satisfies `0 <= lower <= upper <= 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Magnitudes at or below this are discarded before suppression.
    #[serde(rename = "lowerThreshold")]
    pub lower: f64,
    /// Magnitudes above this are confirmed edges.
    #[serde(rename = "upperThreshold")]
    pub upper: f64,
}

impl Thresholds {
    /// Create a threshold pair without validation.
    #[must_use]
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }
}

/// How long the hysteresis linker keeps propagating strong edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HysteresisMode {
    /// Run exactly this many passes (fewer if a pass promotes nothing).
    ///
    /// Bounded runtime regardless of image content.
    FixedPasses(usize),
    /// Repeat passes until one promotes no pixel.
    Converge,
}

/// Configuration for a single detection run.
///
/// Every field has a default; `DetectConfig::default()` auto-estimates
/// both thresholds, reads bytes as RGBA, and links edges with the fixed
/// pass count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    /// Caller-supplied lower threshold in `[0, 1]`.
    ///
    /// When both thresholds are absent (or zero) the pair is estimated
    /// from the gradient magnitude distribution. Out-of-range values are
    /// clamped.
    pub lower_threshold: Option<f64>,

    /// Caller-supplied upper threshold in `[0, 1]`. See
    /// [`lower_threshold`](Self::lower_threshold).
    pub upper_threshold: Option<f64>,

    /// Byte layout of the input pixels.
    pub channel_order: ChannelOrder,

    /// Link weak edges until convergence instead of a fixed number of
    /// passes.
    pub exhaustive_hysteresis: bool,
}

impl DetectConfig {
    /// Default lower threshold (auto-estimate).
    pub const DEFAULT_LOWER_THRESHOLD: Option<f64> = None;
    /// Default upper threshold (auto-estimate).
    pub const DEFAULT_UPPER_THRESHOLD: Option<f64> = None;
    /// Default pixel byte layout.
    pub const DEFAULT_CHANNEL_ORDER: ChannelOrder = ChannelOrder::Rgba;
    /// Default hysteresis mode flag (fixed pass count).
    pub const DEFAULT_EXHAUSTIVE_HYSTERESIS: bool = false;
    /// Number of linking passes in fixed-pass mode.
    pub const HYSTERESIS_PASSES: usize = 2;

    /// Config with explicit thresholds and all other fields defaulted.
    #[must_use]
    pub fn with_thresholds(lower: f64, upper: f64) -> Self {
        Self {
            lower_threshold: Some(lower),
            upper_threshold: Some(upper),
            ..Self::default()
        }
    }

    /// The hysteresis mode selected by
    /// [`exhaustive_hysteresis`](Self::exhaustive_hysteresis).
    #[must_use]
    pub const fn hysteresis_mode(&self) -> HysteresisMode {
        if self.exhaustive_hysteresis {
            HysteresisMode::Converge
        } else {
            HysteresisMode::FixedPasses(Self::HYSTERESIS_PASSES)
        }
    }
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            lower_threshold: Self::DEFAULT_LOWER_THRESHOLD,
            upper_threshold: Self::DEFAULT_UPPER_THRESHOLD,
            channel_order: Self::DEFAULT_CHANNEL_ORDER,
            exhaustive_hysteresis: Self::DEFAULT_EXHAUSTIVE_HYSTERESIS,
        }
    }
}

/// Binary edge map produced by the pipeline.
///
/// Every value is exactly `0.0` (background) or `1.0` (edge).
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeMask {
    dimensions: Dimensions,
    values: Vec<f64>,
}

impl EdgeMask {
    /// Wrap a {0, 1}-valued buffer of `dimensions.pixel_count()` values.
    pub(crate) fn new(dimensions: Dimensions, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), dimensions.pixel_count());
        debug_assert!(values.iter().all(|&v| v == 0.0 || v == 1.0));
        Self { dimensions, values }
    }

    /// Dimensions of the mask.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Row-major mask values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Consume the mask and return its row-major values.
    #[must_use]
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Whether pixel `(x, y)` is an edge. Coordinates outside the mask
    /// are never edges.
    #[must_use]
    pub fn is_edge(&self, x: u32, y: u32) -> bool {
        x < self.dimensions.width
            && y < self.dimensions.height
            && self.values[self.dimensions.index(x as usize, y as usize)] == 1.0
    }

    /// Number of edge pixels.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.values.iter().filter(|&&v| v == 1.0).count()
    }

    /// Expand to RGBA bytes: edges white, background black, fully opaque.
    #[must_use]
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        crate::grayscale::expand_to_rgba(self.values.iter().map(|v| v * 255.0))
    }

    /// Convert to a grayscale image with edges at 255.
    #[must_use]
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.dimensions.width, self.dimensions.height, |x, y| {
            image::Luma([if self.is_edge(x, y) { 255 } else { 0 }])
        })
    }
}

/// Result of a complete detection run.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Final binary edge map.
    pub edges: EdgeMask,
    /// Threshold pair actually applied (supplied or estimated).
    pub thresholds: Thresholds,
    /// Whether `thresholds` were estimated from the magnitude
    /// distribution rather than supplied by the caller.
    pub estimated: bool,
}

/// Errors reported before any pipeline stage runs.
///
/// The stages themselves are infallible; every error here is a caller
/// contract violation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    /// Width or height is zero.
    #[error("image dimensions must be non-zero, got {width}x{height}")]
    ZeroDimension {
        /// Supplied width.
        width: u32,
        /// Supplied height.
        height: u32,
    },

    /// `width * height * 4` overflows the address space.
    #[error("image dimensions {width}x{height} are too large")]
    DimensionOverflow {
        /// Supplied width.
        width: u32,
        /// Supplied height.
        height: u32,
    },

    /// Pixel buffer length does not match `width * height * 4`.
    #[error("pixel buffer has {actual} bytes, expected {expected} (width * height * 4)")]
    BufferLength {
        /// Required length in bytes.
        expected: usize,
        /// Supplied length in bytes.
        actual: usize,
    },

    /// A supplied threshold is NaN.
    #[error("{which} threshold must be a number, got {value}")]
    InvalidThreshold {
        /// `"lower"` or `"upper"`.
        which: &'static str,
        /// The offending value.
        value: f64,
    },
}

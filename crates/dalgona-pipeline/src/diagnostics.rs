//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! threshold tuning and performance work. [`detect_with_diagnostics`]
//! runs the same stage sequence as [`crate::detect`], emits the same
//! progress events, and additionally records how long each stage took
//! and what it produced.
//!
//! Time is read through the [`Clock`] trait so the library stays free of
//! platform clocks; the bench binary supplies one backed by
//! `std::time::Instant`.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::Pipeline;
use crate::stage::StageEvent;
use crate::types::{ChannelOrder, DetectConfig, Detection, Dimensions, PipelineError, Thresholds};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of monotonic timestamps for stage timing.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// The current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Luma conversion.
    pub grayscale: StageDiagnostics,
    /// Scaling luma to `[0, 1]`.
    pub normalize: StageDiagnostics,
    /// Gaussian blur.
    pub blur: StageDiagnostics,
    /// Horizontal derivative.
    pub x_derivative: StageDiagnostics,
    /// Vertical derivative.
    pub y_derivative: StageDiagnostics,
    /// Magnitude and direction.
    pub gradient: StageDiagnostics,
    /// Magnitude normalization and threshold resolution.
    pub thresholds: StageDiagnostics,
    /// Non-maximum suppression.
    pub suppression: StageDiagnostics,
    /// Hysteresis linking.
    pub hysteresis: StageDiagnostics,
    /// Total wall-clock duration of the entire run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary of the final result.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Luma conversion.
    Grayscale {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Byte layout the pixels were read with.
        channel_order: ChannelOrder,
    },
    /// Scaling luma to `[0, 1]`.
    Normalize {
        /// Smallest normalized luma.
        min: f64,
        /// Largest normalized luma.
        max: f64,
    },
    /// Gaussian blur.
    Blur {
        /// Kernel side length.
        kernel_size: usize,
    },
    /// One derivative kernel.
    Derivative {
        /// Most negative response.
        min: f64,
        /// Most positive response.
        max: f64,
    },
    /// Magnitude and direction.
    Gradient {
        /// Largest raw magnitude (the normalization divisor).
        max_magnitude: f64,
        /// Pixels with a nonzero magnitude.
        nonzero_count: usize,
    },
    /// Threshold resolution.
    Thresholds {
        /// Applied lower threshold.
        lower: f64,
        /// Applied upper threshold.
        upper: f64,
        /// Whether the pair was estimated.
        estimated: bool,
    },
    /// Non-maximum suppression.
    Suppression {
        /// Nonzero pixels after suppression (weak and strong).
        candidate_count: usize,
        /// Pixels snapped to strong.
        strong_count: usize,
    },
    /// Hysteresis linking.
    Hysteresis {
        /// Passes run.
        passes: usize,
        /// Weak pixels promoted to strong.
        promoted: usize,
        /// Edge pixels in the final mask.
        edge_pixel_count: usize,
        /// Total pixel count, for edge density.
        total_pixel_count: usize,
    },
}

/// High-level summary of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Image width in pixels.
    pub image_width: u32,
    /// Image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: usize,
    /// Edge pixels in the final mask.
    pub edge_pixel_count: usize,
    /// `edge_pixel_count / pixel_count`.
    pub edge_density: f64,
    /// Applied threshold pair.
    pub thresholds: Thresholds,
    /// Whether the pair was estimated.
    pub estimated: bool,
}

impl PipelineSummary {
    #[allow(clippy::cast_precision_loss)]
    fn new(detection: &Detection) -> Self {
        let dimensions = detection.edges.dimensions();
        let pixel_count = dimensions.pixel_count();
        let edge_pixel_count = detection.edges.edge_count();
        Self {
            image_width: dimensions.width,
            image_height: dimensions.height,
            pixel_count,
            edge_pixel_count,
            edge_density: if pixel_count > 0 {
                edge_pixel_count as f64 / pixel_count as f64
            } else {
                0.0
            },
            thresholds: detection.thresholds,
            estimated: detection.estimated,
        }
    }
}

impl PipelineDiagnostics {
    /// Per-stage diagnostics with display names, in execution order.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 9] {
        [
            ("Grayscale", &self.grayscale),
            ("Normalize", &self.normalize),
            ("Blur", &self.blur),
            ("X Derivative", &self.x_derivative),
            ("Y Derivative", &self.y_derivative),
            ("Gradient", &self.gradient),
            ("Thresholds", &self.thresholds),
            ("Suppression", &self.suppression),
            ("Hysteresis", &self.hysteresis),
        ]
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Edges: {} ({:.2}%)  |  Thresholds: lower={:.4} upper={:.4} ({})",
            self.summary.edge_pixel_count,
            self.summary.edge_density * 100.0,
            self.summary.thresholds.lower,
            self.summary.thresholds.upper,
            if self.summary.estimated {
                "estimated"
            } else {
                "supplied"
            },
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Grayscale {
            width,
            height,
            channel_order,
        } => format!("{width}x{height} {channel_order:?}"),
        StageMetrics::Normalize { min, max } | StageMetrics::Derivative { min, max } => {
            format!("range=[{min:.4}, {max:.4}]")
        }
        StageMetrics::Blur { kernel_size } => format!("kernel={kernel_size}x{kernel_size}"),
        StageMetrics::Gradient {
            max_magnitude,
            nonzero_count,
        } => format!("max={max_magnitude:.4} nonzero={nonzero_count}"),
        StageMetrics::Thresholds {
            lower,
            upper,
            estimated,
        } => format!(
            "lower={lower:.4} upper={upper:.4} {}",
            if *estimated { "(estimated)" } else { "(supplied)" },
        ),
        StageMetrics::Suppression {
            candidate_count,
            strong_count,
        } => format!("candidates={candidate_count} strong={strong_count}"),
        StageMetrics::Hysteresis {
            passes,
            promoted,
            edge_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *edge_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!("passes={passes} promoted={promoted} edges={edge_pixel_count} ({density:.1}%)")
        }
    }
}

/// Smallest and largest value in `values`; `(0, 0)` when empty.
pub(crate) fn value_range(values: &[f64]) -> (f64, f64) {
    let mut iter = values.iter().copied();
    let Some(first) = iter.next() else {
        return (0.0, 0.0);
    };
    iter.fold((first, first), |(min, max), v| (min.min(v), max.max(v)))
}

/// Run `stage` and return its output with the elapsed time.
fn timed<C: Clock, T>(clock: &C, stage: impl FnOnce() -> T) -> (T, Duration) {
    let start = clock.now();
    let out = stage();
    (out, clock.elapsed(&start))
}

/// Run the detector while collecting per-stage diagnostics.
///
/// Behaves exactly like [`crate::detect`] (same validation, same
/// events, same result) and additionally returns timing and metrics for
/// every stage. Event emission is not included in stage durations.
///
/// # Errors
///
/// Returns the same errors as [`crate::detect`], before any stage runs.
pub fn detect_with_diagnostics<C: Clock>(
    pixels: &[u8],
    dimensions: Dimensions,
    config: &DetectConfig,
    clock: &C,
    mut on_stage: impl FnMut(StageEvent),
) -> Result<(Detection, PipelineDiagnostics), PipelineError> {
    let start = clock.now();
    let pending = Pipeline::new(pixels, dimensions, config.clone())?;

    let (grayscaled, duration) = timed(clock, || pending.grayscale());
    let grayscale = StageDiagnostics {
        duration,
        metrics: grayscaled.metrics(),
    };
    on_stage(grayscaled.event());

    let (normalized, duration) = timed(clock, || grayscaled.normalize());
    let normalize = StageDiagnostics {
        duration,
        metrics: normalized.metrics(),
    };
    on_stage(normalized.event());

    let (blurred, duration) = timed(clock, || normalized.blur());
    let blur = StageDiagnostics {
        duration,
        metrics: blurred.metrics(),
    };
    on_stage(blurred.event());

    let (x_derived, duration) = timed(clock, || blurred.derive_x());
    let x_derivative = StageDiagnostics {
        duration,
        metrics: x_derived.metrics(),
    };
    on_stage(x_derived.event());

    let (derived, duration) = timed(clock, || x_derived.derive_y());
    let y_derivative = StageDiagnostics {
        duration,
        metrics: derived.metrics(),
    };
    on_stage(derived.event());

    let (computed, duration) = timed(clock, || derived.gradient());
    let gradient = StageDiagnostics {
        duration,
        metrics: computed.metrics(),
    };

    let (resolved, duration) = timed(clock, || computed.resolve_thresholds());
    let thresholds = StageDiagnostics {
        duration,
        metrics: resolved.metrics(),
    };

    let (suppressed, duration) = timed(clock, || resolved.suppress());
    let suppression = StageDiagnostics {
        duration,
        metrics: suppressed.metrics(),
    };

    let (linked, duration) = timed(clock, || suppressed.link());
    let hysteresis = StageDiagnostics {
        duration,
        metrics: linked.metrics(),
    };
    on_stage(linked.event());

    let detection = linked.into_result();
    let diagnostics = PipelineDiagnostics {
        grayscale,
        normalize,
        blur,
        x_derivative,
        y_derivative,
        gradient,
        thresholds,
        suppression,
        hysteresis,
        total_duration: clock.elapsed(&start),
        summary: PipelineSummary::new(&detection),
    };
    Ok((detection, diagnostics))
}

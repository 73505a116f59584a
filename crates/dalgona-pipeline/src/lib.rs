//! dalgona-pipeline: Canny edge detection on raw RGBA buffers (sans-IO).
//!
//! Turns a `width × height` buffer of 4-byte pixels into a binary edge
//! mask through:
//! grayscale -> normalize -> 5×5 Gaussian blur -> x/y derivatives ->
//! gradient magnitude and direction -> threshold resolution ->
//! non-maximum suppression -> hysteresis linking.
//!
//! Every convolution wraps toroidally at the image borders, so output is
//! reproducible bit for bit. The crate has **no I/O** and installs no
//! logging subscriber; it emits `tracing` events and leaves collection
//! to the caller.
//!
//! [`detect`] runs the whole detector and reports each intermediate
//! stage to a callback. [`Pipeline`] drives the same stages one step at
//! a time, and [`diagnostics::detect_with_diagnostics`] adds per-stage
//! timing.

// Mask values are compared against the exact sentinels 0.0 and 1.0.
#![allow(clippy::float_cmp)]

pub mod blur;
pub mod convolve;
pub mod diagnostics;
pub mod gradient;
pub mod grayscale;
pub mod hysteresis;
pub mod nms;
pub mod pipeline;
pub mod stage;
pub mod threshold;
pub mod types;

pub use pipeline::Pipeline;
pub use stage::{Stage, StageEvent};
pub use types::{
    ChannelOrder, DetectConfig, Detection, Dimensions, EdgeMask, GrayImage, HysteresisMode,
    MAX_IMAGE_HEIGHT, PipelineError, RgbaImage, Thresholds,
};

/// Run the full edge detector.
///
/// `pixels` holds 4 bytes per pixel, row-major, in the layout named by
/// `config.channel_order`. Thresholds in `config` apply to the gradient
/// magnitude normalized by its maximum; leave both unset (or zero) to
/// estimate them from the image.
///
/// `on_stage` is called synchronously, in order, after each of the
/// grayscale, normalize, blur, x-derivative and y-derivative stages,
/// and once more with the final mask and the applied thresholds (see
/// [`Stage`]).
///
/// # Errors
///
/// Returns [`PipelineError`] for zero or overflowing dimensions, a
/// buffer that is not `width * height * 4` bytes, or a NaN threshold.
/// Nothing is emitted when validation fails.
pub fn detect(
    pixels: &[u8],
    dimensions: Dimensions,
    config: &DetectConfig,
    mut on_stage: impl FnMut(StageEvent),
) -> Result<Detection, PipelineError> {
    let grayscaled = Pipeline::new(pixels, dimensions, config.clone())?.grayscale();
    on_stage(grayscaled.event());
    let normalized = grayscaled.normalize();
    on_stage(normalized.event());
    let blurred = normalized.blur();
    on_stage(blurred.event());
    let x_derived = blurred.derive_x();
    on_stage(x_derived.event());
    let derived = x_derived.derive_y();
    on_stage(derived.event());
    let linked = derived.gradient().resolve_thresholds().suppress().link();
    on_stage(linked.event());
    Ok(linked.into_result())
}

/// Run the edge detector on a decoded image, discarding stage events.
///
/// The image's bytes are read in `config.channel_order`.
///
/// # Errors
///
/// Returns [`PipelineError::ZeroDimension`] for an empty image and
/// [`PipelineError::InvalidThreshold`] for a NaN threshold.
pub fn detect_image(image: &RgbaImage, config: &DetectConfig) -> Result<Detection, PipelineError> {
    detect(
        image.as_raw(),
        Dimensions::new(image.width(), image.height()),
        config,
        |_| {},
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn uniform(width: u32, height: u32, level: u8) -> RgbaImage {
        RgbaImage::from_fn(width, height, |_, _| image::Rgba([level, level, level, 255]))
    }

    #[test]
    fn detect_rejects_zero_dimensions() {
        let result = detect(&[], Dimensions::new(0, 4), &DetectConfig::default(), |_| {});
        assert!(matches!(result, Err(PipelineError::ZeroDimension { .. })));
    }

    #[test]
    fn detect_rejects_wrong_buffer_length() {
        let result = detect(&[0; 20], Dimensions::new(2, 2), &DetectConfig::default(), |_| {});
        assert_eq!(
            result,
            Err(PipelineError::BufferLength {
                expected: 16,
                actual: 20
            })
        );
    }

    #[test]
    fn detect_emits_six_events() {
        let img = uniform(8, 8, 90);
        let mut events = Vec::new();
        detect(
            img.as_raw(),
            Dimensions::new(8, 8),
            &DetectConfig::default(),
            |e| events.push(e),
        )
        .unwrap();
        assert_eq!(events.len(), 6);
        assert!(events[5].thresholds.is_some());
    }

    #[test]
    fn detect_image_uniform_has_no_edges() {
        let detection = detect_image(&uniform(16, 9, 200), &DetectConfig::default()).unwrap();
        assert_eq!(detection.edges.edge_count(), 0);
        assert_eq!(detection.thresholds, Thresholds::new(0.0, 0.0));
        assert!(detection.estimated);
    }

    #[test]
    fn detect_image_sharp_edge_finds_edges() {
        let img = RgbaImage::from_fn(40, 40, |x, _| {
            if x < 20 {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        });
        let detection = detect_image(&img, &DetectConfig::default()).unwrap();
        assert!(detection.edges.edge_count() > 0);
        assert_eq!(detection.edges.dimensions(), Dimensions::new(40, 40));
    }

    #[test]
    fn detect_image_rejects_empty_image() {
        let result = detect_image(&RgbaImage::new(0, 0), &DetectConfig::default());
        assert!(matches!(result, Err(PipelineError::ZeroDimension { .. })));
    }
}

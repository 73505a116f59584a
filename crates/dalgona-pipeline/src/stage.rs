//! Stage progress events for incremental visualization.
//!
//! [`crate::detect`] reports each completed stage to a caller-supplied
//! callback. Payloads are opaque gray RGBA bytes (`[v, v, v, 255]` per
//! pixel) ready to draw onto a canvas of the source dimensions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::grayscale::{denormalize, expand_to_rgba};
use crate::types::Thresholds;

/// A pipeline stage that emits a progress event, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    /// Luma values in `[0, 255]`.
    Grayscale,
    /// Luma scaled to `[0, 1]`. Signal only, no payload.
    Normalized,
    /// Gaussian-smoothed luma.
    Blurred,
    /// Horizontal derivative response.
    XAxis,
    /// Vertical derivative response.
    YAxis,
    /// The final binary edge mask, with the applied thresholds.
    GradientMagnitude,
}

impl Stage {
    /// Every stage, in emission order.
    pub const ALL: [Self; 6] = [
        Self::Grayscale,
        Self::Normalized,
        Self::Blurred,
        Self::XAxis,
        Self::YAxis,
        Self::GradientMagnitude,
    ];

    /// Wire tag of the stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Grayscale => "grayscale",
            Self::Normalized => "normalized",
            Self::Blurred => "blurred",
            Self::XAxis => "xAxis",
            Self::YAxis => "yAxis",
            Self::GradientMagnitude => "gradientMagnitude",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification sent after a stage completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEvent {
    /// Which stage completed.
    pub stage: Stage,
    /// RGBA-expanded stage output; `None` for [`Stage::Normalized`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
    /// Applied thresholds; only set on [`Stage::GradientMagnitude`].
    #[serde(rename = "threshold", skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<Thresholds>,
}

impl StageEvent {
    /// Event with no payload.
    #[must_use]
    pub const fn signal(stage: Stage) -> Self {
        Self {
            stage,
            data: None,
            thresholds: None,
        }
    }

    /// Event carrying luma values already in `[0, 255]`.
    #[must_use]
    pub fn from_display(stage: Stage, values: &[f64]) -> Self {
        Self {
            stage,
            data: Some(expand_to_rgba(values.iter().copied())),
            thresholds: None,
        }
    }

    /// Event carrying values on the normalized `[0, 1]` scale; they are
    /// scaled by 255 before byte conversion.
    #[must_use]
    pub fn from_normalized(stage: Stage, values: &[f64]) -> Self {
        Self {
            stage,
            data: Some(expand_to_rgba(denormalize(values))),
            thresholds: None,
        }
    }

    /// Attach the applied threshold pair.
    #[must_use]
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = Some(thresholds);
        self
    }
}

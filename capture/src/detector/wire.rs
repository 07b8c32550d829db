//! JSON shapes shared by the replay file and the detector sidecar.

use hand_capture_common::geometry::{HandLandmarks, Point2D};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct LandmarkJson {
    pub x: f32,
    pub y: f32,
    /// Depth relative to the wrist; not used for containment or cropping.
    #[serde(default)]
    pub z: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HandJson {
    #[serde(default)]
    pub handedness: Option<String>,
    #[serde(default)]
    pub score: Option<f32>,
    pub landmarks: Vec<LandmarkJson>,
}

/// One detector response: all hands found in one frame.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionJson {
    #[serde(default)]
    pub seq: Option<u64>,
    #[serde(default)]
    pub hands: Vec<HandJson>,
    #[serde(default)]
    pub error: Option<String>,
}

/// How raw hand coordinates map onto frame pixels.
#[derive(Debug, Clone, Copy)]
pub struct Conversion {
    pub normalized: bool,
    pub min_confidence: f32,
}

impl Conversion {
    /// Convert reported hands for a `width` x `height` frame, dropping hands
    /// below the confidence floor and hands with no landmarks. Order is kept.
    pub fn to_landmarks(&self, hands: &[HandJson], width: u32, height: u32) -> Vec<HandLandmarks> {
        let (sx, sy) = if self.normalized {
            (width as f32, height as f32)
        } else {
            (1.0, 1.0)
        };
        hands
            .iter()
            .filter(|hand| {
                let keep = hand.score.map_or(true, |s| s >= self.min_confidence)
                    && !hand.landmarks.is_empty();
                if !keep {
                    debug!(
                        score = hand.score,
                        handedness = hand.handedness.as_deref().unwrap_or("?"),
                        points = hand.landmarks.len(),
                        "dropping hand detection"
                    );
                }
                keep
            })
            .map(|hand| {
                hand.landmarks
                    .iter()
                    .map(|lm| Point2D::new(lm.x * sx, lm.y * sy))
                    .collect()
            })
            .collect()
    }
}

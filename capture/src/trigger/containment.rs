use hand_capture_common::geometry::{HandLandmarks, Region};
use tracing::debug;

/// Hands considered per frame. Extra detections are ignored, never merged.
pub const MAX_HANDS: usize = 1;

/// Returns `true` if the hand's full bounding box lies strictly inside `region`.
///
/// All four extremes must clear the region edges; touching an edge or
/// overlapping it counts as outside. An empty landmark set is never contained.
pub fn is_contained(landmarks: &HandLandmarks, region: &Region) -> bool {
    let Some(b) = landmarks.bounds() else {
        return false;
    };
    region.strictly_spans_x(b.min_x)
        && region.strictly_spans_x(b.max_x)
        && region.strictly_spans_y(b.min_y)
        && region.strictly_spans_y(b.max_y)
}

/// Pick the hand to evaluate from one frame's detections: the first one.
pub fn select_hand(detections: &[HandLandmarks]) -> Option<&HandLandmarks> {
    if detections.len() > MAX_HANDS {
        debug!(
            detected = detections.len(),
            max = MAX_HANDS,
            "ignoring extra hand detections"
        );
    }
    detections.first()
}

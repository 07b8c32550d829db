use std::future::Future;

use hand_capture_common::frame::Frame;
use hand_capture_common::geometry::HandLandmarks;

use super::DetectorError;

/// Hand landmark detector boundary.
///
/// Implementations receive a decoded frame and return zero or more hands,
/// each as landmark points in the frame's pixel coordinates. No smoothing
/// or identity tracking across calls is expected. Detection runs on the
/// session task, so implementations must not block the runtime.
pub trait HandDetector: Send {
    fn detect(
        &mut self,
        frame: &Frame,
    ) -> impl Future<Output = Result<Vec<HandLandmarks>, DetectorError>> + Send;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

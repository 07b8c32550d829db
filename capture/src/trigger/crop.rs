use hand_capture_common::frame::Frame;
use hand_capture_common::geometry::{Bounds, CropRect, HandLandmarks};

/// Crop rectangle around `landmarks`, grown by `margin` and clamped to the frame.
///
/// Never fails: landmarks at or past the frame edge are clamped, and a set
/// lying entirely outside the frame (or an empty set) yields a zero-area rect.
pub fn crop(frame: &Frame, landmarks: &HandLandmarks, margin: u32) -> CropRect {
    crop_in(frame.width(), frame.height(), landmarks, margin)
}

/// Same as [`crop`] for a frame known only by its dimensions.
pub fn crop_in(width: u32, height: u32, landmarks: &HandLandmarks, margin: u32) -> CropRect {
    match landmarks.bounds() {
        Some(b) => crop_bounds(b, margin, width, height),
        None => CropRect::default(),
    }
}

fn crop_bounds(b: Bounds, margin: u32, width: u32, height: u32) -> CropRect {
    let m = i64::from(margin);
    clamp_edges(
        (floor(b.min_x).saturating_sub(m), floor(b.min_y).saturating_sub(m)),
        (floor(b.max_x).saturating_add(m), floor(b.max_y).saturating_add(m)),
        width,
        height,
    )
}

/// Grow an existing rectangle by `margin` on every side, clamped to the frame.
///
/// With a zero margin a rectangle already inside the frame comes back unchanged.
pub fn expand(rect: CropRect, margin: u32, width: u32, height: u32) -> CropRect {
    let m = i64::from(margin);
    clamp_edges(
        (i64::from(rect.x).saturating_sub(m), i64::from(rect.y).saturating_sub(m)),
        (i64::from(rect.right()).saturating_add(m), i64::from(rect.bottom()).saturating_add(m)),
        width,
        height,
    )
}

fn clamp_edges(top_left: (i64, i64), bottom_right: (i64, i64), width: u32, height: u32) -> CropRect {
    let (w, h) = (i64::from(width), i64::from(height));
    let left = top_left.0.clamp(0, w);
    let top = top_left.1.clamp(0, h);
    let right = bottom_right.0.clamp(left, w);
    let bottom = bottom_right.1.clamp(top, h);
    // every edge is within [0, u32::MAX] after clamping
    CropRect::from_edges(left as u32, top as u32, right as u32, bottom as u32)
}

// NaN maps to 0 and infinities to the i64 limits via the saturating float cast.
fn floor(v: f32) -> i64 {
    v.floor() as i64
}

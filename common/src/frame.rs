use crate::geometry::CropRect;

/// Bytes per pixel of the packed RGB8 layout every frame uses.
pub const CHANNELS: usize = 3;

/// A decoded camera frame with timestamp metadata.
///
/// Pixels are packed row-major RGB8, `width * height * 3` bytes, in the
/// same coordinate space the hand detector reports landmarks in.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    pub captured_at_ms: i64,
    pub seq: u64,
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        captured_at_ms: i64,
        seq: u64,
    ) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize * CHANNELS;
        if pixels.len() != expected {
            return Err(FrameError::SizeMismatch {
                width,
                height,
                expected,
                got: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
            captured_at_ms,
            seq,
        })
    }

    /// All-black frame, handy for tests and warmup.
    pub fn blank(width: u32, height: u32, captured_at_ms: i64, seq: u64) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * CHANNELS],
            captured_at_ms,
            seq,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Capture time as a UTC datetime (falls back to now for out-of-range values).
    pub fn captured_at(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp_millis(self.captured_at_ms)
            .unwrap_or_else(chrono::Utc::now)
    }

    /// Copy out the pixels under `rect`, clipped to the frame.
    ///
    /// Returns the clipped rectangle with its packed RGB8 rows. An empty
    /// rectangle yields an empty buffer.
    pub fn crop_pixels(&self, rect: CropRect) -> (CropRect, Vec<u8>) {
        let left = rect.x.min(self.width);
        let top = rect.y.min(self.height);
        let clipped = CropRect::from_edges(
            left,
            top,
            rect.right().min(self.width),
            rect.bottom().min(self.height),
        );
        if clipped.is_empty() {
            return (clipped, Vec::new());
        }

        let stride = self.width as usize * CHANNELS;
        let row_len = clipped.width as usize * CHANNELS;
        let mut out = Vec::with_capacity(row_len * clipped.height as usize);
        for row in clipped.y..clipped.bottom() {
            let start = row as usize * stride + clipped.x as usize * CHANNELS;
            out.extend_from_slice(&self.pixels[start..start + row_len]);
        }
        (clipped, out)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("pixel buffer for {width}x{height} frame has {got} bytes, expected {expected}")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        got: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Frame {
        let mut pixels = Vec::new();
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[x as u8, y as u8, 7]);
            }
        }
        Frame::new(width, height, pixels, 1708300000000, 3).unwrap()
    }

    #[test]
    fn rejects_wrong_buffer_size() {
        let result = Frame::new(4, 4, vec![0; 10], 0, 0);
        assert!(matches!(
            result,
            Err(FrameError::SizeMismatch { expected: 48, got: 10, .. })
        ));
    }

    #[test]
    fn crop_pixels_copies_rows() {
        let frame = gradient(8, 6);
        let (rect, pixels) = frame.crop_pixels(CropRect { x: 2, y: 1, width: 3, height: 2 });
        assert_eq!(rect, CropRect { x: 2, y: 1, width: 3, height: 2 });
        assert_eq!(pixels.len(), 3 * 2 * CHANNELS);
        // first pixel is (2,1), last is (4,2)
        assert_eq!(&pixels[..3], &[2, 1, 7]);
        assert_eq!(&pixels[pixels.len() - 3..], &[4, 2, 7]);
    }

    #[test]
    fn crop_pixels_clips_to_frame() {
        let frame = gradient(8, 6);
        let (rect, pixels) = frame.crop_pixels(CropRect { x: 6, y: 4, width: 10, height: 10 });
        assert_eq!(rect, CropRect { x: 6, y: 4, width: 2, height: 2 });
        assert_eq!(pixels.len(), 2 * 2 * CHANNELS);
    }

    #[test]
    fn empty_crop_has_no_pixels() {
        let frame = gradient(8, 6);
        let (rect, pixels) = frame.crop_pixels(CropRect { x: 8, y: 0, width: 0, height: 6 });
        assert!(rect.is_empty());
        assert!(pixels.is_empty());
    }

    #[test]
    fn captured_at_is_utc_millis() {
        let frame = gradient(1, 1);
        assert_eq!(frame.captured_at().timestamp_millis(), 1708300000000);
    }
}

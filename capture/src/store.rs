use hand_capture_common::config::StorageConfig;
use hand_capture_common::frame::Frame;
use hand_capture_common::geometry::CropRect;
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Identifier of a persisted capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureId {
    pub count: u32,
    pub path: PathBuf,
}

/// Persistence boundary for accepted captures.
pub trait CaptureStore {
    /// Persist the pixels of `frame` under `crop`.
    fn save(&mut self, frame: &Frame, crop: CropRect) -> Result<CaptureId, StoreError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// File name for the `count`th capture, e.g. "capture3_cropped.png".
pub fn capture_file_name(prefix: &str, count: u32) -> String {
    format!("{prefix}{count}_cropped.png")
}

/// Where the crop preview for a pending capture is written; overwritten each time.
pub fn preview_path(config: &StorageConfig) -> PathBuf {
    Path::new(&config.dir).join(format!("{}_preview.png", config.prefix))
}

/// Build an RGB image from the crop of `frame`. Fails on an empty crop.
pub fn crop_image(frame: &Frame, crop: CropRect) -> Result<RgbImage, StoreError> {
    let (clipped, pixels) = frame.crop_pixels(crop);
    if clipped.is_empty() {
        return Err(StoreError::EmptyCrop(crop));
    }
    RgbImage::from_raw(clipped.width, clipped.height, pixels).ok_or(StoreError::Buffer {
        width: clipped.width,
        height: clipped.height,
    })
}

/// Writes crops as PNG files into a directory, numbered from 1.
///
/// Numbers already taken on disk are skipped, so a restarted session never
/// overwrites earlier captures.
pub struct FsCaptureStore {
    dir: PathBuf,
    prefix: String,
    next_count: u32,
}

impl FsCaptureStore {
    /// Open the capture directory, creating it if necessary.
    pub fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        let dir = PathBuf::from(&config.dir);
        std::fs::create_dir_all(&dir)
            .map_err(|e| StoreError::CreateDir(dir.display().to_string(), e))?;
        info!(dir = %dir.display(), prefix = config.prefix, "capture store ready");
        Ok(Self {
            dir,
            prefix: config.prefix.clone(),
            next_count: 1,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn next_free_path(&mut self) -> (u32, PathBuf) {
        loop {
            let count = self.next_count;
            self.next_count += 1;
            let path = self.dir.join(capture_file_name(&self.prefix, count));
            if !path.exists() {
                return (count, path);
            }
            debug!(path = %path.display(), "capture name taken, skipping");
        }
    }
}

impl CaptureStore for FsCaptureStore {
    fn save(&mut self, frame: &Frame, crop: CropRect) -> Result<CaptureId, StoreError> {
        let image = crop_image(frame, crop)?;
        let (count, path) = self.next_free_path();
        image.save(&path)?;
        info!(
            path = %path.display(),
            count,
            width = image.width(),
            height = image.height(),
            captured_at = %frame.captured_at(),
            "cropped image saved"
        );
        Ok(CaptureId { count, path })
    }

    fn name(&self) -> &str {
        "filesystem"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to create capture directory {0}: {1}")]
    CreateDir(String, std::io::Error),
    #[error("crop {0:?} has zero area")]
    EmptyCrop(CropRect),
    #[error("crop buffer does not match {width}x{height}")]
    Buffer { width: u32, height: u32 },
    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
}

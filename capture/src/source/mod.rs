pub mod directory;
pub mod mjpeg;

use std::path::PathBuf;

use hand_capture_common::config::SourceConfig;
use hand_capture_common::frame::{Frame, FrameError};
use tokio::sync::mpsc;

pub type FrameSender = mpsc::Sender<Result<Frame, SourceError>>;
pub type FrameReceiver = mpsc::Receiver<Result<Frame, SourceError>>;

/// Start the frame source selected by `config.mode` on its own task.
///
/// Frames arrive on the returned channel. An `Err` item or a closed channel
/// means the source is done; it is never restarted.
pub fn spawn(config: &SourceConfig) -> Result<FrameReceiver, SourceError> {
    if !(config.fps.is_finite() && config.fps > 0.0) {
        return Err(SourceError::InvalidFps(config.fps));
    }
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    match config.mode.as_str() {
        "mjpeg" => {
            let url = config
                .url
                .clone()
                .ok_or(SourceError::MissingSetting("source.url"))?;
            tokio::spawn(mjpeg::run(url, tx));
        }
        "directory" => {
            let path = config
                .path
                .as_deref()
                .map(PathBuf::from)
                .ok_or(SourceError::MissingSetting("source.path"))?;
            tokio::spawn(directory::run(path, config.fps, tx));
        }
        other => return Err(SourceError::UnknownMode(other.to_string())),
    }
    Ok(rx)
}

/// Decode an encoded image (JPEG, PNG) into an RGB8 frame.
pub fn decode_rgb(bytes: &[u8], captured_at_ms: i64, seq: u64) -> Result<Frame, SourceError> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok(Frame::new(width, height, rgb.into_raw(), captured_at_ms, seq)?)
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("unknown source mode '{0}', expected 'mjpeg' or 'directory'")]
    UnknownMode(String),
    #[error("missing config setting {0}")]
    MissingSetting(&'static str),
    #[error("fps must be a positive number, got {0}")]
    InvalidFps(f64),
    #[error("HTTP connection failed: {0}")]
    HttpConnect(reqwest::Error),
    #[error("HTTP stream error: {0}")]
    HttpStream(reqwest::Error),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("MJPEG stream ended")]
    StreamEnded,
    #[error("failed to read image directory {0}: {1}")]
    ReadDir(String, std::io::Error),
    #[error("failed to read image {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(mode: &str) -> SourceConfig {
        SourceConfig {
            mode: mode.into(),
            url: None,
            path: None,
            fps: 10.0,
            channel_capacity: 4,
        }
    }

    #[tokio::test]
    async fn rejects_bad_settings() {
        assert!(matches!(spawn(&config("webcam")), Err(SourceError::UnknownMode(_))));
        assert!(matches!(
            spawn(&config("mjpeg")),
            Err(SourceError::MissingSetting("source.url"))
        ));
        let mut zero_fps = config("directory");
        zero_fps.fps = 0.0;
        assert!(matches!(spawn(&zero_fps), Err(SourceError::InvalidFps(_))));
    }

    #[test]
    fn decodes_png_to_rgb_frame() {
        let mut png = Vec::new();
        image::RgbImage::from_pixel(3, 2, image::Rgb([1, 2, 3]))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let frame = decode_rgb(&png, 42, 7).unwrap();
        assert_eq!((frame.width(), frame.height(), frame.seq), (3, 2, 7));
        assert_eq!(frame.pixels().len(), 18);
    }

    #[test]
    fn garbage_does_not_decode() {
        assert!(matches!(decode_rgb(b"nope", 0, 0), Err(SourceError::Decode(_))));
    }
}

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use super::{decode_rgb, FrameSender, SourceError};

const EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Image files in `dir` with a supported extension, in lexical order.
pub async fn list_images(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let read_dir_err = |e| SourceError::ReadDir(dir.display().to_string(), e);
    let mut entries = tokio::fs::read_dir(dir).await.map_err(read_dir_err)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(read_dir_err)? {
        let path = entry.path();
        let is_file = entry.file_type().await.is_ok_and(|t| t.is_file());
        if is_file && has_image_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Play the images in `dir` as a frame sequence at `fps`.
///
/// Timestamps are synthetic (`seq * 1000 / fps` ms) so a recorded sequence
/// replays with the same dwell timing every run. The sequence ending closes
/// the channel; an unreadable image is sent as a terminal error.
pub async fn run(dir: PathBuf, fps: f64, tx: FrameSender) {
    let files = match list_images(&dir).await {
        Ok(files) => files,
        Err(e) => {
            let _ = tx.send(Err(e)).await;
            return;
        }
    };
    info!(dir = %dir.display(), frames = files.len(), fps, "replaying image directory");

    let frame_ms = 1000.0 / fps;
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / fps));

    for (seq, path) in files.into_iter().enumerate() {
        ticker.tick().await;
        let captured_at_ms = (seq as f64 * frame_ms).round() as i64;
        let result = tokio::fs::read(&path)
            .await
            .map_err(|e| SourceError::ReadFile(path.display().to_string(), e))
            .and_then(|bytes| decode_rgb(&bytes, captured_at_ms, seq as u64));
        let failed = result.is_err();
        if tx.send(result).await.is_err() {
            debug!("frame receiver closed, stopping directory replay");
            return;
        }
        if failed {
            return;
        }
    }
    info!(dir = %dir.display(), "image directory exhausted");
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tokio::sync::mpsc;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) {
        RgbImage::from_pixel(width, height, Rgb([10, 20, 30]))
            .save(dir.join(name))
            .unwrap();
    }

    #[tokio::test]
    async fn lists_only_images_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        write_png(tmp.path(), "b.png", 2, 2);
        write_png(tmp.path(), "a.PNG", 2, 2);
        std::fs::write(tmp.path().join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(tmp.path().join("nested.png")).unwrap();

        let files = list_images(tmp.path()).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.PNG", "b.png"]);
    }

    #[tokio::test]
    async fn replays_frames_with_synthetic_timestamps() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["000.png", "001.png", "002.png"] {
            write_png(tmp.path(), name, 8, 4);
        }
        let (tx, mut rx) = mpsc::channel(8);
        run(tmp.path().to_path_buf(), 100.0, tx).await;

        let mut frames = Vec::new();
        while let Some(frame) = rx.recv().await {
            frames.push(frame.unwrap());
        }
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].seq, 2);
        assert_eq!(frames[2].captured_at_ms, 20);
        assert_eq!((frames[0].width(), frames[0].height()), (8, 4));
        assert_eq!(&frames[0].pixels()[..3], &[10, 20, 30]);
    }

    #[tokio::test]
    async fn corrupt_image_ends_with_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_png(tmp.path(), "000.png", 2, 2);
        std::fs::write(tmp.path().join("001.png"), b"not a png").unwrap();
        write_png(tmp.path(), "002.png", 2, 2);

        let (tx, mut rx) = mpsc::channel(8);
        run(tmp.path().to_path_buf(), 100.0, tx).await;

        assert!(rx.recv().await.unwrap().is_ok());
        assert!(rx.recv().await.unwrap().is_err());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn missing_directory_is_sent_as_error() {
        let tmp = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(1);
        run(tmp.path().join("absent"), 10.0, tx).await;

        assert!(matches!(rx.recv().await, Some(Err(SourceError::ReadDir(..)))));
        assert!(rx.recv().await.is_none());
    }
}

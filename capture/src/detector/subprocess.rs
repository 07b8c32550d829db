use std::process::Stdio;

use hand_capture_common::frame::{Frame, CHANNELS};
use hand_capture_common::geometry::HandLandmarks;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use super::traits::HandDetector;
use super::wire::{Conversion, DetectionJson};
use super::DetectorError;

const READY: &str = "READY";

/// Hand detector running as a sidecar process (e.g. a MediaPipe script).
///
/// Protocol, one exchange per frame:
///   -> width, height, channels  (u32 little-endian each)
///   -> width * height * channels bytes of RGB8 pixels
///   <- one JSON line: {"hands": [...], "error": null}
///
/// The sidecar prints `READY` on its own line once its model is loaded.
/// The process is killed when the detector is dropped.
pub struct SubprocessDetector {
    // held so kill_on_drop fires with the detector
    _process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    conversion: Conversion,
}

impl SubprocessDetector {
    pub async fn spawn(
        command: &str,
        args: &[String],
        conversion: Conversion,
    ) -> Result<Self, DetectorError> {
        info!(command, ?args, "starting hand detector subprocess");
        let mut process = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DetectorError::Spawn(command.to_string(), e))?;

        let stdin = process.stdin.take().ok_or(DetectorError::Pipe)?;
        let stdout = process.stdout.take().ok_or(DetectorError::Pipe)?;
        let mut detector = Self {
            _process: process,
            stdin,
            stdout: BufReader::new(stdout),
            conversion,
        };

        let line = detector.read_line().await?;
        if line.trim() != READY {
            return Err(DetectorError::Handshake(line.trim().to_string()));
        }
        info!(command, "hand detector ready");
        Ok(detector)
    }

    async fn read_line(&mut self) -> Result<String, DetectorError> {
        let mut line = String::new();
        let n = self
            .stdout
            .read_line(&mut line)
            .await
            .map_err(DetectorError::Io)?;
        if n == 0 {
            return Err(DetectorError::Exited);
        }
        Ok(line)
    }

    async fn send_frame(&mut self, frame: &Frame) -> std::io::Result<()> {
        let mut header = [0u8; 12];
        header[..4].copy_from_slice(&frame.width().to_le_bytes());
        header[4..8].copy_from_slice(&frame.height().to_le_bytes());
        header[8..].copy_from_slice(&(CHANNELS as u32).to_le_bytes());
        self.stdin.write_all(&header).await?;
        self.stdin.write_all(frame.pixels()).await?;
        self.stdin.flush().await
    }
}

impl HandDetector for SubprocessDetector {
    async fn detect(&mut self, frame: &Frame) -> Result<Vec<HandLandmarks>, DetectorError> {
        self.send_frame(frame).await.map_err(DetectorError::Io)?;
        let line = self.read_line().await?;
        let response: DetectionJson =
            serde_json::from_str(&line).map_err(|e| DetectorError::Parse {
                line: 1,
                message: format!("{e}: {}", line.trim()),
            })?;

        if let Some(error) = response.error {
            warn!(error, seq = frame.seq, "detector reported an error");
            return Ok(Vec::new());
        }

        let hands = self
            .conversion
            .to_landmarks(&response.hands, frame.width(), frame.height());
        debug!(seq = frame.seq, hands = hands.len(), "detector response");
        Ok(hands)
    }

    fn name(&self) -> &str {
        "subprocess"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    const CONV: Conversion = Conversion {
        normalized: true,
        min_confidence: 0.5,
    };

    async fn sh(script: &str) -> Result<SubprocessDetector, DetectorError> {
        SubprocessDetector::spawn("sh", &["-c".to_string(), script.to_string()], CONV).await
    }

    #[tokio::test]
    async fn exchanges_one_frame() {
        // 4x2 frame: 12-byte header + 24 pixel bytes
        let mut detector = sh(
            r#"echo READY; head -c 36 >/dev/null; echo '{"hands":[{"score":0.9,"landmarks":[{"x":0.5,"y":0.5}]}]}'; sleep 1"#,
        )
        .await
        .unwrap();
        let hands = detector.detect(&Frame::blank(4, 2, 0, 0)).await.unwrap();
        assert_eq!(hands.len(), 1);
        assert_eq!(hands[0].points()[0].x, 2.0);
        assert_eq!(hands[0].points()[0].y, 1.0);
    }

    #[tokio::test]
    async fn sidecar_error_means_no_hands() {
        let mut detector =
            sh(r#"echo READY; head -c 15 >/dev/null; echo '{"hands":[],"error":"model busy"}'; sleep 1"#)
                .await
                .unwrap();
        assert!(detector.detect(&Frame::blank(1, 1, 0, 0)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn slow_sidecar_leaves_runtime_free() {
        // current-thread runtime: the ticker only advances if detect yields
        let mut detector =
            sh(r#"echo READY; head -c 15 >/dev/null; sleep 1; echo '{"hands":[]}'"#)
                .await
                .unwrap();
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&ticks);
        let ticker = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });

        let started = Instant::now();
        let hands = detector.detect(&Frame::blank(1, 1, 0, 0)).await.unwrap();
        ticker.abort();

        assert!(hands.is_empty());
        assert!(started.elapsed() >= Duration::from_millis(900));
        assert!(ticks.load(Ordering::Relaxed) > 10);
    }

    #[tokio::test]
    async fn missing_ready_is_a_handshake_error() {
        assert!(matches!(sh("echo LOADING").await, Err(DetectorError::Handshake(_))));
    }

    #[tokio::test]
    async fn exited_sidecar_is_fatal() {
        let mut detector = sh("echo READY").await.unwrap();
        let err = detector.detect(&Frame::blank(1, 1, 0, 0)).await.unwrap_err();
        assert!(err.is_fatal());
    }
}

pub mod replay;
pub mod subprocess;
pub mod traits;
pub mod wire;

use std::path::Path;

use hand_capture_common::config::DetectorConfig;
use hand_capture_common::frame::Frame;
use hand_capture_common::geometry::HandLandmarks;

pub use replay::ReplayDetector;
pub use subprocess::SubprocessDetector;
pub use traits::HandDetector;
pub use wire::Conversion;

/// The detector selected at startup.
pub enum Detector {
    Replay(ReplayDetector),
    Subprocess(SubprocessDetector),
}

impl HandDetector for Detector {
    async fn detect(&mut self, frame: &Frame) -> Result<Vec<HandLandmarks>, DetectorError> {
        match self {
            Detector::Replay(d) => d.detect(frame).await,
            Detector::Subprocess(d) => d.detect(frame).await,
        }
    }

    fn name(&self) -> &str {
        match self {
            Detector::Replay(d) => d.name(),
            Detector::Subprocess(d) => d.name(),
        }
    }
}

/// Build the detector selected by `config.mode`.
///
/// A subprocess detector is started and waited on until it reports ready.
pub async fn from_config(config: &DetectorConfig) -> Result<Detector, DetectorError> {
    let conversion = Conversion {
        normalized: config.normalized,
        min_confidence: config.min_confidence,
    };
    match config.mode.as_str() {
        "replay" => {
            let path = config
                .path
                .as_deref()
                .ok_or(DetectorError::MissingSetting("detector.path"))?;
            let detector = ReplayDetector::open(Path::new(path), conversion).await?;
            Ok(Detector::Replay(detector))
        }
        "subprocess" => {
            let command = config
                .command
                .as_deref()
                .ok_or(DetectorError::MissingSetting("detector.command"))?;
            let detector = SubprocessDetector::spawn(command, &config.args, conversion).await?;
            Ok(Detector::Subprocess(detector))
        }
        other => Err(DetectorError::UnknownMode(other.to_string())),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("unknown detector mode '{0}', expected 'replay' or 'subprocess'")]
    UnknownMode(String),
    #[error("missing config setting {0}")]
    MissingSetting(&'static str),
    #[error("failed to read detections file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("invalid detection record on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("failed to start detector {0}: {1}")]
    Spawn(String, std::io::Error),
    #[error("detector stdio pipe unavailable")]
    Pipe,
    #[error("detector did not signal ready, got '{0}'")]
    Handshake(String),
    #[error("detector I/O failed: {0}")]
    Io(std::io::Error),
    #[error("detector process exited")]
    Exited,
}

impl DetectorError {
    /// Whether the detector can no longer be used for this session.
    ///
    /// A malformed response only costs the current frame.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DetectorError::Parse { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(mode: &str) -> DetectorConfig {
        DetectorConfig {
            mode: mode.into(),
            path: None,
            command: None,
            args: Vec::new(),
            normalized: true,
            min_confidence: 0.5,
        }
    }

    #[tokio::test]
    async fn unknown_mode_is_rejected() {
        assert!(matches!(
            from_config(&config("webcam")).await,
            Err(DetectorError::UnknownMode(m)) if m == "webcam"
        ));
    }

    #[tokio::test]
    async fn modes_require_their_settings() {
        assert!(matches!(
            from_config(&config("replay")).await,
            Err(DetectorError::MissingSetting("detector.path"))
        ));
        assert!(matches!(
            from_config(&config("subprocess")).await,
            Err(DetectorError::MissingSetting("detector.command"))
        ));
    }

    #[tokio::test]
    async fn replay_mode_dispatches_through_the_enum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detections.jsonl");
        std::fs::write(&path, "{\"seq\": 0, \"hands\": [{\"landmarks\": [{\"x\": 0.5, \"y\": 0.25}]}]}\n")
            .unwrap();
        let mut cfg = config("replay");
        cfg.path = Some(path.display().to_string());

        let mut detector = from_config(&cfg).await.unwrap();
        assert_eq!(detector.name(), "replay");
        let hands = detector.detect(&Frame::blank(8, 4, 0, 0)).await.unwrap();
        assert_eq!(hands[0].points()[0].x, 4.0);
        assert_eq!(hands[0].points()[0].y, 1.0);
    }

    #[test]
    fn parse_errors_are_not_fatal() {
        assert!(!DetectorError::Parse { line: 1, message: "x".into() }.is_fatal());
        assert!(DetectorError::Exited.is_fatal());
    }
}

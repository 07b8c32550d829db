use std::collections::HashMap;
use std::path::Path;

use hand_capture_common::frame::Frame;
use hand_capture_common::geometry::HandLandmarks;
use tracing::info;

use super::traits::HandDetector;
use super::wire::{Conversion, DetectionJson, HandJson};
use super::DetectorError;

/// Replays recorded detections from a JSON Lines file.
///
/// Each non-blank line is one frame's result. Records are matched to frames
/// by `seq`; a record without `seq` takes its position among the records.
/// Frames with no record have no hands.
pub struct ReplayDetector {
    by_seq: HashMap<u64, Vec<HandJson>>,
    conversion: Conversion,
}

impl ReplayDetector {
    pub async fn open(path: &Path, conversion: Conversion) -> Result<Self, DetectorError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DetectorError::ReadFile(path.display().to_string(), e))?;
        let detector = Self::parse(&content, conversion)?;
        info!(
            path = %path.display(),
            records = detector.by_seq.len(),
            "loaded replay detections"
        );
        Ok(detector)
    }

    pub fn parse(content: &str, conversion: Conversion) -> Result<Self, DetectorError> {
        let mut by_seq = HashMap::new();
        let records = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());
        for (position, (line_no, line)) in records.enumerate() {
            let record: DetectionJson =
                serde_json::from_str(line).map_err(|e| DetectorError::Parse {
                    line: line_no + 1,
                    message: e.to_string(),
                })?;
            let seq = record.seq.unwrap_or(position as u64);
            by_seq.insert(seq, record.hands);
        }
        Ok(Self { by_seq, conversion })
    }
}

impl HandDetector for ReplayDetector {
    async fn detect(&mut self, frame: &Frame) -> Result<Vec<HandLandmarks>, DetectorError> {
        Ok(match self.by_seq.get(&frame.seq) {
            Some(hands) => self
                .conversion
                .to_landmarks(hands, frame.width(), frame.height()),
            None => Vec::new(),
        })
    }

    fn name(&self) -> &str {
        "replay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hand_capture_common::geometry::Point2D;

    const PIXELS: Conversion = Conversion {
        normalized: false,
        min_confidence: 0.5,
    };

    #[tokio::test]
    async fn matches_records_by_seq() {
        let mut detector = ReplayDetector::parse(
            r#"{"seq": 4, "hands": [{"score": 0.9, "landmarks": [{"x": 150, "y": 160}]}]}

{"seq": 7, "hands": []}"#,
            PIXELS,
        )
        .unwrap();

        let hands = detector.detect(&Frame::blank(10, 10, 0, 4)).await.unwrap();
        assert_eq!(hands.len(), 1);
        assert_eq!(hands[0].points(), &[Point2D::new(150.0, 160.0)]);
        assert!(detector.detect(&Frame::blank(10, 10, 0, 7)).await.unwrap().is_empty());
        assert!(detector.detect(&Frame::blank(10, 10, 0, 5)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn records_without_seq_use_their_position() {
        let mut detector = ReplayDetector::parse(
            "{\"hands\": []}\n\n{\"hands\": [{\"landmarks\": [{\"x\": 1, \"y\": 1}]}]}\n",
            PIXELS,
        )
        .unwrap();
        assert!(detector.detect(&Frame::blank(4, 4, 0, 0)).await.unwrap().is_empty());
        assert_eq!(detector.detect(&Frame::blank(4, 4, 0, 1)).await.unwrap().len(), 1);
    }

    #[test]
    fn bad_line_reports_line_number() {
        let result = ReplayDetector::parse("{\"hands\": []}\nnot json\n", PIXELS);
        assert!(matches!(result, Err(DetectorError::Parse { line: 2, .. })));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let result = ReplayDetector::open(Path::new("/nonexistent/detections.jsonl"), PIXELS).await;
        assert!(matches!(result, Err(DetectorError::ReadFile(..))));
    }
}

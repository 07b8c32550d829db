use bytes::BytesMut;
use chrono::Utc;
use futures_util::StreamExt;
use hand_capture_common::frame::Frame;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{decode_rgb, FrameSender, SourceError};

const BOUNDARY: &[u8] = b"--frame\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Parse state for the MJPEG multipart stream.
enum ParseState {
    /// Looking for the boundary marker `--frame\r\n`.
    SeekingBoundary,
    /// Found boundary, now looking for end of headers `\r\n\r\n`.
    SeekingHeaderEnd,
    /// Collecting JPEG bytes until the next boundary.
    CollectingJpeg,
}

/// Incremental splitter for a `multipart/x-mixed-replace` JPEG stream.
pub struct MjpegParser {
    buffer: BytesMut,
    state: ParseState,
    jpeg_start: usize,
}

impl Default for MjpegParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MjpegParser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(256 * 1024),
            state: ParseState::SeekingBoundary,
            jpeg_start: 0,
        }
    }

    /// Feed one network chunk; returns every JPEG completed by it.
    ///
    /// A part is complete once the following boundary arrives.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);
        let mut complete = Vec::new();

        loop {
            match self.state {
                ParseState::SeekingBoundary => {
                    if let Some(pos) = find_subsequence(&self.buffer, BOUNDARY) {
                        let _ = self.buffer.split_to(pos + BOUNDARY.len());
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // Keep last few bytes in case boundary spans chunks
                        if self.buffer.len() > BOUNDARY.len() {
                            let _ = self.buffer.split_to(self.buffer.len() - BOUNDARY.len());
                        }
                        break;
                    }
                }
                ParseState::SeekingHeaderEnd => {
                    if let Some(pos) = find_subsequence(&self.buffer, HEADER_END) {
                        let _ = self.buffer.split_to(pos + HEADER_END.len());
                        self.jpeg_start = 0;
                        self.state = ParseState::CollectingJpeg;
                    } else {
                        break;
                    }
                }
                ParseState::CollectingJpeg => {
                    let Some(pos) = find_subsequence(&self.buffer[self.jpeg_start..], BOUNDARY)
                    else {
                        // Skip re-scanning bytes already searched
                        self.jpeg_start = self.buffer.len().saturating_sub(BOUNDARY.len());
                        break;
                    };
                    let jpeg_end = self.jpeg_start + pos;
                    // Strip trailing \r\n before boundary
                    let end = if self.buffer[..jpeg_end].ends_with(b"\r\n") {
                        jpeg_end - 2
                    } else {
                        jpeg_end
                    };
                    let jpeg = self.buffer[..end].to_vec();
                    let _ = self.buffer.split_to(jpeg_end + BOUNDARY.len());
                    if !jpeg.is_empty() {
                        complete.push(jpeg);
                    }
                    self.state = ParseState::SeekingHeaderEnd;
                }
            }
        }

        complete
    }
}

/// Read the MJPEG stream at `url` and forward decoded frames.
///
/// Connection loss or a non-success status is sent as a terminal error;
/// the stream is not reconnected.
pub async fn run(url: String, tx: FrameSender) {
    info!(url, "connecting to MJPEG stream");
    if let Err(e) = consume_stream(&url, &tx).await {
        // receiver may already be gone; nothing else to do
        let _ = tx.send(Err(e)).await;
    }
}

async fn consume_stream(url: &str, tx: &FrameSender) -> Result<(), SourceError> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(SourceError::HttpConnect)?;
    let response = client.get(url).send().await.map_err(SourceError::HttpConnect)?;

    if !response.status().is_success() {
        return Err(SourceError::HttpStatus(response.status().as_u16()));
    }
    info!(status = %response.status(), "connected to MJPEG stream");

    let mut byte_stream = response.bytes_stream();
    let mut parser = MjpegParser::new();
    let mut seq: u64 = 0;

    while let Some(chunk) = byte_stream.next().await {
        let chunk = chunk.map_err(SourceError::HttpStream)?;
        for jpeg in parser.push(&chunk) {
            let now_ms = Utc::now().timestamp_millis();
            let frame = match decode_rgb(&jpeg, now_ms, seq) {
                Ok(f) => f,
                Err(e) => {
                    warn!(error = %e, seq, bytes = jpeg.len(), "undecodable JPEG part, skipping");
                    continue;
                }
            };
            seq += 1;
            if !forward(tx, frame) {
                debug!("frame receiver closed, stopping MJPEG reader");
                return Ok(());
            }
        }
    }

    Err(SourceError::StreamEnded)
}

/// Send without blocking the network reader; drops the frame if the
/// session is still busy. Returns `false` once the receiver is gone.
fn forward(tx: &FrameSender, frame: Frame) -> bool {
    match tx.try_send(Ok(frame)) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            debug!("session busy, dropping live frame");
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

/// Find the position of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

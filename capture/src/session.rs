use std::str::FromStr;

use hand_capture_common::config::SessionConfig;
use hand_capture_common::frame::Frame;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::detector::{DetectorError, HandDetector};
use crate::source::{FrameReceiver, SourceError};
use crate::store::CaptureStore;
use crate::trigger::{
    CaptureStateMachine, Decision, DecisionController, DecisionError, Status, TickOutput,
};

/// What to do when a capture freezes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionPolicy {
    /// Wait for the user's command.
    Prompt,
    Keep,
    Discard,
}

impl FromStr for DecisionPolicy {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prompt" => Ok(Self::Prompt),
            "keep" => Ok(Self::Keep),
            "discard" => Ok(Self::Discard),
            other => Err(SessionError::UnknownPolicy(other.to_string())),
        }
    }
}

/// A user choice from the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    Keep,
    Discard,
    Preview,
    Quit,
}

impl FromStr for UserCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "k" | "keep" | "analyze" => Ok(Self::Keep),
            "d" | "discard" | "retry" => Ok(Self::Discard),
            "p" | "preview" | "crop" => Ok(Self::Preview),
            "q" | "quit" => Ok(Self::Quit),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames: u64,
    pub captures_kept: u32,
    pub captures_discarded: u32,
}

/// Hook for showing a crop preview.
pub trait PreviewSink {
    fn show(&mut self, image: &image::RgbImage);
}

impl<F: FnMut(&image::RgbImage)> PreviewSink for F {
    fn show(&mut self, image: &image::RgbImage) {
        self(image)
    }
}

enum Flow {
    Continue,
    Stop,
}

/// Single owner of the capture state: one task feeds it frames and user
/// commands in turn, so the state machine is never touched concurrently.
pub struct Session<S: CaptureStore, D: HandDetector> {
    machine: CaptureStateMachine,
    controller: DecisionController<S>,
    detector: D,
    policy: DecisionPolicy,
    max_captures: Option<u32>,
    preview: Option<Box<dyn PreviewSink + Send>>,
    frames: u64,
}

impl<S: CaptureStore, D: HandDetector> Session<S, D> {
    pub fn new(
        machine: CaptureStateMachine,
        store: S,
        detector: D,
        policy: DecisionPolicy,
    ) -> Self {
        Self {
            machine,
            controller: DecisionController::new(store),
            detector,
            policy,
            max_captures: None,
            preview: None,
            frames: 0,
        }
    }

    pub fn from_config(
        config: &SessionConfig,
        machine: CaptureStateMachine,
        store: S,
        detector: D,
    ) -> Result<Self, SessionError> {
        let policy = config.decision.parse()?;
        Ok(Self::new(machine, store, detector, policy).with_max_captures(config.max_captures))
    }

    pub fn with_max_captures(mut self, max_captures: Option<u32>) -> Self {
        self.max_captures = max_captures;
        self
    }

    pub fn with_preview(mut self, sink: impl PreviewSink + Send + 'static) -> Self {
        self.preview = Some(Box::new(sink));
        self
    }

    pub fn machine(&self) -> &CaptureStateMachine {
        &self.machine
    }

    pub fn controller(&self) -> &DecisionController<S> {
        &self.controller
    }

    /// Drive the session until the source ends, the user quits, or
    /// `max_captures` captures have been kept.
    pub async fn run(
        mut self,
        mut frames: FrameReceiver,
        mut commands: mpsc::Receiver<UserCommand>,
    ) -> Result<SessionSummary, SessionError> {
        info!(
            detector = self.detector.name(),
            store = self.controller.store().name(),
            policy = ?self.policy,
            "capture session started"
        );
        let mut commands_open = true;

        loop {
            let flow = tokio::select! {
                frame = frames.recv() => match frame {
                    Some(Ok(frame)) => self.handle_frame(&frame).await?,
                    Some(Err(e)) => {
                        error!(error = %e, "frame source failed, ending session");
                        self.machine.release();
                        return Err(SessionError::Source(e));
                    }
                    None => {
                        info!("frame source ended");
                        Flow::Stop
                    }
                },
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("command channel closed");
                        commands_open = false;
                        Flow::Continue
                    }
                },
            };
            if matches!(flow, Flow::Stop) || self.reached_max_captures() {
                break;
            }
        }

        // Anything still frozen is dropped with the session.
        if self.machine.release().is_some() {
            info!("session ended with an undecided capture, discarding it");
        }
        let summary = self.summary();
        info!(
            frames = summary.frames,
            kept = summary.captures_kept,
            discarded = summary.captures_discarded,
            "capture session finished"
        );
        Ok(summary)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            frames: self.frames,
            captures_kept: self.controller.kept(),
            captures_discarded: self.controller.discarded(),
        }
    }

    fn reached_max_captures(&self) -> bool {
        self.max_captures
            .is_some_and(|max| self.controller.kept() >= max)
    }

    async fn handle_frame(&mut self, frame: &Frame) -> Result<Flow, SessionError> {
        self.frames += 1;
        if self.machine.frozen().is_some() {
            debug!(
                seq = frame.seq,
                showing = self.machine.frame_to_display(frame).seq,
                "capture frozen, dropping frame"
            );
            return Ok(Flow::Continue);
        }

        let detections = match self.detector.detect(frame).await {
            Ok(d) => d,
            Err(e) if e.is_fatal() => {
                error!(error = %e, detector = self.detector.name(), "hand detector failed");
                return Err(SessionError::Detector(e));
            }
            Err(e) => {
                warn!(error = %e, seq = frame.seq, "bad detector response, treating as no hand");
                Vec::new()
            }
        };

        match self.machine.on_tick(frame, &detections, frame.captured_at_ms) {
            TickOutput::NoOp => {}
            TickOutput::Status(status @ Status::HoldSteady { .. }) => {
                debug!(status = %status, "status");
            }
            TickOutput::Status(status) => {
                info!(status = %status, "status");
            }
            output @ TickOutput::Triggered { zero_area, .. } => {
                if let Some(text) = output.status_text() {
                    info!(status = %text, "status");
                }
                if zero_area {
                    warn!("crop is empty; only discard is possible");
                }
                return Ok(self.on_capture());
            }
        }
        Ok(Flow::Continue)
    }

    fn on_capture(&mut self) -> Flow {
        match self.policy {
            DecisionPolicy::Keep => self.handle_command(UserCommand::Keep),
            DecisionPolicy::Discard => self.handle_command(UserCommand::Discard),
            DecisionPolicy::Prompt => {
                info!("[k]eep, [d]iscard, [p]review or [q]uit?");
                Flow::Continue
            }
        }
    }

    fn handle_command(&mut self, command: UserCommand) -> Flow {
        match command {
            UserCommand::Keep => match self.controller.keep(&mut self.machine) {
                Ok(Decision::Kept(id)) => {
                    info!(path = %id.path.display(), "Image saved! Try another one.");
                }
                Ok(_) => debug!("nothing to keep"),
                Err(DecisionError::EmptyCrop(_)) if self.policy == DecisionPolicy::Keep => {
                    // unattended: nobody can discard for us
                    warn!("empty crop cannot be kept, discarding");
                    self.controller.discard(&mut self.machine);
                }
                Err(e) => warn!(error = %e, "keep failed, capture still pending"),
            },
            UserCommand::Discard => {
                if self.controller.discard(&mut self.machine) == Decision::Discarded {
                    info!(status = %Status::NoHand, "status");
                }
            }
            UserCommand::Preview => match self.controller.preview(&self.machine) {
                Ok(Some(image)) => match self.preview.as_mut() {
                    Some(sink) => sink.show(&image),
                    None => info!(width = image.width(), height = image.height(), "crop preview"),
                },
                Ok(None) => debug!("nothing to preview"),
                Err(e) => warn!(error = %e, "preview unavailable"),
            },
            UserCommand::Quit => {
                info!("quit requested");
                return Flow::Stop;
            }
        }
        Flow::Continue
    }
}

/// Read user commands from stdin, one per line.
pub fn spawn_stdin_commands() -> mpsc::Receiver<UserCommand> {
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match line.parse::<UserCommand>() {
                    Ok(command) => {
                        if tx.send(command).await.is_err() {
                            return;
                        }
                    }
                    Err(unknown) => warn!(input = unknown, "unknown command"),
                },
                Ok(None) => return,
                Err(e) => {
                    warn!(error = %e, "failed to read stdin");
                    return;
                }
            }
        }
    });
    rx
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("unknown decision policy '{0}', expected 'prompt', 'keep' or 'discard'")]
    UnknownPolicy(String),
    #[error("frame source failed: {0}")]
    Source(#[from] SourceError),
    #[error("hand detector failed: {0}")]
    Detector(#[from] DetectorError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CaptureId, StoreError};
    use crate::trigger::{RegionSpec, SessionPhase, TriggerSettings};
    use hand_capture_common::geometry::{CropRect, HandLandmarks, Point2D, Region};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    /// Detections keyed by frame seq.
    struct ScriptedDetector(HashMap<u64, Vec<HandLandmarks>>);

    impl HandDetector for ScriptedDetector {
        async fn detect(&mut self, frame: &Frame) -> Result<Vec<HandLandmarks>, DetectorError> {
            Ok(self.0.get(&frame.seq).cloned().unwrap_or_default())
        }
    }

    struct FailingDetector;

    impl HandDetector for FailingDetector {
        async fn detect(&mut self, _frame: &Frame) -> Result<Vec<HandLandmarks>, DetectorError> {
            Err(DetectorError::Exited)
        }
    }

    #[derive(Clone, Default)]
    struct SharedStore(Arc<Mutex<Vec<(u64, CropRect)>>>);

    impl CaptureStore for SharedStore {
        fn save(&mut self, frame: &Frame, crop: CropRect) -> Result<CaptureId, StoreError> {
            let mut saved = self.0.lock().unwrap();
            saved.push((frame.seq, crop));
            Ok(CaptureId {
                count: saved.len() as u32,
                path: PathBuf::from("mem"),
            })
        }
    }

    fn inside() -> Vec<HandLandmarks> {
        vec![[(150.0, 150.0), (350.0, 350.0)]
            .into_iter()
            .map(|(x, y)| Point2D::new(x, y))
            .collect()]
    }

    fn machine() -> CaptureStateMachine {
        let region = Region::new(100, 100, 400, 400).unwrap();
        CaptureStateMachine::new(TriggerSettings::new(RegionSpec::Fixed(region), 3000, 30).unwrap())
    }

    /// One frame per second, seq == seconds.
    fn feed(count: u64) -> FrameReceiver {
        let (tx, rx) = mpsc::channel(count as usize + 1);
        for seq in 0..count {
            tx.try_send(Ok(Frame::blank(500, 500, seq as i64 * 1000, seq))).unwrap();
        }
        rx
    }

    fn no_commands() -> mpsc::Receiver<UserCommand> {
        mpsc::channel(1).1
    }

    fn held_for(seqs: impl IntoIterator<Item = u64>) -> ScriptedDetector {
        ScriptedDetector(seqs.into_iter().map(|s| (s, inside())).collect())
    }

    #[tokio::test]
    async fn auto_keep_saves_each_dwell() {
        let store = SharedStore::default();
        // hand held through seconds 0..=3, then again 5..=8
        let detector = held_for((0..=3).chain(5..=8));
        let session = Session::new(machine(), store.clone(), detector, DecisionPolicy::Keep);

        let summary = session.run(feed(10), no_commands()).await.unwrap();
        assert_eq!(summary.frames, 10);
        assert_eq!(summary.captures_kept, 2);
        let saved = store.0.lock().unwrap().clone();
        assert_eq!(saved.iter().map(|(seq, _)| *seq).collect::<Vec<_>>(), vec![3, 8]);
        assert_eq!(saved[0].1, CropRect { x: 120, y: 120, width: 260, height: 260 });
    }

    #[tokio::test]
    async fn gap_in_containment_prevents_capture() {
        let store = SharedStore::default();
        // contained at 0,1, missing at 2, contained 3..=5: dwell only reaches 2s
        let detector = held_for([0, 1, 3, 4, 5]);
        let session = Session::new(machine(), store.clone(), detector, DecisionPolicy::Keep);

        let summary = session.run(feed(6), no_commands()).await.unwrap();
        assert_eq!(summary.captures_kept, 0);
        assert!(store.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn auto_discard_never_persists() {
        let store = SharedStore::default();
        let detector = held_for(0..=3);
        let session = Session::new(machine(), store.clone(), detector, DecisionPolicy::Discard);

        let summary = session.run(feed(4), no_commands()).await.unwrap();
        assert_eq!(summary.captures_discarded, 1);
        assert!(store.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn max_captures_ends_session() {
        let detector = held_for(0..20);
        let session = Session::new(machine(), SharedStore::default(), detector, DecisionPolicy::Keep)
            .with_max_captures(Some(1));

        let summary = session.run(feed(20), no_commands()).await.unwrap();
        assert_eq!(summary.captures_kept, 1);
        assert_eq!(summary.frames, 4);
    }

    #[tokio::test]
    async fn prompt_waits_for_user_keep() {
        let store = SharedStore::default();
        let mut session =
            Session::new(machine(), store.clone(), held_for(0..10), DecisionPolicy::Prompt);

        for seq in 0..6 {
            session
                .handle_frame(&Frame::blank(500, 500, seq as i64 * 1000, seq))
                .await
                .unwrap();
        }
        // frozen at seq 3; later frames were dropped
        assert_eq!(session.machine().phase(), SessionPhase::FrozenAwaitingDecision);
        assert_eq!(session.machine().frozen().unwrap().frame().seq, 3);
        assert!(store.0.lock().unwrap().is_empty());

        session.handle_command(UserCommand::Keep);
        assert_eq!(session.machine().phase(), SessionPhase::Scanning);
        assert_eq!(store.0.lock().unwrap().len(), 1);

        // keep again with nothing frozen: no-op
        session.handle_command(UserCommand::Keep);
        assert_eq!(store.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn preview_goes_to_sink() {
        let shown = Arc::new(Mutex::new(Vec::new()));
        let sink_shown = Arc::clone(&shown);
        let mut session =
            Session::new(machine(), SharedStore::default(), held_for(0..4), DecisionPolicy::Prompt)
                .with_preview(move |img: &image::RgbImage| {
                    sink_shown.lock().unwrap().push(img.dimensions());
                });

        for seq in 0..4 {
            session
                .handle_frame(&Frame::blank(500, 500, seq as i64 * 1000, seq))
                .await
                .unwrap();
        }
        session.handle_command(UserCommand::Preview);
        assert_eq!(*shown.lock().unwrap(), vec![(260, 260)]);
        assert_eq!(session.machine().phase(), SessionPhase::FrozenAwaitingDecision);
    }

    #[tokio::test]
    async fn quit_command_stops_and_releases() {
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        cmd_tx.send(UserCommand::Quit).await.unwrap();
        // frame channel stays open so only the quit can end the session
        let (_frame_tx, frames) = mpsc::channel(1);
        let session =
            Session::new(machine(), SharedStore::default(), held_for([]), DecisionPolicy::Prompt);

        let summary = session.run(frames, cmd_rx).await.unwrap();
        assert_eq!(summary, SessionSummary::default());
    }

    #[tokio::test]
    async fn source_error_is_terminal() {
        let (tx, rx) = mpsc::channel(2);
        tx.try_send(Ok(Frame::blank(500, 500, 0, 0))).unwrap();
        tx.try_send(Err(SourceError::StreamEnded)).unwrap();
        let session =
            Session::new(machine(), SharedStore::default(), held_for([0]), DecisionPolicy::Keep);

        let result = session.run(rx, no_commands()).await;
        assert!(matches!(result, Err(SessionError::Source(SourceError::StreamEnded))));
    }

    #[tokio::test]
    async fn fatal_detector_error_is_terminal() {
        let session = Session::new(
            machine(),
            SharedStore::default(),
            FailingDetector,
            DecisionPolicy::Keep,
        );
        let result = session.run(feed(2), no_commands()).await;
        assert!(matches!(result, Err(SessionError::Detector(DetectorError::Exited))));
    }

    #[test]
    fn parses_policies_and_commands() {
        assert_eq!("keep".parse::<DecisionPolicy>().unwrap(), DecisionPolicy::Keep);
        assert!("maybe".parse::<DecisionPolicy>().is_err());
        assert_eq!(" K ".parse::<UserCommand>().unwrap(), UserCommand::Keep);
        assert_eq!("retry".parse::<UserCommand>().unwrap(), UserCommand::Discard);
        assert_eq!("crop".parse::<UserCommand>().unwrap(), UserCommand::Preview);
        assert!("jump".parse::<UserCommand>().is_err());
    }
}

use std::fmt;
use std::num::NonZeroU32;

use hand_capture_common::config::CaptureConfig;
use hand_capture_common::frame::Frame;
use hand_capture_common::geometry::{CropRect, GeometryError, HandLandmarks, Region};
use tracing::{debug, info, warn};

use super::containment::{is_contained, select_hand};
use super::crop::crop;
use super::dwell::DwellTimer;

/// Where the target region sits for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionSpec {
    /// Square of this side, centered on the first frame's dimensions.
    Centered { side: NonZeroU32 },
    Fixed(Region),
}

/// Validated trigger parameters. Construction is the only place bad
/// configuration is rejected; once built, ticking cannot fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerSettings {
    pub region: RegionSpec,
    pub dwell_ms: u64,
    pub margin: u32,
}

impl TriggerSettings {
    pub fn new(region: RegionSpec, dwell_ms: u64, margin: i32) -> Result<Self, TriggerError> {
        if dwell_ms == 0 {
            return Err(TriggerError::InvalidDwell);
        }
        let margin = u32::try_from(margin).map_err(|_| TriggerError::InvalidMargin(margin))?;
        Ok(Self {
            region,
            dwell_ms,
            margin,
        })
    }

    pub fn from_config(config: &CaptureConfig) -> Result<Self, TriggerError> {
        let region = match config.region {
            Some(r) => RegionSpec::Fixed(Region::new(r.left, r.top, r.right, r.bottom)?),
            None => RegionSpec::Centered {
                side: NonZeroU32::new(config.region_side).ok_or(TriggerError::InvalidRegionSide)?,
            },
        };
        Self::new(region, config.dwell_ms, config.margin)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("crop margin must be non-negative, got {0}")]
    InvalidMargin(i32),
    #[error("region side must be greater than zero")]
    InvalidRegionSide,
    #[error("invalid region: {0}")]
    InvalidRegion(#[from] GeometryError),
    #[error("dwell duration must be greater than zero")]
    InvalidDwell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Scanning,
    FrozenAwaitingDecision,
}

/// User-facing state of the scan, one per emitted status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    NoHand,
    OutsideRegion,
    HoldSteady { elapsed_ms: u64, dwell_ms: u64 },
    Captured { zero_area: bool },
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::NoHand => f.write_str("Put your hand inside the detection box"),
            Status::OutsideRegion => f.write_str("Hand detected outside the box, move it inside"),
            Status::HoldSteady {
                elapsed_ms,
                dwell_ms,
            } => write!(
                f,
                "Remain stationary for {} seconds ({:.1}s)",
                dwell_ms.div_ceil(1000),
                *elapsed_ms as f64 / 1000.0
            ),
            Status::Captured { zero_area: false } => f.write_str("Hand detected! Choose an option."),
            Status::Captured { zero_area: true } => f.write_str(
                "Hand detected! Choose an option. (crop is empty, the hand is outside the frame)",
            ),
        }
    }
}

/// Result of feeding one frame to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutput {
    /// Nothing changed worth reporting (repeated "no hand", or frozen).
    NoOp,
    Status(Status),
    /// Dwell completed; the frame is frozen and awaits a decision.
    Triggered { crop: CropRect, zero_area: bool },
}

impl TickOutput {
    pub fn triggered(&self) -> bool {
        matches!(self, TickOutput::Triggered { .. })
    }

    pub fn status(&self) -> Option<Status> {
        match *self {
            TickOutput::NoOp => None,
            TickOutput::Status(s) => Some(s),
            TickOutput::Triggered { zero_area, .. } => Some(Status::Captured { zero_area }),
        }
    }

    pub fn status_text(&self) -> Option<String> {
        self.status().map(|s| s.to_string())
    }
}

/// A frame held at the moment dwell completed, with the hand's crop.
#[derive(Debug, Clone)]
pub struct FrozenCapture {
    frame: Frame,
    crop: CropRect,
    landmarks: HandLandmarks,
    frozen_at_ms: i64,
}

impl FrozenCapture {
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn crop(&self) -> CropRect {
        self.crop
    }

    pub fn landmarks(&self) -> &HandLandmarks {
        &self.landmarks
    }

    pub fn frozen_at_ms(&self) -> i64 {
        self.frozen_at_ms
    }

    pub fn is_zero_area(&self) -> bool {
        self.crop.is_empty()
    }

    /// Packed RGB8 pixels under the crop rectangle.
    pub fn cropped_pixels(&self) -> Vec<u8> {
        self.frame.crop_pixels(self.crop).1
    }
}

enum CaptureState {
    Scanning { last_status: Option<Status> },
    Frozen(FrozenCapture),
}

/// Turns per-frame hand detections into a one-shot capture decision.
///
/// Owns the dwell timer, the session phase and the frozen capture. Not meant
/// for concurrent use: one logical thread drives `on_tick` and the decisions.
pub struct CaptureStateMachine {
    settings: TriggerSettings,
    region: Option<Region>,
    timer: DwellTimer,
    state: CaptureState,
}

impl CaptureStateMachine {
    pub fn new(settings: TriggerSettings) -> Self {
        let region = match settings.region {
            RegionSpec::Fixed(r) => Some(r),
            RegionSpec::Centered { .. } => None,
        };
        Self {
            settings,
            region,
            timer: DwellTimer::new(),
            state: CaptureState::Scanning { last_status: None },
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Result<Self, TriggerError> {
        Ok(Self::new(TriggerSettings::from_config(config)?))
    }

    pub fn settings(&self) -> &TriggerSettings {
        &self.settings
    }

    /// Target region; `None` until the first frame fixes a centered region.
    pub fn region(&self) -> Option<Region> {
        self.region
    }

    pub fn phase(&self) -> SessionPhase {
        match self.state {
            CaptureState::Scanning { .. } => SessionPhase::Scanning,
            CaptureState::Frozen(_) => SessionPhase::FrozenAwaitingDecision,
        }
    }

    pub fn frozen(&self) -> Option<&FrozenCapture> {
        match &self.state {
            CaptureState::Frozen(capture) => Some(capture),
            CaptureState::Scanning { .. } => None,
        }
    }

    pub fn dwell_anchor_ms(&self) -> Option<i64> {
        self.timer.anchor_ms()
    }

    /// Frame the presentation layer should show: the frozen frame while a
    /// capture awaits a decision, otherwise the incoming live frame.
    pub fn frame_to_display<'a>(&'a self, incoming: &'a Frame) -> &'a Frame {
        self.frozen().map_or(incoming, FrozenCapture::frame)
    }

    /// Process one frame's detections. This is the main entry point.
    pub fn on_tick(&mut self, frame: &Frame, detections: &[HandLandmarks], now_ms: i64) -> TickOutput {
        let last_status = match &self.state {
            CaptureState::Scanning { last_status } => *last_status,
            CaptureState::Frozen(_) => {
                debug!(seq = frame.seq, "FROZEN: ignoring tick until a decision is made");
                return TickOutput::NoOp;
            }
        };

        let region = self.resolve_region(frame);

        let Some(hand) = select_hand(detections) else {
            self.timer.tick(now_ms, false);
            return self.report(last_status, Status::NoHand);
        };

        let contained = is_contained(hand, &region);
        let elapsed_ms = self.timer.tick(now_ms, contained);

        if !contained {
            return self.report(last_status, Status::OutsideRegion);
        }

        if elapsed_ms < self.settings.dwell_ms {
            debug!(elapsed_ms, dwell_ms = self.settings.dwell_ms, "SCANNING: hand held in region");
            return self.report(
                last_status,
                Status::HoldSteady {
                    elapsed_ms,
                    dwell_ms: self.settings.dwell_ms,
                },
            );
        }

        let rect = crop(frame, hand, self.settings.margin);
        let zero_area = rect.is_empty();
        if zero_area {
            warn!(?rect, seq = frame.seq, "dwell complete but crop has zero area");
        }
        info!(
            elapsed_ms,
            seq = frame.seq,
            x = rect.x,
            y = rect.y,
            width = rect.width,
            height = rect.height,
            "SCANNING→FROZEN: dwell complete, capture frozen"
        );
        self.state = CaptureState::Frozen(FrozenCapture {
            frame: frame.clone(),
            crop: rect,
            landmarks: hand.clone(),
            frozen_at_ms: now_ms,
        });
        TickOutput::Triggered {
            crop: rect,
            zero_area,
        }
    }

    /// Drop any frozen capture and return to scanning with a cleared dwell clock.
    ///
    /// Returns the released capture, or `None` (and changes nothing) if the
    /// machine was already scanning.
    pub fn release(&mut self) -> Option<FrozenCapture> {
        match std::mem::replace(&mut self.state, CaptureState::Scanning { last_status: None }) {
            CaptureState::Frozen(capture) => {
                self.timer.reset();
                info!(seq = capture.frame.seq, "FROZEN→SCANNING: capture released");
                Some(capture)
            }
            scanning => {
                self.state = scanning;
                None
            }
        }
    }

    fn resolve_region(&mut self, frame: &Frame) -> Region {
        if let Some(region) = self.region {
            return region;
        }
        let region = match self.settings.region {
            RegionSpec::Fixed(region) => region,
            RegionSpec::Centered { side } => Region::centered(frame.width(), frame.height(), side),
        };
        info!(
            left = region.left(),
            top = region.top(),
            right = region.right(),
            bottom = region.bottom(),
            "target region fixed for session"
        );
        self.region = Some(region);
        region
    }

    fn report(&mut self, last_status: Option<Status>, status: Status) -> TickOutput {
        self.state = CaptureState::Scanning {
            last_status: Some(status),
        };
        if status == Status::NoHand && last_status == Some(Status::NoHand) {
            return TickOutput::NoOp;
        }
        TickOutput::Status(status)
    }
}

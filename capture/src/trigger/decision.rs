use hand_capture_common::geometry::CropRect;
use image::RgbImage;
use tracing::{debug, info, warn};

use super::state::CaptureStateMachine;
use crate::store::{crop_image, CaptureId, CaptureStore, StoreError};

/// Outcome of a user decision on the frozen capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Kept(CaptureId),
    Discarded,
    /// No capture was frozen; nothing happened.
    NoCapture,
}

/// Applies keep/discard choices to the state machine and hands kept
/// captures to the store.
pub struct DecisionController<S: CaptureStore> {
    store: S,
    kept: u32,
    discarded: u32,
}

impl<S: CaptureStore> DecisionController<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            kept: 0,
            discarded: 0,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn kept(&self) -> u32 {
        self.kept
    }

    pub fn discarded(&self) -> u32 {
        self.discarded
    }

    /// Persist the frozen crop, then resume scanning.
    ///
    /// A zero-area crop or a failed save leaves the capture frozen so the
    /// user can retry or discard it.
    pub fn keep(&mut self, machine: &mut CaptureStateMachine) -> Result<Decision, DecisionError> {
        let Some(capture) = machine.frozen() else {
            debug!("keep requested while scanning, ignoring");
            return Ok(Decision::NoCapture);
        };
        if capture.is_zero_area() {
            warn!(crop = ?capture.crop(), "refusing to keep an empty crop");
            return Err(DecisionError::EmptyCrop(capture.crop()));
        }

        let id = self.store.save(capture.frame(), capture.crop())?;
        machine.release();
        self.kept += 1;
        info!(
            store = self.store.name(),
            count = id.count,
            kept = self.kept,
            "capture kept"
        );
        Ok(Decision::Kept(id))
    }

    /// Drop the frozen capture without persisting it and resume scanning.
    pub fn discard(&mut self, machine: &mut CaptureStateMachine) -> Decision {
        match machine.release() {
            Some(capture) => {
                self.discarded += 1;
                info!(seq = capture.frame().seq, "capture discarded, try again");
                Decision::Discarded
            }
            None => {
                debug!("discard requested while scanning, ignoring");
                Decision::NoCapture
            }
        }
    }

    /// Cropped image of the frozen capture, without resolving the decision.
    pub fn preview(&self, machine: &CaptureStateMachine) -> Result<Option<RgbImage>, DecisionError> {
        match machine.frozen() {
            Some(capture) if capture.is_zero_area() => {
                Err(DecisionError::EmptyCrop(capture.crop()))
            }
            Some(capture) => Ok(Some(crop_image(capture.frame(), capture.crop())?)),
            None => Ok(None),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error("capture crop {0:?} has zero area; discard it and try again")]
    EmptyCrop(CropRect),
    #[error("failed to persist capture: {0}")]
    Store(#[from] StoreError),
}

pub mod containment;
pub mod crop;
pub mod decision;
pub mod dwell;
pub mod state;

pub use decision::{Decision, DecisionController, DecisionError};
pub use dwell::DwellTimer;
pub use state::{
    CaptureStateMachine, FrozenCapture, RegionSpec, SessionPhase, Status, TickOutput,
    TriggerError, TriggerSettings,
};

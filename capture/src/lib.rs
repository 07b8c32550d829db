//! Hand-in-region capture trigger.
//!
//! A live frame feed is checked for a hand held inside a fixed on-screen
//! region. Once the hand stays there for the dwell period the frame is
//! frozen, a crop around the hand is computed, and the user keeps or
//! discards it.

pub mod detector;
pub mod session;
pub mod source;
pub mod store;
pub mod trigger;

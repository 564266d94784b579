//! Runtime driver for the playback engine.
//!
//! The runtime owns the wake-up cadence: a thread that drains control
//! messages and runs the schedule loop on a fixed interval.

pub mod thread;

pub use thread::{ControlMessage, Runtime, RuntimeHandle};

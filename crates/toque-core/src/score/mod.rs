//! Score model and shared access.
//!
//! - [`Toque`] / [`Section`] / [`Measure`] / [`Track`] / [`Stroke`] -
//!   the hierarchical score data
//! - [`ScoreManager`] - clone-shared handle the editor and scheduler
//!   both hold

mod manager;
mod model;

pub use manager::ScoreManager;
pub use model::{Measure, Section, Stroke, Toque, Track};

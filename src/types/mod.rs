//! Core identifier types for the engine.

mod ids;

pub use ids::{InvalidId, RunId, TaskId};

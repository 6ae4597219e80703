//! Command surfaces: thin presentation wrappers over the core engine.

pub mod analyze;
pub mod report;
pub mod setup;
pub mod simulate;
pub mod ui;

mod data;

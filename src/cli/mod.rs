//! Command handlers and terminal output helpers

pub mod reconcile;
pub mod run;
pub mod setup;
pub mod status;
pub mod ui;

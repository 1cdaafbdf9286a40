//! Guide Service Library Crate
//!
//! Everything the `guide` binary needs besides argument parsing: configuration,
//! a file-backed camera, console display, stdin command parsing and the
//! frame-ticked host loop driving the orchestrator.

pub mod camera;
pub mod config;
pub mod console;
pub mod display;
pub mod host;

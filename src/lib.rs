//! peer-player library crate
//!
//! Paces decoded media from a sample source to a delivery sink, one session
//! per connected peer. The binary in main.rs wires it to a console host.

#[macro_use]
extern crate log;

pub mod audio;
pub mod buffer;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod format;
pub mod host;
pub mod pacing;
pub mod resampler;
pub mod session;
pub mod sink;
pub mod sources;
pub mod stdin;
pub mod surface;
pub mod time;

#[cfg(test)]
mod buffer_tests;
#[cfg(test)]
mod stdin_tests;
#[cfg(test)]
mod surface_tests;

//! Core types, config, errors, and pipeline event model for voxmeter.

pub mod config;
pub mod error;
pub mod event;

pub use error::{Result, VoxmeterError};
pub use event::{CallEvent, TimedEvent};

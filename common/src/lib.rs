//! Common utilities for the verse visualizations
//!
//! This crate provides the shared GPU/window setup and the orbital camera
//! used by every scene the verse orchestrator mounts.

pub mod camera;
pub mod error;
pub mod graphics;

pub use camera::*;
pub use error::{GraphicsError, Result};
pub use graphics::*;

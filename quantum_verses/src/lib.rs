//! Quantum Verses
//!
//! A sequence of short interactive visualizations, one per verse, each
//! pairing a quantum phenomenon with a line of contemplative text:
//!
//! - **Double Slit**: Which-path measurement destroys interference
//! - **Superposition**: A spin holding both outcomes until observed
//! - **Wave Packet**: A localized particle spreading as it evolves
//! - **Entanglement**: Correlated outcomes across a separated pair
//! - **Decay**: A sealed box whose history is fixed only when opened
//! - **Pair Creation**: Virtual particles arising from and returning to the vacuum
//!
//! Only one verse is mounted at a time. The [`orchestrator`] tears the
//! previous one down completely before the next one is built.

pub mod amplitude;
pub mod config;
pub mod controls;
pub mod equations;
pub mod error;
pub mod lifecycle;
pub mod orchestrator;
pub mod physics;
pub mod renderer;
pub mod route;
pub mod scheduler;
pub mod stage;
pub mod timers;
pub mod ui;
pub mod verses;

pub use error::{Result, VerseError};
pub use lifecycle::{Animation, FrameTime, Mount};
pub use orchestrator::{Orchestrator, Selection, VerseRegistry};
pub use route::{Route, VerseId};

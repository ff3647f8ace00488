//! Verse animations and the default registry

pub mod decay;
pub mod double_slit;
pub mod entanglement;
pub mod pair_creation;
pub mod placeholder;
pub mod superposition;
pub mod wave_packet;

use crate::equations::*;
use crate::orchestrator::{VerseEntry, VerseRegistry};
use crate::route::VerseId;

/// Every verse that has an animation. Other ids fall back to the placeholder.
pub fn default_registry() -> VerseRegistry {
    let mut registry = VerseRegistry::new();
    registry.register(
        VerseEntry::new(VerseId(1), "The Watcher and the Two Doors", double_slit::init)
            .with_equations(DOUBLE_SLIT_EQUATIONS, DOUBLE_SLIT_VARIABLES),
    );
    registry.register(
        VerseEntry::new(VerseId(2), "Neither This Nor That", superposition::init)
            .with_equations(SUPERPOSITION_EQUATIONS, SUPERPOSITION_VARIABLES),
    );
    registry.register(
        VerseEntry::new(VerseId(3), "The Spreading of Form", wave_packet::init)
            .with_equations(WAVE_PACKET_EQUATIONS, WAVE_PACKET_VARIABLES),
    );
    registry.register(
        VerseEntry::new(VerseId(4), "Two Bodies, One Breath", entanglement::init)
            .with_equations(ENTANGLEMENT_EQUATIONS, ENTANGLEMENT_VARIABLES),
    );
    registry.register(
        VerseEntry::new(VerseId(5), "What the Opened Box Reveals", decay::init)
            .with_equations(DECAY_EQUATIONS, DECAY_VARIABLES),
    );
    registry.register(
        VerseEntry::new(VerseId(6), "Arising and Passing Away", pair_creation::init)
            .with_equations(PAIR_CREATION_EQUATIONS, PAIR_CREATION_VARIABLES),
    );
    registry
}

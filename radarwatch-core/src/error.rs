//! Error types for engine operations
//!
//! Stale input (old headings, aged spokes, writes from a detached radar) is
//! never an error; it shows up as state. Only caller mistakes are reported
//! here.

use thiserror::Error;

use crate::engine::RadarId;

/// Errors returned by [`RadarEngine`](crate::engine::RadarEngine) operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// No radar is attached under this id
    #[error("No such radar: {0}")]
    NoSuchRadar(RadarId),

    /// Zone index outside the radar's zone slots
    #[error("Radar {radar} has no guard zone {index}")]
    NoSuchGuardZone { radar: RadarId, index: usize },

    /// A radar with this id is already attached
    #[error("Radar {0} is already attached")]
    AlreadyAttached(RadarId),

    /// Guard zone definition failed validation
    #[error("Invalid guard zone: {0}")]
    InvalidGuardZone(String),
}

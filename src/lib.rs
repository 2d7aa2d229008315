//! Ptsmap - bitstream offset to presentation timestamp correspondence
//!
//! This library crate exposes the operator-side pieces (configuration,
//! trace replay, concrete collaborators) for integration testing. The engine
//! itself lives in `ptsmap-engine`.

pub mod config;
pub mod diagnostics;
pub mod replay;
pub mod sync;

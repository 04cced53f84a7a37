//! Automation loops for the game client.
//!
//! This module provides:
//! - Configuration for window, shop layout and loop timing
//! - The purchase state machine, plot auto-advance and cooking loops
//! - The operator that checks preconditions and wires collaborators
//! - Named single-instance worker threads

pub mod config;
pub mod cooking;
pub mod detection;
#[cfg(windows)]
pub mod input;
pub mod operator;
pub mod plot;
pub mod purchase;
pub mod runner;
pub mod state;

//! Synthetic trace generation and parameter sweeps for an external
//! network-on-chip simulator.

pub mod aggregate;
pub mod decoder;
pub mod error;
pub mod export;
pub mod materialize;
pub mod packet;
pub mod simulator;
pub mod sweep;
pub mod trace;

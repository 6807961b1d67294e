//! Core primitives shared by every table.

pub mod rng;

pub use rng::DeterministicRng;

//! Adapters: task store, audit probes and role behaviours.

pub mod memory;
pub mod probes;
pub mod roles;

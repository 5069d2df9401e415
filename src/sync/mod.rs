//! Synchronization primitives and the execution manager.

pub mod execution_manager;
pub mod fence;

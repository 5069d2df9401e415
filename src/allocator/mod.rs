//! The allocator module exposes a couple interesting parts of the API
//! <br>
//! <br>
//! # Allocator traits
//! These are defined in [`traits`], and can be implemented to supply a custom allocator type to all firstlight functions.
//! # Dedicated allocator
//! The default. Every buffer gets its own `VkDeviceMemory`, see [`dedicated_allocator`].
//! # Default allocator
//! A pooled allocator based on the `gpu_allocator` crate, for callers who prefer sub-allocation.

pub mod dedicated_allocator;
pub mod default_allocator;
pub mod memory_type;
pub mod traits;

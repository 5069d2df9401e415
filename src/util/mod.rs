//! Various utilities

pub mod address;
pub mod align;
pub mod to_vk;
pub mod transform;

pub(crate) mod string;

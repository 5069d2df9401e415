//! Utilities for aligning memory

use std::ops::{Add, Div, Mul, Sub};

/// Round `value` up to the next multiple of `alignment`. Values that are already aligned are
/// returned unchanged. Does not align the base address.
pub fn align<T>(value: T, alignment: T) -> T
where
    T: Add<Output = T> + Sub<Output = T> + Div<Output = T> + Mul<Output = T> + From<u8> + Copy, {
    let one = T::from(1u8);
    ((value + alignment - one) / alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up_to_multiple() {
        assert_eq!(align(32u32, 64u32), 64);
        assert_eq!(align(65u64, 64u64), 128);
        assert_eq!(align(1u64, 256u64), 256);
    }

    #[test]
    fn aligned_values_are_unchanged() {
        assert_eq!(align(64u32, 64u32), 64);
        assert_eq!(align(32u32, 32u32), 32);
        assert_eq!(align(0u64, 128u64), 0);
    }

    #[test]
    fn result_is_smallest_fitting_multiple() {
        for alignment in [1u32, 2, 4, 16, 32, 64] {
            for value in 0u32..200 {
                let aligned = align(value, alignment);
                assert_eq!(aligned % alignment, 0);
                assert!(aligned >= value);
                assert!(aligned < value + alignment);
            }
        }
    }
}

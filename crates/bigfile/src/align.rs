//! Power-of-two alignment helpers for stream positions

/// Round `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two. `align_up(0, a)` is `0`.
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

/// Check whether `value` is a multiple of `alignment` (power of two)
pub const fn is_aligned(value: u64, alignment: u64) -> bool {
    value & (alignment - 1) == 0
}

/// Check whether `alignment` is a non-zero power of two
pub const fn is_valid_alignment(alignment: u64) -> bool {
    alignment.is_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_align_up_basic() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(10, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(5256, 256), 5376);
        assert_eq!(align_up(7, 4), 8);
    }

    #[test]
    fn test_is_aligned() {
        assert!(is_aligned(0, 32));
        assert!(is_aligned(5376, 256));
        assert!(!is_aligned(5377, 256));
        assert!(is_valid_alignment(1));
        assert!(is_valid_alignment(2048));
        assert!(!is_valid_alignment(0));
        assert!(!is_valid_alignment(96));
    }

    proptest! {
        #[test]
        fn align_up_is_idempotent(value in 0u64..(1 << 48), shift in 0u32..16) {
            let alignment = 1u64 << shift;
            let aligned = align_up(value, alignment);
            prop_assert!(aligned >= value);
            prop_assert!(aligned - value < alignment);
            prop_assert!(is_aligned(aligned, alignment));
            prop_assert_eq!(align_up(aligned, alignment), aligned);
        }
    }
}

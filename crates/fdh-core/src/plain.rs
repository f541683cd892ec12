// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Element types that may be viewed directly as raw bytes.

/// Marker for types that are valid for every bit pattern and may be copied
/// byte-for-byte to and from descriptors or mapped memory.
///
/// A `u32` qualifies because any 32 bits form a valid `u32`. A `bool` does not:
/// any byte other than `0` or `1` is an invalid `bool`.
///
/// # Safety
///
/// Implementors must have no padding, no invalid bit patterns and no pointers.
pub unsafe trait Plain: Copy
where
    Self: Sized,
{
}

macro_rules! impl_plain_for {
    ( $($type:ty),* ) => {
        $(
            unsafe impl Plain for $type {}
        )*
    };
}

impl_plain_for!(u8, i8, u16, i16, u32, i32, u64, i64, u128, i128, usize, isize, f32, f64);

unsafe impl<T: Plain, const N: usize> Plain for [T; N] {}

/// Byte view of a slice of plain values.
pub(crate) fn as_bytes<T: Plain>(values: &[T]) -> &[u8] {
    // SAFETY: `T: Plain` has no padding, so every byte of the slice is initialised.
    unsafe {
        std::slice::from_raw_parts(values.as_ptr().cast::<u8>(), std::mem::size_of_val(values))
    }
}

/// Mutable byte view of a slice of plain values.
pub(crate) fn as_bytes_mut<T: Plain>(values: &mut [T]) -> &mut [u8] {
    // SAFETY: any byte pattern written through the view is a valid `T`.
    unsafe {
        std::slice::from_raw_parts_mut(
            values.as_mut_ptr().cast::<u8>(),
            std::mem::size_of_val(values),
        )
    }
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Memory mappings of descriptors
//!
//! A [`MemoryMap`] does not keep the [`Handle`] it was created from: like
//! `mmap(2)` itself, the mapping is a second reference to the underlying object
//! and stays valid after the handle is closed. Clones share one mapping, which
//! is unmapped when the last clone is dropped.

use std::fmt;
use std::marker::PhantomData;
use std::ptr;
use std::sync::Arc;

use nix::errno::Errno;
use tracing::debug;

use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::plain::Plain;

/// Sharing mode of a mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sharing {
    /// Writes reach the underlying object and other mappings of it.
    Shared,
    /// Copy-on-write; writes stay in this process.
    Private,
    /// Private memory with no backing descriptor.
    Anonymous,
}

impl Sharing {
    fn flags(self) -> libc::c_int {
        match self {
            Sharing::Shared => libc::MAP_SHARED,
            Sharing::Private => libc::MAP_PRIVATE,
            Sharing::Anonymous => libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
        }
    }
}

/// Access protection of a mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Protection {
    Read,
    Write,
    ReadWrite,
}

impl Protection {
    fn flags(self) -> libc::c_int {
        match self {
            Protection::Read => libc::PROT_READ,
            Protection::Write => libc::PROT_WRITE,
            Protection::ReadWrite => libc::PROT_READ | libc::PROT_WRITE,
        }
    }
}

/// System page size in bytes.
pub fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

struct Mapping {
    // Stored as `usize` rather than a raw pointer so the mapping is `Send` and
    // `Sync`; access coordination is left to the OS and to the caller.
    ptr: usize,
    len: usize,
}

impl Drop for Mapping {
    fn drop(&mut self) {
        let r = unsafe { libc::munmap(self.ptr as *mut libc::c_void, self.len) };
        debug!(addr = self.ptr, len = self.len, ok = r == 0, "Unmapped region");
    }
}

/// Typed view of a mapped region.
///
/// The length is always tracked in bytes; [`MemoryMap::len`] is the number of
/// whole `T` elements that fit.
pub struct MemoryMap<T: Plain> {
    mapping: Arc<Mapping>,
    _element: PhantomData<T>,
}

impl<T: Plain> MemoryMap<T> {
    /// Map `length` bytes of `handle`'s descriptor starting at `offset`.
    ///
    /// With [`Sharing::Anonymous`] the descriptor is ignored.
    pub fn create(
        handle: &Handle,
        length: usize,
        offset: u64,
        sharing: Sharing,
        protection: Protection,
    ) -> Result<Self> {
        let fd = match sharing {
            Sharing::Anonymous => -1,
            Sharing::Shared | Sharing::Private => handle.raw(),
        };
        Self::map(fd, length, offset, sharing, protection, handle.identity())
    }

    /// Private zero-filled memory not backed by any descriptor.
    pub fn anonymous(length: usize, protection: Protection) -> Result<Self> {
        Self::map(
            -1,
            length,
            0,
            Sharing::Anonymous,
            protection,
            "anonymous".to_string(),
        )
    }

    fn map(
        fd: libc::c_int,
        length: usize,
        offset: u64,
        sharing: Sharing,
        protection: Protection,
        identity: String,
    ) -> Result<Self> {
        // Element counts divide by the element size.
        if std::mem::size_of::<T>() == 0 {
            return Err(Error::Map {
                identity,
                errno: Errno::EINVAL,
            });
        }

        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                length,
                protection.flags(),
                sharing.flags(),
                fd,
                offset as libc::off_t,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(Error::Map {
                identity,
                errno: Errno::last(),
            });
        }
        debug!(fd, addr = ptr as usize, len = length, ?sharing, ?protection, "Mapped region");

        Ok(Self {
            mapping: Arc::new(Mapping {
                ptr: ptr as usize,
                len: length,
            }),
            _element: PhantomData,
        })
    }

    pub fn size_bytes(&self) -> usize {
        self.mapping.len
    }

    /// Number of whole elements in the mapping.
    pub fn len(&self) -> usize {
        self.mapping.len / std::mem::size_of::<T>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pages spanned by the mapping, rounding a partial last page up.
    pub fn page_count(&self) -> usize {
        self.mapping.len.div_ceil(page_size())
    }

    pub fn as_ptr(&self) -> *const T {
        self.mapping.ptr as *const T
    }

    pub fn as_mut_ptr(&self) -> *mut T {
        self.mapping.ptr as *mut T
    }

    /// Number of live views sharing this mapping.
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.mapping)
    }

    /// # Safety
    ///
    /// The mapping must be readable, and nothing may write to the region
    /// (through a clone, a shared mapping or the file) while the slice is alive.
    pub unsafe fn as_slice(&self) -> &[T] {
        std::slice::from_raw_parts(self.as_ptr(), self.len())
    }

    /// # Safety
    ///
    /// The mapping must be writable, and no other view of the region may be
    /// used while the slice is alive.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn as_mut_slice(&self) -> &mut [T] {
        std::slice::from_raw_parts_mut(self.as_mut_ptr(), self.len())
    }
}

impl<T: Plain> Clone for MemoryMap<T> {
    fn clone(&self) -> Self {
        Self {
            mapping: Arc::clone(&self.mapping),
            _element: PhantomData,
        }
    }
}

impl<T: Plain> fmt::Debug for MemoryMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryMap")
            .field("addr", &self.mapping.ptr)
            .field("size_bytes", &self.mapping.len)
            .field("element_size", &std::mem::size_of::<T>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(page_size().is_power_of_two());
    }

    #[test]
    fn test_zero_sized_element_is_rejected() {
        let err = MemoryMap::<[u8; 0]>::anonymous(4096, Protection::Read).unwrap_err();
        assert!(matches!(err, Error::Map { errno: Errno::EINVAL, .. }));

        let zero = Handle::open("/dev/zero", nix::fcntl::OFlag::O_RDONLY).unwrap();
        let err = MemoryMap::<[u32; 0]>::create(&zero, 4096, 0, Sharing::Private, Protection::Read)
            .unwrap_err();
        assert!(err.to_string().contains("/dev/zero"), "{err}");
    }

    #[test]
    fn test_zero_length_mapping_fails() {
        let err = MemoryMap::<u8>::anonymous(0, Protection::ReadWrite).unwrap_err();
        assert!(matches!(err, Error::Map { errno: Errno::EINVAL, .. }));
    }
}

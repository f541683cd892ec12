// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Owned descriptor handles
//!
//! A [`Handle`] owns at most one open descriptor and releases it exactly once.
//! Syscalls go straight to `libc`; failures are reported with the kernel's
//! `Errno` and the handle's identity.
//!
//! Ownership follows Rust moves. `Handle::transfer` (or `std::mem::take`) is the
//! explicit transfer that leaves the source behind as an empty handle, and
//! [`Handle::duplicate`] is the only way to obtain a second descriptor for the
//! same open file description.

use std::ffi::CString;
use std::io::{self, SeekFrom};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use nix::errno::{Errno, ErrnoSentinel};
use nix::fcntl::OFlag;
use nix::sys::stat::Mode;
use tracing::{debug, trace};

use crate::config::HandleConfig;
use crate::error::{Error, Result};
use crate::metadata::Metadata;
use crate::path::normalize;
use crate::plain::{self, Plain};

/// Label given to adopted descriptors when the caller has none.
pub const DEFAULT_LABEL: &str = "unnamed";

/// Access mode captured from `F_GETFL` when the handle is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
    /// No descriptor, or one whose mode could not be queried.
    #[default]
    None,
}

impl AccessMode {
    fn query(fd: RawFd) -> Self {
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags == -1 {
            return AccessMode::None;
        }
        match flags & libc::O_ACCMODE {
            libc::O_RDONLY => AccessMode::ReadOnly,
            libc::O_WRONLY => AccessMode::WriteOnly,
            libc::O_RDWR => AccessMode::ReadWrite,
            _ => AccessMode::None,
        }
    }

    pub fn can_read(self) -> bool {
        matches!(self, AccessMode::ReadOnly | AccessMode::ReadWrite)
    }

    pub fn can_write(self) -> bool {
        matches!(self, AccessMode::WriteOnly | AccessMode::ReadWrite)
    }
}

/// Owner of a single POSIX descriptor.
///
/// `Default` is the empty handle: no descriptor, empty path, [`AccessMode::None`].
#[derive(Debug, Default)]
pub struct Handle {
    fd: Option<OwnedFd>,
    path: String,
    mode: AccessMode,
    snapshot: Option<Metadata>,
    path_backed: bool,
    pub(crate) retry_interrupted: bool,
}

impl Handle {
    /// Open `path` with the default configuration.
    pub fn open(path: &str, flags: OFlag) -> Result<Self> {
        let config = HandleConfig::default();
        Self::open_with(path, flags, config.permissions(), &config)
    }

    /// Open `path`, creating it with `permissions` when `flags` ask for creation.
    ///
    /// The stored path is the canonical form of `path`. With
    /// [`HandleConfig::eager_stat`] the metadata snapshot is taken immediately.
    pub fn open_with(
        path: &str,
        flags: OFlag,
        permissions: Mode,
        config: &HandleConfig,
    ) -> Result<Self> {
        let canonical = normalize(path);
        let c_path = c_string(path).map_err(|errno| Error::Open {
            identity: canonical.clone(),
            errno,
        })?;

        let raw = unsafe {
            libc::open(
                c_path.as_ptr(),
                flags.bits(),
                permissions.bits() as libc::c_uint,
            )
        };
        let raw = Errno::result(raw).map_err(|errno| Error::Open {
            identity: canonical.clone(),
            errno,
        })?;

        // SAFETY: `open` just returned this descriptor and nothing else owns it.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };
        let mut handle = Self::from_parts(fd, canonical, true);
        handle.retry_interrupted = config.retry_interrupted;
        debug!(fd = raw, path = %handle.path, mode = ?handle.mode, "Opened handle");

        if config.eager_stat {
            handle.stat(false)?;
        }
        Ok(handle)
    }

    /// Take ownership of an already open descriptor.
    ///
    /// The label is used for diagnostics only; adopted handles are not
    /// path-backed, so path operations (`unlink`, `parent`, ...) refuse them.
    pub fn adopt(fd: OwnedFd, label: &str) -> Self {
        debug!(fd = fd.as_raw_fd(), label, "Adopted descriptor");
        Self::from_parts(fd, label.to_string(), false)
    }

    /// Take ownership of a raw descriptor number.
    ///
    /// # Safety
    ///
    /// `fd` must be open and not owned by anything else; the handle will close it.
    pub unsafe fn from_raw_fd(fd: RawFd, label: &str) -> Result<Self> {
        if fd < 0 {
            return Err(Error::InvalidDescriptor { fd });
        }
        Ok(Self::adopt(OwnedFd::from_raw_fd(fd), label))
    }

    /// Create a unique temporary file from a template ending in `XXXXXX`.
    pub fn mkstemp(template: &str) -> Result<Self> {
        let mut buf = c_string(template)
            .map_err(|errno| Error::Open {
                identity: normalize(template),
                errno,
            })?
            .into_bytes_with_nul();

        let raw = unsafe { libc::mkstemp(buf.as_mut_ptr().cast()) };
        let raw = Errno::result(raw).map_err(|errno| Error::Open {
            identity: normalize(template),
            errno,
        })?;

        buf.pop();
        let path = String::from_utf8_lossy(&buf).into_owned();
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };
        debug!(fd = raw, path = %path, "Created temporary file");
        Ok(Self::from_parts(fd, normalize(&path), true))
    }

    /// `creat(2)`: create or truncate `path` and open it write-only.
    pub fn creat(path: &str, permissions: Mode) -> Result<Self> {
        let canonical = normalize(path);
        let c_path = c_string(path).map_err(|errno| Error::Open {
            identity: canonical.clone(),
            errno,
        })?;

        let raw = unsafe { libc::creat(c_path.as_ptr(), permissions.bits()) };
        let raw = Errno::result(raw).map_err(|errno| Error::Open {
            identity: canonical.clone(),
            errno,
        })?;

        let fd = unsafe { OwnedFd::from_raw_fd(raw) };
        debug!(fd = raw, path = %canonical, "Created file");
        Ok(Self::from_parts(fd, canonical, true))
    }

    /// Create the directory `path` and open it read-only.
    pub fn mkdir(path: &str, permissions: Mode) -> Result<Self> {
        let c_path = c_string(path).map_err(|errno| Error::Io {
            op: "mkdir",
            identity: normalize(path),
            errno,
        })?;

        Errno::result(unsafe { libc::mkdir(c_path.as_ptr(), permissions.bits()) }).map_err(
            |errno| Error::Io {
                op: "mkdir",
                identity: normalize(path),
                errno,
            },
        )?;

        Self::open(path, OFlag::O_RDONLY | OFlag::O_DIRECTORY)
    }

    fn from_parts(fd: OwnedFd, path: String, path_backed: bool) -> Self {
        let mode = AccessMode::query(fd.as_raw_fd());
        Self {
            fd: Some(fd),
            path,
            mode,
            snapshot: None,
            path_backed,
            retry_interrupted: false,
        }
    }

    /// Descriptor number, or `None` once closed or moved out.
    pub fn fd(&self) -> Option<RawFd> {
        self.fd.as_ref().map(AsRawFd::as_raw_fd)
    }

    /// Canonical path for path-backed handles, the label for adopted ones.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Whether `EINTR` from read, write and seek restarts the call.
    pub fn retries_interrupted(&self) -> bool {
        self.retry_interrupted
    }

    /// Override the retry policy this handle was opened with.
    pub fn set_retry_interrupted(&mut self, retry: bool) {
        self.retry_interrupted = retry;
    }

    /// Whether the handle was created from a filesystem path.
    pub fn is_path_backed(&self) -> bool {
        self.path_backed
    }

    /// Name used in diagnostics: the path if known, else the descriptor number.
    pub fn identity(&self) -> String {
        match (self.path.is_empty(), self.fd()) {
            (false, _) => self.path.clone(),
            (true, Some(fd)) => format!("fd:{fd}"),
            (true, None) => "<closed>".to_string(),
        }
    }

    /// Raw descriptor for syscalls; `-1` makes the kernel answer `EBADF`.
    pub(crate) fn raw(&self) -> RawFd {
        self.fd().unwrap_or(-1)
    }

    pub(crate) fn io_error(&self, op: &'static str, errno: Errno) -> Error {
        Error::Io {
            op,
            identity: self.identity(),
            errno,
        }
    }

    fn syscall<S>(&self, mut call: impl FnMut() -> S) -> std::result::Result<S, Errno>
    where
        S: ErrnoSentinel + PartialEq<S>,
    {
        loop {
            match Errno::result(call()) {
                Err(Errno::EINTR) if self.retry_interrupted => continue,
                other => return other,
            }
        }
    }

    /// Read up to `buf.len()` bytes. A short count, including `0` at end of
    /// file, is returned as is.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let fd = self.raw();
        let n = self
            .syscall(|| unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) })
            .map_err(|errno| self.io_error("read", errno))?;
        trace!(fd, requested = buf.len(), transferred = n, "read");
        Ok(n as usize)
    }

    /// Write up to `buf.len()` bytes; the count actually written is returned.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let fd = self.raw();
        let n = self
            .syscall(|| unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) })
            .map_err(|errno| self.io_error("write", errno))?;
        trace!(fd, requested = buf.len(), transferred = n, "write");
        Ok(n as usize)
    }

    /// Read into a slice of plain values; returns the number of bytes read.
    pub fn read_values<T: Plain>(&self, values: &mut [T]) -> Result<usize> {
        self.read(plain::as_bytes_mut(values))
    }

    /// Write a slice of plain values; returns the number of bytes written.
    pub fn write_values<T: Plain>(&self, values: &[T]) -> Result<usize> {
        self.write(plain::as_bytes(values))
    }

    /// Reposition the file offset; returns the new absolute offset.
    pub fn seek(&self, pos: SeekFrom) -> Result<u64> {
        let (offset, whence) = match pos {
            SeekFrom::Start(n) => (n as libc::off_t, libc::SEEK_SET),
            SeekFrom::Current(n) => (n as libc::off_t, libc::SEEK_CUR),
            SeekFrom::End(n) => (n as libc::off_t, libc::SEEK_END),
        };
        let fd = self.raw();
        let at = self
            .syscall(|| unsafe { libc::lseek(fd, offset, whence) })
            .map_err(|errno| Error::Seek {
                identity: self.identity(),
                errno,
            })?;
        Ok(at as u64)
    }

    pub fn truncate(&self, length: u64) -> Result<()> {
        Errno::result(unsafe { libc::ftruncate(self.raw(), length as libc::off_t) })
            .map(drop)
            .map_err(|errno| self.io_error("ftruncate", errno))
    }

    pub fn sync(&self) -> Result<()> {
        Errno::result(unsafe { libc::fsync(self.raw()) })
            .map(drop)
            .map_err(|errno| self.io_error("fsync", errno))
    }

    pub fn data_sync(&self) -> Result<()> {
        #[cfg(any(target_os = "macos", target_os = "ios"))]
        let r = unsafe { libc::fsync(self.raw()) };
        #[cfg(not(any(target_os = "macos", target_os = "ios")))]
        let r = unsafe { libc::fdatasync(self.raw()) };

        Errno::result(r)
            .map(drop)
            .map_err(|errno| self.io_error("fdatasync", errno))
    }

    /// Release the descriptor. Closing an already closed handle does nothing and
    /// never reaches the kernel; a failing `close(2)` is not reported.
    pub fn close(&mut self) {
        if let Some(fd) = self.fd.take() {
            debug!(fd = fd.as_raw_fd(), identity = %self.path, "Closing handle");
            drop(fd);
        }
    }

    /// Remove the file named by the handle's path. A path that is already gone
    /// counts as success; a directory is reported by the kernel (`EISDIR`/`EPERM`).
    pub fn unlink(&self) -> Result<()> {
        self.remove_entry("unlink", |p| unsafe { libc::unlink(p) })
    }

    /// Remove the file or empty directory named by the handle's path. A path
    /// that is already gone counts as success.
    pub fn remove(&self) -> Result<()> {
        self.remove_entry("remove", |p| unsafe { libc::remove(p) })
    }

    fn remove_entry(
        &self,
        op: &'static str,
        call: impl FnOnce(*const libc::c_char) -> libc::c_int,
    ) -> Result<()> {
        if !self.path_backed {
            return Err(Error::NotSupported {
                op,
                identity: self.identity(),
            });
        }
        let c_path = c_string(&self.path).map_err(|errno| self.io_error(op, errno))?;
        match Errno::result(call(c_path.as_ptr())) {
            Ok(_) | Err(Errno::ENOENT) => Ok(()),
            Err(errno) => Err(self.io_error(op, errno)),
        }
    }

    /// Metadata snapshot.
    ///
    /// Served from the cache unless there is none yet or `force` is set. A failed
    /// query clears the cache before the error is returned.
    pub fn stat(&mut self, force: bool) -> Result<Metadata> {
        if let (false, Some(snapshot)) = (force, self.snapshot) {
            return Ok(snapshot);
        }
        let refreshed = Metadata::from_fd(self.raw());
        self.snapshot = refreshed.ok();
        refreshed.map_err(|errno| Error::Stat {
            identity: self.identity(),
            errno,
        })
    }

    /// Cached snapshot, if one has been taken.
    pub fn cached_stat(&self) -> Option<&Metadata> {
        self.snapshot.as_ref()
    }

    /// Whether the path resolves right now. Never consults the cache and is
    /// independent of the descriptor; adopted handles have no path and answer `false`.
    pub fn exists(&self) -> bool {
        if !self.path_backed || self.path.is_empty() {
            return false;
        }
        c_string(&self.path)
            .map(|p| Metadata::from_path(&p).is_ok())
            .unwrap_or(false)
    }

    pub fn size(&mut self, use_cached: bool) -> Result<u64> {
        Ok(self.stat(!use_cached)?.size)
    }

    /// Whether the descriptor is currently open in the kernel.
    pub fn descriptor_valid(&self) -> bool {
        self.fd.is_some() && unsafe { libc::fcntl(self.raw(), libc::F_GETFL) } != -1
    }

    /// New handle for the same open file description (`dup(2)`).
    ///
    /// Offset and advisory locks are shared with `self`. The metadata snapshot is
    /// not carried over; the duplicate queries on first use.
    pub fn duplicate(&self) -> Result<Handle> {
        let raw = Errno::result(unsafe { libc::dup(self.raw()) })
            .map_err(|errno| self.io_error("dup", errno))?;
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };
        debug!(from = self.raw(), to = raw, identity = %self.identity(), "Duplicated handle");

        let mut dup = Self::from_parts(fd, self.path.clone(), self.path_backed);
        dup.retry_interrupted = self.retry_interrupted;
        Ok(dup)
    }

    /// Move ownership out, leaving `self` as the empty handle.
    pub fn transfer(&mut self) -> Handle {
        std::mem::take(self)
    }

    /// Whether a fresh `fstat` reports the same inode number for both handles.
    /// The cache is not consulted; a failed `fstat` on either side means `false`.
    pub fn same_inode(&self, other: &Handle) -> bool {
        match (Metadata::from_fd(self.raw()), Metadata::from_fd(other.raw())) {
            (Ok(a), Ok(b)) => a.ino == b.ino,
            _ => false,
        }
    }

    /// Give up ownership of the descriptor without closing it.
    pub fn into_owned_fd(mut self) -> Option<OwnedFd> {
        self.fd.take()
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Handles are equal when they name the same inode; see [`Handle::same_inode`].
impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.same_inode(other)
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.identity())
    }
}

impl io::Read for Handle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Handle::read(self, buf).map_err(io::Error::from)
    }
}

impl io::Write for Handle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Handle::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Seek for Handle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Handle::seek(self, pos).map_err(io::Error::from)
    }
}

fn c_string(path: &str) -> std::result::Result<CString, Errno> {
    CString::new(path).map_err(|_| Errno::EINVAL)
}

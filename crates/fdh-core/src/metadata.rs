// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Metadata snapshots and file-type classification

use std::ffi::CStr;
use std::mem::MaybeUninit;
use std::os::fd::RawFd;

use nix::errno::Errno;
use nix::sys::stat::SFlag;
use serde::Serialize;

use crate::error::Result;
use crate::handle::Handle;

/// POSIX file type, decoded from the `S_IFMT` bits of `st_mode`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileType {
    Directory,
    Regular,
    CharDevice,
    BlockDevice,
    Fifo,
    Socket,
    Symlink,
    Unknown,
}

const KINDS: [(SFlag, FileType); 7] = [
    (SFlag::S_IFDIR, FileType::Directory),
    (SFlag::S_IFREG, FileType::Regular),
    (SFlag::S_IFCHR, FileType::CharDevice),
    (SFlag::S_IFBLK, FileType::BlockDevice),
    (SFlag::S_IFIFO, FileType::Fifo),
    (SFlag::S_IFSOCK, FileType::Socket),
    (SFlag::S_IFLNK, FileType::Symlink),
];

impl FileType {
    pub fn from_mode(mode: u32) -> Self {
        let kind = SFlag::from_bits_truncate(mode as libc::mode_t) & SFlag::S_IFMT;
        KINDS
            .iter()
            .find(|(flag, _)| *flag == kind)
            .map_or(FileType::Unknown, |(_, file_type)| *file_type)
    }

    /// Short name, as used in serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Directory => "directory",
            FileType::Regular => "regular",
            FileType::CharDevice => "char-device",
            FileType::BlockDevice => "block-device",
            FileType::Fifo => "fifo",
            FileType::Socket => "socket",
            FileType::Symlink => "symlink",
            FileType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FileType::Directory => "directory",
            FileType::Regular => "regular file",
            FileType::CharDevice => "character device",
            FileType::BlockDevice => "block device",
            FileType::Fifo => "fifo",
            FileType::Socket => "socket",
            FileType::Symlink => "symbolic link",
            FileType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Point-in-time copy of kernel-reported file status.
///
/// Snapshots are plain values: a refresh replaces the whole snapshot, fields are
/// never updated individually.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub file_type: FileType,
    pub dev: u64,
    pub ino: u64,
    pub size: u64,
    /// Permission bits (`st_mode` without the type bits).
    pub mode: u32,
    pub nlink: u64,
    pub uid: u32,
    pub gid: u32,
    pub mtime_sec: i64,
    pub mtime_nsec: i64,
}

impl Metadata {
    /// `fstat` on an open descriptor.
    pub fn from_fd(fd: RawFd) -> std::result::Result<Self, Errno> {
        let mut st = MaybeUninit::<libc::stat>::uninit();
        Errno::result(unsafe { libc::fstat(fd, st.as_mut_ptr()) })?;
        Ok(Self::from(unsafe { st.assume_init() }))
    }

    /// `stat` on a path, following symlinks.
    pub fn from_path(path: &CStr) -> std::result::Result<Self, Errno> {
        let mut st = MaybeUninit::<libc::stat>::uninit();
        Errno::result(unsafe { libc::stat(path.as_ptr(), st.as_mut_ptr()) })?;
        Ok(Self::from(unsafe { st.assume_init() }))
    }

    /// `lstat` on a path; a symlink reports itself rather than its target.
    pub fn from_path_nofollow(path: &CStr) -> std::result::Result<Self, Errno> {
        let mut st = MaybeUninit::<libc::stat>::uninit();
        Errno::result(unsafe { libc::lstat(path.as_ptr(), st.as_mut_ptr()) })?;
        Ok(Self::from(unsafe { st.assume_init() }))
    }

    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.file_type == FileType::Regular
    }
}

impl From<libc::stat> for Metadata {
    #[allow(clippy::unnecessary_cast)]
    fn from(st: libc::stat) -> Self {
        let raw_mode = st.st_mode as u32;
        Self {
            file_type: FileType::from_mode(raw_mode),
            dev: st.st_dev as u64,
            ino: st.st_ino as u64,
            size: st.st_size as u64,
            mode: raw_mode & 0o7777,
            nlink: st.st_nlink as u64,
            uid: st.st_uid,
            gid: st.st_gid,
            mtime_sec: st.st_mtime as i64,
            mtime_nsec: st.st_mtime_nsec as i64,
        }
    }
}

/// Type predicates, answered from the cached snapshot.
///
/// The first call populates the snapshot if the handle has none; later calls
/// never refresh it. Use [`Handle::stat`] with `force` to re-query.
impl Handle {
    pub fn file_type(&mut self) -> Result<FileType> {
        Ok(self.stat(false)?.file_type)
    }

    pub fn is_directory(&mut self) -> Result<bool> {
        Ok(self.file_type()? == FileType::Directory)
    }

    pub fn is_regular_file(&mut self) -> Result<bool> {
        Ok(self.file_type()? == FileType::Regular)
    }

    pub fn is_char_device(&mut self) -> Result<bool> {
        Ok(self.file_type()? == FileType::CharDevice)
    }

    pub fn is_block_device(&mut self) -> Result<bool> {
        Ok(self.file_type()? == FileType::BlockDevice)
    }

    pub fn is_fifo(&mut self) -> Result<bool> {
        Ok(self.file_type()? == FileType::Fifo)
    }

    pub fn is_socket(&mut self) -> Result<bool> {
        Ok(self.file_type()? == FileType::Socket)
    }

    /// Whether the handle's path currently names a symbolic link.
    ///
    /// An open descriptor has already been resolved through any link, so only
    /// path-backed handles can answer `true`. Failures (including a vanished
    /// path) read as `false`.
    pub fn is_symlink(&self) -> bool {
        if !self.is_path_backed() {
            return false;
        }
        let Ok(path) = std::ffi::CString::new(self.path()) else {
            return false;
        };
        Metadata::from_path_nofollow(&path)
            .map(|meta| meta.file_type == FileType::Symlink)
            .unwrap_or(false)
    }
}

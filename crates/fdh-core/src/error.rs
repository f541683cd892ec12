// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for descriptor handles
//!
//! Every variant backed by a failed syscall carries the `Errno` reported by the
//! kernel together with the identity of the handle involved (its path when one is
//! known, otherwise `fd:N`). The rendered message follows the
//! `POSIX error [errno=<n>,<description>] <op> (<identity>)` layout.

use std::io;
use std::os::fd::RawFd;

use nix::errno::Errno;

/// Render a failed operation together with its OS error code.
pub fn report(errno: &Errno, op: &str, identity: &str) -> String {
    format!(
        "POSIX error [errno={},{}] {} ({})",
        *errno as i32,
        errno.desc(),
        op,
        identity
    )
}

/// Handle error type
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{}", report(.errno, "open", .identity))]
    Open { identity: String, errno: Errno },

    #[error("{}", report(.errno, .op, .identity))]
    Io {
        op: &'static str,
        identity: String,
        errno: Errno,
    },

    #[error("{}", report(.errno, "lseek", .identity))]
    Seek { identity: String, errno: Errno },

    #[error("{}", report(.errno, "stat", .identity))]
    Stat { identity: String, errno: Errno },

    #[error("{}", report(.errno, "mmap", .identity))]
    Map { identity: String, errno: Errno },

    #[error("invalid descriptor (fd:{fd})")]
    InvalidDescriptor { fd: RawFd },

    #[error("{op} is not supported ({identity})")]
    NotSupported { op: &'static str, identity: String },

    /// Name resolution failure; `status` is the resolver's own code, not an errno.
    #[error("address resolution failed [status={status},{message}] ({host})")]
    Resolve {
        host: String,
        status: i32,
        message: String,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// OS error code carried by this failure, if it came from a syscall.
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Error::Open { errno, .. }
            | Error::Io { errno, .. }
            | Error::Seek { errno, .. }
            | Error::Stat { errno, .. }
            | Error::Map { errno, .. } => Some(*errno),
            Error::InvalidDescriptor { .. } => Some(Errno::EBADF),
            Error::NotSupported { .. } | Error::Resolve { .. } | Error::Config(_) => None,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err.errno() {
            Some(errno) => io::Error::from_raw_os_error(errno as i32),
            None => io::Error::other(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

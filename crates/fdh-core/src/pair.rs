// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Descriptor pairs created by a single kernel call
//!
//! Both ends are obtained together or not at all. The pair types are move-only;
//! duplicating one end is done explicitly through [`Handle::duplicate`].

use std::os::fd::{FromRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::sys::socket::{AddressFamily, SockType};
use tracing::debug;

use crate::error::{Error, Result};
use crate::handle::Handle;

/// Both ends of a `pipe(2)`.
#[derive(Debug)]
pub struct Pipe {
    reader: Handle,
    writer: Handle,
}

impl Pipe {
    pub fn new() -> Result<Self> {
        let mut fds: [RawFd; 2] = [-1; 2];
        Errno::result(unsafe { libc::pipe(fds.as_mut_ptr()) }).map_err(|errno| Error::Io {
            op: "pipe",
            identity: "pipe".to_string(),
            errno,
        })?;
        debug!(reader = fds[0], writer = fds[1], "Created pipe");

        // SAFETY: `pipe` returned two fresh descriptors owned by nobody else.
        let [r, w] = fds.map(|fd| unsafe { OwnedFd::from_raw_fd(fd) });
        Ok(Self {
            reader: Handle::adopt(r, "pipe:r"),
            writer: Handle::adopt(w, "pipe:w"),
        })
    }

    /// Bundle two existing handles as a pipe.
    pub fn from_handles(reader: Handle, writer: Handle) -> Self {
        Self { reader, writer }
    }

    /// Read end of the pipe.
    pub fn reader(&mut self) -> &mut Handle {
        &mut self.reader
    }

    /// Write end of the pipe.
    pub fn writer(&mut self) -> &mut Handle {
        &mut self.writer
    }

    pub fn into_parts(self) -> (Handle, Handle) {
        (self.reader, self.writer)
    }
}

/// Both ends of a `socketpair(2)`. Either end may be read from or written to;
/// `reader`/`writer` only name them.
#[derive(Debug)]
pub struct SocketPair {
    reader: Handle,
    writer: Handle,
}

impl SocketPair {
    pub fn new(family: AddressFamily, socket_type: SockType) -> Result<Self> {
        Self::with_protocol(family, socket_type, 0)
    }

    pub fn with_protocol(
        family: AddressFamily,
        socket_type: SockType,
        protocol: libc::c_int,
    ) -> Result<Self> {
        let mut fds: [RawFd; 2] = [-1; 2];
        let r = unsafe {
            libc::socketpair(
                family as libc::c_int,
                socket_type as libc::c_int,
                protocol,
                fds.as_mut_ptr(),
            )
        };
        Errno::result(r).map_err(|errno| Error::Io {
            op: "socketpair",
            identity: "socketpair".to_string(),
            errno,
        })?;
        debug!(first = fds[0], second = fds[1], ?family, ?socket_type, "Created socket pair");

        let [a, b] = fds.map(|fd| unsafe { OwnedFd::from_raw_fd(fd) });
        Ok(Self {
            reader: Handle::adopt(a, "socketpair:0"),
            writer: Handle::adopt(b, "socketpair:1"),
        })
    }

    pub fn reader(&mut self) -> &mut Handle {
        &mut self.reader
    }

    pub fn writer(&mut self) -> &mut Handle {
        &mut self.writer
    }

    pub fn into_parts(self) -> (Handle, Handle) {
        (self.reader, self.writer)
    }
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Owned POSIX descriptor handles
//!
//! [`Handle`] is the single owner of one descriptor, whatever produced it: a
//! path opened with flags, a pipe or socket-pair end, a socket, or a descriptor
//! adopted from elsewhere. On top of the handle this crate provides:
//!
//! - lexical path normalization ([`path::normalize`]),
//! - a cached metadata snapshot with file-type predicates ([`Metadata`]),
//! - parent-directory and mount-point resolution,
//! - [`Pipe`] and [`SocketPair`] bundles,
//! - reference-counted memory mappings ([`MemoryMap`]),
//! - a thin socket and name-resolution layer ([`Socket`], [`resolve`]).
//!
//! Every operation is a direct, blocking syscall. Nothing is buffered and
//! nothing is retried unless [`HandleConfig::retry_interrupted`] asks for it.

pub mod config;
pub mod error;
pub mod handle;
pub mod hierarchy;
pub mod metadata;
pub mod mmap;
pub mod pair;
pub mod path;
pub mod plain;
pub mod socket;

pub use config::HandleConfig;
pub use error::{Error, Result};
pub use handle::{AccessMode, Handle, DEFAULT_LABEL};
pub use metadata::{FileType, Metadata};
pub use mmap::{MemoryMap, Protection, Sharing};
pub use pair::{Pipe, SocketPair};
pub use plain::Plain;
pub use socket::{resolve, ResolvedAddress, Socket};

// Flag and error types used throughout the public API
pub use nix::errno::Errno;
pub use nix::fcntl::OFlag;
pub use nix::sys::socket::{AddressFamily, MsgFlags, SockType};
pub use nix::sys::stat::Mode;

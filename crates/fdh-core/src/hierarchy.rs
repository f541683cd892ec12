// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Parent directories and mount points

use nix::fcntl::OFlag;
use nix::sys::stat::Mode;

use crate::config::HandleConfig;
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::path::{normalize, parent_of};

impl Handle {
    /// Open the directory containing this handle's path.
    ///
    /// `.` is resolved through the current working directory first; the root is
    /// its own parent. Adopted handles have no path to derive a parent from.
    pub fn parent(&self) -> Result<Handle> {
        if !self.is_path_backed() {
            return Err(Error::NotSupported {
                op: "parent",
                identity: self.identity(),
            });
        }

        let parent = match parent_of(self.path()) {
            Some(parent) => parent,
            None if self.path() == "." => {
                let cwd = nix::unistd::getcwd().map_err(|errno| self.io_error("getcwd", errno))?;
                parent_of(&normalize(&cwd.to_string_lossy())).unwrap_or_else(|| "/".to_string())
            }
            None => {
                return Err(Error::NotSupported {
                    op: "parent",
                    identity: self.identity(),
                })
            }
        };

        let config = HandleConfig {
            retry_interrupted: self.retry_interrupted,
            ..HandleConfig::default()
        };
        Handle::open_with(
            &parent,
            OFlag::O_RDONLY | OFlag::O_DIRECTORY,
            Mode::empty(),
            &config,
        )
    }

    /// A directory is a mount point when it is the root, or when its device id
    /// differs from its parent's. The root is the directory that is its own
    /// parent, however its path is spelled.
    pub fn is_mount_point(&mut self) -> Result<bool> {
        if !self.is_directory()? {
            return Ok(false);
        }
        let meta = self.stat(false)?;
        let mut parent = self.parent()?;
        let parent_meta = parent.stat(false)?;
        if parent_meta.dev == meta.dev && parent_meta.ino == meta.ino {
            return Ok(true);
        }
        Ok(parent_meta.dev != meta.dev)
    }
}

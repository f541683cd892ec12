// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! File-type predicates, symlinks, parents and mount points.

use std::path::Path;

use anyhow::Result;
use fdh_core::{AddressFamily, Error, FileType, Handle, OFlag, Pipe, SockType, SocketPair};
use serial_test::serial;
use tempfile::TempDir;

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp paths are UTF-8")
}

/// Number of type predicates answering `true`.
fn matching_predicates(handle: &mut Handle) -> Result<usize> {
    let answers = [
        handle.is_directory()?,
        handle.is_regular_file()?,
        handle.is_char_device()?,
        handle.is_block_device()?,
        handle.is_fifo()?,
        handle.is_socket()?,
    ];
    Ok(answers.iter().filter(|&&yes| yes).count())
}

#[test]
fn test_type_predicates_are_mutually_exclusive() -> Result<()> {
    let dir = TempDir::new()?;
    let file = dir.path().join("plain.txt");
    std::fs::write(&file, b"contents")?;

    let mut regular = Handle::open(path_str(&file), OFlag::O_RDONLY)?;
    assert!(regular.is_regular_file()?);
    assert_eq!(regular.file_type()?, FileType::Regular);
    assert_eq!(matching_predicates(&mut regular)?, 1);

    let mut directory = Handle::open(path_str(dir.path()), OFlag::O_RDONLY | OFlag::O_DIRECTORY)?;
    assert!(directory.is_directory()?);
    assert_eq!(matching_predicates(&mut directory)?, 1);

    let mut null = Handle::open("/dev/null", OFlag::O_RDONLY)?;
    assert!(null.is_char_device()?);
    assert_eq!(matching_predicates(&mut null)?, 1);

    let mut pipe = Pipe::new()?;
    assert!(pipe.reader().is_fifo()?);
    assert!(pipe.writer().is_fifo()?);
    assert_eq!(matching_predicates(pipe.reader())?, 1);

    let mut pair = SocketPair::new(AddressFamily::Unix, SockType::Stream)?;
    assert!(pair.reader().is_socket()?);
    assert_eq!(matching_predicates(pair.writer())?, 1);
    Ok(())
}

#[test]
fn test_predicates_use_the_snapshot() -> Result<()> {
    let dir = TempDir::new()?;
    let file = dir.path().join("plain.txt");
    std::fs::write(&file, b"contents")?;

    let mut handle = Handle::open(path_str(&file), OFlag::O_RDONLY)?;
    assert!(handle.cached_stat().is_none());
    assert!(handle.is_regular_file()?);
    assert!(handle.cached_stat().is_some(), "first predicate populates the cache");

    // A closed handle still answers from the snapshot it already holds.
    handle.close();
    assert!(handle.is_regular_file()?);
    Ok(())
}

#[test]
fn test_predicate_without_descriptor_fails() {
    let mut handle = Handle::default();
    assert!(matches!(handle.is_directory(), Err(Error::Stat { .. })));
}

#[test]
fn test_symlink_is_detected_through_the_path() -> Result<()> {
    let dir = TempDir::new()?;
    let target = dir.path().join("target.txt");
    let link = dir.path().join("link.txt");
    std::fs::write(&target, b"contents")?;
    std::os::unix::fs::symlink(&target, &link)?;

    let mut through_link = Handle::open(path_str(&link), OFlag::O_RDONLY)?;
    assert!(through_link.is_symlink());
    assert!(through_link.is_regular_file()?, "the descriptor names the target");

    let direct = Handle::open(path_str(&target), OFlag::O_RDONLY)?;
    assert!(!direct.is_symlink());

    std::fs::remove_file(&link)?;
    assert!(!through_link.is_symlink(), "a vanished path is not a link");
    Ok(())
}

#[test]
fn test_adopted_handle_is_never_a_symlink() -> Result<()> {
    let pipe = Pipe::new()?;
    let (reader, _writer) = pipe.into_parts();
    assert!(!reader.is_symlink());
    Ok(())
}

#[test]
fn test_root_is_a_mount_point() -> Result<()> {
    let mut root = Handle::open("/", OFlag::O_RDONLY | OFlag::O_DIRECTORY)?;
    assert!(root.is_mount_point()?);
    Ok(())
}

#[test]
fn test_root_spelled_with_dot_components_is_a_mount_point() -> Result<()> {
    for spelling in ["/.", "/..", "/./."] {
        let mut root = Handle::open(spelling, OFlag::O_RDONLY | OFlag::O_DIRECTORY)?;
        assert!(root.is_mount_point()?, "{spelling}");
    }
    Ok(())
}

#[cfg(target_os = "linux")]
#[test]
fn test_proc_is_a_mount_point() -> Result<()> {
    if !Path::new("/proc/self").exists() {
        return Ok(());
    }
    let mut proc = Handle::open("/proc", OFlag::O_RDONLY | OFlag::O_DIRECTORY)?;
    assert!(proc.is_mount_point()?);
    Ok(())
}

#[test]
fn test_files_and_plain_directories_are_not_mount_points() -> Result<()> {
    let dir = TempDir::new()?;
    let sub = dir.path().join("sub");
    std::fs::create_dir(&sub)?;
    let file = dir.path().join("plain.txt");
    std::fs::write(&file, b"contents")?;

    let mut file_handle = Handle::open(path_str(&file), OFlag::O_RDONLY)?;
    assert!(!file_handle.is_mount_point()?);

    let mut sub_handle = Handle::open(path_str(&sub), OFlag::O_RDONLY | OFlag::O_DIRECTORY)?;
    assert!(!sub_handle.is_mount_point()?);
    Ok(())
}

#[test]
fn test_parent_opens_the_containing_directory() -> Result<()> {
    let dir = TempDir::new()?;
    let file = dir.path().join("plain.txt");
    std::fs::write(&file, b"contents")?;

    let handle = Handle::open(path_str(&file), OFlag::O_RDONLY)?;
    let mut parent = handle.parent()?;
    assert!(parent.is_directory()?);

    let expected = Handle::open(path_str(dir.path()), OFlag::O_RDONLY | OFlag::O_DIRECTORY)?;
    assert_eq!(parent, expected);
    assert_eq!(parent.path(), fdh_core::path::normalize(path_str(dir.path())));
    Ok(())
}

#[test]
fn test_root_is_its_own_parent() -> Result<()> {
    let root = Handle::open("/", OFlag::O_RDONLY | OFlag::O_DIRECTORY)?;
    let parent = root.parent()?;
    assert_eq!(parent.path(), "/");
    assert_eq!(parent, root);
    Ok(())
}

#[test]
#[serial]
fn test_parent_of_current_directory() -> Result<()> {
    let dir = TempDir::new()?;
    let sub = dir.path().join("sub");
    std::fs::create_dir(&sub)?;

    let previous = std::env::current_dir()?;
    std::env::set_current_dir(&sub)?;
    let outcome = (|| -> Result<bool> {
        let here = Handle::open(".", OFlag::O_RDONLY | OFlag::O_DIRECTORY)?;
        let parent = here.parent()?;
        let expected = Handle::open(path_str(dir.path()), OFlag::O_RDONLY | OFlag::O_DIRECTORY)?;
        Ok(parent == expected)
    })();
    std::env::set_current_dir(previous)?;

    assert!(outcome?, "parent of . is the directory above the cwd");
    Ok(())
}

#[test]
fn test_parent_requires_a_path() -> Result<()> {
    let mut pair = SocketPair::new(AddressFamily::Unix, SockType::Stream)?;
    let err = pair.reader().parent().unwrap_err();
    assert!(matches!(err, Error::NotSupported { op: "parent", .. }));
    assert!(err.to_string().contains("socketpair:0"), "{err}");
    Ok(())
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::path::Path;

use anyhow::Result;
use fdh_core::mmap::page_size;
use fdh_core::{Errno, Error, Handle, MemoryMap, OFlag, Protection, Sharing};
use tempfile::TempDir;

const REGION: usize = 0x10000;

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp paths are UTF-8")
}

#[test]
fn test_dev_zero_mapping_sizes() -> Result<()> {
    let zero = Handle::open("/dev/zero", OFlag::O_RDWR)?;

    let bytes = MemoryMap::<u8>::create(&zero, REGION, 0, Sharing::Private, Protection::ReadWrite)?;
    assert_eq!(bytes.size_bytes(), REGION);
    assert_eq!(bytes.len(), REGION);
    assert_eq!(bytes.page_count(), REGION.div_ceil(page_size()));

    let words = MemoryMap::<u32>::create(&zero, REGION, 0, Sharing::Private, Protection::Read)?;
    assert_eq!(words.size_bytes(), REGION);
    assert_eq!(words.len(), REGION / 4);
    assert!(unsafe { words.as_slice() }.iter().all(|&w| w == 0));
    Ok(())
}

#[test]
fn test_partial_page_counts_as_a_page() -> Result<()> {
    let odd = page_size() + 1;
    let map = MemoryMap::<u8>::anonymous(odd, Protection::ReadWrite)?;
    assert_eq!(map.page_count(), 2);

    // Three bytes do not hold a whole u32.
    let tiny = MemoryMap::<u32>::anonymous(3, Protection::Read)?;
    assert_eq!(tiny.len(), 0);
    assert!(tiny.is_empty());
    assert_eq!(tiny.page_count(), 1);
    Ok(())
}

#[test]
fn test_writes_through_mapping_are_visible() -> Result<()> {
    let map = MemoryMap::<u8>::anonymous(REGION, Protection::ReadWrite)?;
    let text = b"Hello World";
    unsafe { map.as_mut_slice()[..text.len()].copy_from_slice(text) };

    let view = map.clone();
    assert_eq!(view.share_count(), 2);
    assert_eq!(unsafe { &view.as_slice()[..text.len()] }, text);

    drop(map);
    assert_eq!(view.share_count(), 1);
    assert_eq!(unsafe { &view.as_slice()[..text.len()] }, text);
    Ok(())
}

#[test]
fn test_mapping_outlives_the_handle() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("bytes.dat");
    let bytes: Vec<u8> = (0..=255u8).collect();
    std::fs::write(&path, &bytes)?;

    let mut handle = Handle::open(path_str(&path), OFlag::O_RDONLY)?;
    let map = MemoryMap::<u8>::create(&handle, bytes.len(), 0, Sharing::Private, Protection::Read)?;
    handle.close();

    assert_eq!(unsafe { map.as_slice() }, bytes.as_slice());
    Ok(())
}

#[test]
fn test_shared_file_mapping_writes_reach_the_file() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("shared.dat");
    std::fs::write(&path, vec![0u8; 4096])?;

    let handle = Handle::open(path_str(&path), OFlag::O_RDWR)?;
    let map = MemoryMap::<u32>::create(&handle, 4096, 0, Sharing::Shared, Protection::ReadWrite)?;
    unsafe { map.as_mut_slice()[1] = 0xDEADBEEF };
    drop(map);

    let mut words = [0u32; 2];
    handle.read_values(&mut words)?;
    assert_eq!(words, [0, 0xDEADBEEF]);
    Ok(())
}

#[test]
fn test_writable_shared_mapping_of_read_only_file_fails() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("ro.dat");
    std::fs::write(&path, vec![1u8; 4096])?;

    let handle = Handle::open(path_str(&path), OFlag::O_RDONLY)?;
    let err = MemoryMap::<u8>::create(&handle, 4096, 0, Sharing::Shared, Protection::ReadWrite)
        .unwrap_err();
    assert!(matches!(err, Error::Map { errno: Errno::EACCES, .. }));
    assert!(err.to_string().contains("ro.dat"), "{err}");
    Ok(())
}

#[test]
fn test_mapping_a_closed_handle_fails() {
    let handle = Handle::default();
    let err = MemoryMap::<u8>::create(&handle, 4096, 0, Sharing::Shared, Protection::Read)
        .unwrap_err();
    assert!(matches!(err, Error::Map { errno: Errno::EBADF, .. }));
}

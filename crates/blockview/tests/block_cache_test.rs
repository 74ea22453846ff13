//! Block cache behaviour against real files.
//!
//! Every cached read is compared with the file's actual contents, whatever
//! the arena size and access order.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use blockview::{BlockCache, BlockCacheConfig, BlockViewError, StalenessCheck, WholeFile};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

const BLOCK: usize = 256;

fn create_file(content: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temporary file");
    file.write_all(content)
        .expect("Failed to write temporary file");
    file.flush().expect("Failed to flush temporary file");
    file
}

fn config(max_blocks: usize) -> BlockCacheConfig {
    BlockCacheConfig::new()
        .with_block_size(BLOCK)
        .with_max_blocks(max_blocks)
}

/// Overwrite a file and move its modification time forward
fn rewrite(path: &Path, content: &[u8]) {
    let before = std::fs::metadata(path).unwrap().modified().unwrap();
    std::fs::write(path, content).unwrap();
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(before + Duration::from_secs(10))
        .unwrap();
}

/// Two and a half blocks: block 0 holds 'A'.., block 1 'E'.., tail 'I'..
fn two_and_a_half_blocks() -> Vec<u8> {
    let mut data = Vec::new();
    data.extend(std::iter::repeat_n(b'A', BLOCK));
    data.extend(std::iter::repeat_n(b'E', BLOCK));
    data.extend(std::iter::repeat_n(b'I', BLOCK / 2));
    data
}

#[test]
fn test_walkthrough_of_loads_and_evictions() {
    let file = create_file(&two_and_a_half_blocks());
    let mut cache = BlockCache::open(file.path(), config(2)).expect("open");

    assert_eq!(cache.block_count(), 3);
    assert_eq!(cache.last_block_size(), BLOCK / 2);

    assert_eq!(cache.byte_at(0).unwrap(), b'A');
    assert_eq!(cache.loaded_blocks(), vec![0]);

    assert_eq!(cache.byte_at(BLOCK as u64).unwrap(), b'E');
    assert_eq!(cache.loaded_blocks(), vec![0, 1]);

    // Arena full: the oldest load goes
    assert_eq!(cache.byte_at(2 * BLOCK as u64).unwrap(), b'I');
    assert_eq!(cache.loaded_blocks(), vec![1, 2]);

    // Block 0 comes back and evicts block 1
    assert_eq!(cache.byte_at(0).unwrap(), b'A');
    assert_eq!(cache.loaded_blocks(), vec![2, 0]);

    let stats = cache.stats();
    assert_eq!(stats.block_loads, 4);
    assert_eq!(stats.evictions, 2);
}

#[test]
fn test_reaccess_does_not_protect_oldest_block() {
    let file = create_file(&vec![7u8; 5 * BLOCK]);
    let mut cache = BlockCache::open(file.path(), config(3)).expect("open");

    for block in 0..3u64 {
        cache.preload(block).unwrap();
    }
    cache.byte_at(5).unwrap();
    cache.byte_at(3 * BLOCK as u64).unwrap();

    assert!(!cache.is_block_loaded(0));
    assert_eq!(cache.loaded_blocks(), vec![1, 2, 3]);
}

#[test]
fn test_growing_file_is_picked_up() {
    let file = create_file(b"short");
    let mut cache = BlockCache::open(file.path(), config(2)).expect("open");
    assert!(cache.byte_at(600).unwrap_err().is_range_error());

    let mut grown = vec![b'-'; 700];
    grown[600] = b'!';
    rewrite(file.path(), &grown);

    assert_eq!(cache.byte_at(600).unwrap(), b'!');
    assert_eq!(cache.size(), 700);
    assert_eq!(cache.block_count(), 3);
}

#[test]
fn test_replaced_file_is_reopened() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("data.bin");
    std::fs::write(&path, vec![b'o'; 300]).unwrap();
    let mut cache = BlockCache::open(&path, config(1)).expect("open");
    assert_eq!(cache.byte_at(299).unwrap(), b'o');

    // Write a sibling and rename it over the original (new inode)
    let replacement = dir.path().join("data.new");
    std::fs::write(&replacement, vec![b'n'; 400]).unwrap();
    let before = cache.last_modified().unwrap();
    File::options()
        .write(true)
        .open(&replacement)
        .unwrap()
        .set_modified(before + Duration::from_secs(10))
        .unwrap();
    std::fs::rename(&replacement, &path).unwrap();

    assert_eq!(cache.byte_at(399).unwrap(), b'n');
    assert_eq!(cache.byte_at(0).unwrap(), b'n');
}

#[test]
fn test_manual_policy_reads_stale_blocks_until_checked() {
    let file = create_file(&vec![b'1'; BLOCK]);
    let mut cache = BlockCache::open(
        file.path(),
        config(1).with_staleness(StalenessCheck::Manual),
    )
    .expect("open");
    assert_eq!(cache.byte_at(0).unwrap(), b'1');
    let checks = cache.stats().file_checks;

    rewrite(file.path(), &vec![b'2'; BLOCK]);
    assert_eq!(cache.byte_at(0).unwrap(), b'1');
    assert_eq!(cache.stats().file_checks, checks);

    cache.file_check().unwrap();
    assert_eq!(cache.byte_at(0).unwrap(), b'2');
}

#[test]
fn test_generation_tracks_purges() {
    let file = create_file(b"abc");
    let mut cache = BlockCache::open(file.path(), config(1)).expect("open");
    let start = cache.generation();

    cache.byte_at(0).unwrap();
    assert_eq!(cache.generation(), start);

    cache.reset().unwrap();
    assert_eq!(cache.generation(), start + 1);

    rewrite(file.path(), b"abcd");
    cache.byte_at(3).unwrap();
    assert_eq!(cache.generation(), start + 2);
}

#[test]
fn test_open_errors() {
    let dir = tempfile::tempdir().expect("tempdir");

    let err = BlockCache::open(dir.path().join("nope"), config(1)).unwrap_err();
    assert!(matches!(err, BlockViewError::File { .. }));

    let err = BlockCache::open(dir.path(), config(1)).unwrap_err();
    assert!(matches!(err, BlockViewError::NotRegularFile(_)));

    let file = create_file(b"x");
    let err = BlockCache::open(file.path(), config(1).with_block_size(65536)).unwrap_err();
    assert!(matches!(err, BlockViewError::InvalidConfiguration(_)));
}

#[test]
fn test_read_all_agrees_with_whole_file() {
    let content: Vec<u8> = (0..3000u32).map(|i| (i * 31 % 251) as u8).collect();
    let file = create_file(&content);
    let cache = BlockCache::open(file.path(), config(2)).expect("open");
    let whole = WholeFile::open(file.path()).expect("whole");

    assert_eq!(cache.read_all().unwrap(), whole.as_bytes());
    assert_eq!(cache.resident_count(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Cached bytes match the file for any access order and arena size
    #[test]
    fn cached_bytes_match_file(
        content in prop::collection::vec(any::<u8>(), 1..2048),
        max_blocks in 1usize..5,
        picks in prop::collection::vec(any::<prop::sample::Index>(), 1..200),
    ) {
        let file = create_file(&content);
        let mut cache = BlockCache::open(file.path(), config(max_blocks))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        for pick in picks {
            let pos = pick.index(content.len());
            let byte = cache.byte_at(pos as u64).map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(byte, content[pos]);
            prop_assert!(cache.resident_count() <= max_blocks);
        }
    }

    /// Block copies hold the block's bytes followed by zero padding
    #[test]
    fn block_copies_match_file(
        content in prop::collection::vec(any::<u8>(), 1..2048),
        dest_len in 1usize..400,
    ) {
        let file = create_file(&content);
        let mut cache = BlockCache::open(file.path(), config(1))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        for block in 0..cache.block_count() {
            let start = block as usize * BLOCK;
            let end = (start + BLOCK).min(content.len());
            let expected = &content[start..end];

            // Bypass path first, then the same block from the arena
            let mut bypass = vec![0xEEu8; dest_len];
            let copied = cache.copy_range(&mut bypass, block).map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(copied, dest_len.min(expected.len()));
            prop_assert_eq!(&bypass[..copied], &expected[..copied]);
            prop_assert!(bypass[copied..].iter().all(|&b| b == 0));

            let owned = cache.copy_block(block).map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(owned.len(), BLOCK);
            prop_assert_eq!(&owned[..expected.len()], expected);
            prop_assert!(owned[expected.len()..].iter().all(|&b| b == 0));

            let mut resident = vec![0xEEu8; dest_len];
            let copied_again = cache.copy_range(&mut resident, block).map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(copied_again, copied);
            prop_assert_eq!(&resident, &bypass);
        }
    }
}

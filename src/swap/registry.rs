// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::Mutex;

use super::BlockKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum BlockState {
    /// Key reserved by `store`, the file is not at its canonical path yet.
    Writing,
    /// File is in place and readable.
    Stored,
    /// `release` is deleting the file.
    Releasing,
}

#[derive(Clone, Debug)]
pub(super) struct BlockEntry {
    pub path: PathBuf,
    pub len: usize,
    pub state: BlockState,
}

/// In-memory record of every block the store is responsible for.
///
/// The lock only guards map updates. Callers never hold it across disk I/O, so
/// operations on different keys proceed in parallel. A key is visible to `load` and
/// `release` only in the [`BlockState::Stored`] state, which is entered after the
/// file has been renamed into place and left before the file is deleted.
#[derive(Default)]
pub(super) struct Registry {
    blocks: Mutex<HashMap<BlockKey, BlockEntry>>,
}

impl Registry {
    /// Reserve `key` for writing. Returns `false` if the key is already present in any
    /// state.
    pub fn reserve(&self, key: BlockKey, path: PathBuf, len: usize) -> bool {
        match self.blocks.lock().entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(v) => {
                v.insert(BlockEntry {
                    path,
                    len,
                    state: BlockState::Writing,
                });
                true
            }
        }
    }

    /// Mark a reserved key as stored once its file is in place.
    pub fn publish(&self, key: BlockKey) {
        self.transition(key, BlockState::Writing, BlockState::Stored);
    }

    /// Drop a reservation whose write failed.
    pub fn rollback(&self, key: BlockKey) {
        let mut blocks = self.blocks.lock();
        let removed = blocks.remove(&key);
        debug_assert!(matches!(
            removed,
            Some(BlockEntry {
                state: BlockState::Writing,
                ..
            })
        ));
    }

    /// Path and length of a stored block.
    pub fn lookup(&self, key: BlockKey) -> Option<(PathBuf, usize)> {
        let blocks = self.blocks.lock();
        match blocks.get(&key) {
            Some(entry) if entry.state == BlockState::Stored => {
                Some((entry.path.clone(), entry.len))
            }
            _ => None,
        }
    }

    /// Move a stored block into the releasing state and return its path. Returns `None`
    /// if the key is not stored, so only one caller can win a release.
    pub fn begin_release(&self, key: BlockKey) -> Option<PathBuf> {
        let mut blocks = self.blocks.lock();
        match blocks.get_mut(&key) {
            Some(entry) if entry.state == BlockState::Stored => {
                entry.state = BlockState::Releasing;
                Some(entry.path.clone())
            }
            _ => None,
        }
    }

    /// Forget a block whose file has been deleted.
    pub fn finish_release(&self, key: BlockKey) {
        let mut blocks = self.blocks.lock();
        let removed = blocks.remove(&key);
        debug_assert!(matches!(
            removed,
            Some(BlockEntry {
                state: BlockState::Releasing,
                ..
            })
        ));
    }

    /// Put a block back after its file could not be deleted.
    pub fn abort_release(&self, key: BlockKey) {
        self.transition(key, BlockState::Releasing, BlockState::Stored);
    }

    pub fn contains(&self, key: BlockKey) -> bool {
        self.lookup(key).is_some()
    }

    /// Number and total size of stored blocks.
    pub fn usage(&self) -> (usize, u64) {
        let blocks = self.blocks.lock();
        blocks
            .values()
            .filter(|entry| entry.state == BlockState::Stored)
            .fold((0, 0), |(count, bytes), entry| {
                (count + 1, bytes + entry.len as u64)
            })
    }

    /// Take every entry out of the registry, leaving it empty.
    pub fn drain(&self) -> Vec<(BlockKey, BlockEntry)> {
        let mut blocks = self.blocks.lock();
        let mut entries: Vec<_> = blocks.drain().collect();
        entries.sort_unstable_by_key(|(key, _)| *key);
        entries
    }

    fn transition(&self, key: BlockKey, from: BlockState, to: BlockState) {
        let mut blocks = self.blocks.lock();
        let entry = blocks
            .get_mut(&key)
            .unwrap_or_else(|| panic!("block {key} vanished from the registry"));
        assert_eq!(entry.state, from, "unexpected state of block {key}");
        entry.state = to;
    }
}

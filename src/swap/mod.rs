// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! Swap manager for large query blocks.
//!
//! When an intermediate result block is too large to stay in memory, the executor spills
//! it with [`BlockStore::store`], brings it back with [`BlockStore::load`] as many times
//! as it needs, and finally drops it with [`BlockStore::release`]. Each stored block is one
//! file named after its [`BlockKey`] inside a swap directory that the store owns
//! exclusively from [`BlockStore::startup`] to [`BlockStore::shutdown`].
//!
//! The store is shared between executor threads. Operations on different keys never wait
//! for each other's I/O. Calling `load` and `release` for the same key at the same time is
//! a caller error.

use std::fmt;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, warn};

pub use self::error::*;
pub use self::key::*;
use self::lifecycle::DirectoryClaim;
pub use self::options::*;
use self::registry::Registry;
use self::stats::SwapCounters;
pub use self::stats::SwapStats;

mod error;
mod io;
mod key;
mod lifecycle;
mod options;
mod registry;
mod stats;

/// Owner of a swap directory and of every block spilled into it.
///
/// Created by [`BlockStore::startup`]. Dropping an active store cleans up the directory
/// like [`BlockStore::shutdown`] does, but can only log failures.
pub struct BlockStore {
    /// Options of the store
    options: SwapOptions,

    /// Blocks currently on disk
    registry: Registry,

    /// Operation counters
    counters: SwapCounters,

    /// Ownership of the swap directory. `None` once the store has been torn down.
    claim: Option<DirectoryClaim>,
}

impl fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockStore")
            .field("directory", &self.options.path)
            .field("enable_fsync", &self.options.enable_fsync)
            .field("live_blocks", &self.len())
            .finish()
    }
}

impl BlockStore {
    /// Spill `payload` to disk under `key`.
    ///
    /// The key is reserved before any I/O happens, so of two concurrent stores for one key
    /// exactly one succeeds. On failure no file is left under the block's path and the key
    /// is free again.
    pub fn store(&self, key: BlockKey, payload: &[u8]) -> SwapResult<()> {
        let path = self.block_path(key);
        if !self.registry.reserve(key, path.clone(), payload.len()) {
            return Err(SwapError::DuplicateBlock(key));
        }

        if let Err(err) = io::write_block(&path, payload, self.options.enable_fsync) {
            self.registry.rollback(key);
            return Err(SwapError::io(BlockOp::Store, key, path, err));
        }
        self.registry.publish(key);

        self.counters.record_store(payload.len());
        debug!(%key, len = payload.len(), "stored block");
        Ok(())
    }

    /// Copy the block stored under `key` to the front of `dest` and return its length.
    ///
    /// `dest` must be at least as long as the stored block, otherwise nothing is copied.
    /// The block stays stored.
    pub fn load(&self, key: BlockKey, dest: &mut [u8]) -> SwapResult<usize> {
        let (path, len) = self
            .registry
            .lookup(key)
            .ok_or_else(|| SwapError::unknown(BlockOp::Load, key))?;
        if dest.len() < len {
            return Err(SwapError::buffer_too_small(key, len, dest.len()));
        }

        io::read_block(&path, &mut dest[..len])
            .map_err(|err| SwapError::io(BlockOp::Load, key, path, err))?;

        self.counters.record_load(len);
        debug!(%key, len, "loaded block");
        Ok(len)
    }

    /// Load the block stored under `key` into a newly allocated buffer.
    pub fn load_bytes(&self, key: BlockKey) -> SwapResult<Bytes> {
        let len = self
            .stored_len(key)
            .ok_or_else(|| SwapError::unknown(BlockOp::Load, key))?;
        let mut buf = vec![0; len];
        let loaded = self.load(key, &mut buf)?;
        buf.truncate(loaded);
        Ok(Bytes::from(buf))
    }

    /// Delete the block stored under `key`. The key can be stored again afterwards.
    pub fn release(&self, key: BlockKey) -> SwapResult<()> {
        let path = self
            .registry
            .begin_release(key)
            .ok_or_else(|| SwapError::unknown(BlockOp::Release, key))?;

        match io::remove_block(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(%key, "file of released block was already gone");
            }
            Err(err) => {
                // the file is still there, so the block stays stored
                self.registry.abort_release(key);
                return Err(SwapError::io(BlockOp::Release, key, path, err));
            }
        }
        self.registry.finish_release(key);

        self.counters.record_release();
        debug!(%key, "released block");
        Ok(())
    }

    /// Path of the file that backs `key`, whether or not the block is stored.
    pub fn block_path(&self, key: BlockKey) -> PathBuf {
        self.options.path.join(key.file_name())
    }

    pub fn contains(&self, key: BlockKey) -> bool {
        self.registry.contains(key)
    }

    /// Size in bytes of the block stored under `key`.
    pub fn stored_len(&self, key: BlockKey) -> Option<usize> {
        self.registry.lookup(key).map(|(_, len)| len)
    }

    /// Number of stored blocks.
    pub fn len(&self) -> usize {
        self.registry.usage().0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn directory(&self) -> &Path {
        &self.options.path
    }

    pub fn options(&self) -> &SwapOptions {
        &self.options
    }

    pub fn stats(&self) -> SwapStats {
        let (live_blocks, live_bytes) = self.registry.usage();
        self.counters.snapshot(live_blocks, live_bytes)
    }
}

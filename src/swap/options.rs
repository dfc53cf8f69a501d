// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

use std::path::PathBuf;

/// Options for [`BlockStore`](super::BlockStore)
#[derive(Clone, Debug)]
pub struct SwapOptions {
    /// Swap directory. Must already exist; everything inside it belongs to the store.
    pub path: PathBuf,

    /// Whether to `sync_data` every block file before it is renamed into place.
    pub enable_fsync: bool,
}

impl SwapOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            enable_fsync: false,
        }
    }

    pub fn default_for_cli() -> Self {
        Self {
            path: PathBuf::new().join("blockswap.swap"),
            enable_fsync: false,
        }
    }

    pub fn default_for_test(path: PathBuf) -> Self {
        Self {
            path,
            enable_fsync: false,
        }
    }

    pub fn with_fsync(mut self, enable_fsync: bool) -> Self {
        self.enable_fsync = enable_fsync;
        self
    }
}

// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters updated by block operations. Only successful operations are counted.
#[derive(Default)]
pub(super) struct SwapCounters {
    stores: AtomicU64,
    loads: AtomicU64,
    releases: AtomicU64,
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
}

impl SwapCounters {
    pub fn record_store(&self, len: usize) {
        self.stores.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub fn record_load(&self, len: usize) {
        self.loads.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub fn record_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, live_blocks: usize, live_bytes: u64) -> SwapStats {
        SwapStats {
            live_blocks,
            live_bytes,
            stores: self.stores.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time statistics of a [`BlockStore`](super::BlockStore).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SwapStats {
    /// Blocks currently stored.
    pub live_blocks: usize,
    /// Total payload size of the blocks currently stored.
    pub live_bytes: u64,
    pub stores: u64,
    pub loads: u64,
    pub releases: u64,
    pub bytes_written: u64,
    pub bytes_read: u64,
}

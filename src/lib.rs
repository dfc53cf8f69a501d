// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! Disk swap for large intermediate query blocks.
//!
//! See [`swap`] for the block store itself.

#![deny(unused_must_use)]

pub mod swap;

pub use self::swap::{
    BlockKey, BlockOp, BlockStore, CleanupFailure, SwapError, SwapOptions, SwapResult, SwapStats,
};

// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use super::BlockKey;

/// Operation of the swap manager that produced an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockOp {
    Store,
    Load,
    Release,
    Startup,
    Shutdown,
}

impl fmt::Display for BlockOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Store => "store",
            Self::Load => "load",
            Self::Release => "release",
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum SwapError {
    #[error("Request to store block that is already stored: {0}")]
    DuplicateBlock(BlockKey),
    #[error("Request to {op} block that is not stored: {key}")]
    UnknownBlock { op: BlockOp, key: BlockKey },
    #[error("buffer too small to load block {key}: need {required} bytes, have {capacity}")]
    BufferTooSmall {
        key: BlockKey,
        required: usize,
        capacity: usize,
    },
    #[error("IO error during {op}{} at {}: {source}", KeySuffix(.key), .path.display())]
    Io {
        op: BlockOp,
        key: Option<BlockKey>,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("swap directory {} does not exist or is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("swap directory {} is already owned by an active block store", .0.display())]
    DirectoryInUse(PathBuf),
    #[error("failed to clean up {} swap file(s): {}", .0.len(), CleanupList(.0))]
    Cleanup(Vec<CleanupFailure>),
}

/// One file the shutdown sweep could not delete.
#[derive(Debug)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub source: std::io::Error,
}

impl fmt::Display for CleanupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.source)
    }
}

struct KeySuffix<'a>(&'a Option<BlockKey>);

impl fmt::Display for KeySuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(key) => write!(f, " of block {key}"),
            None => Ok(()),
        }
    }
}

struct CleanupList<'a>(&'a [CleanupFailure]);

impl fmt::Display for CleanupList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

impl SwapError {
    pub fn unknown(op: BlockOp, key: BlockKey) -> Self {
        Self::UnknownBlock { op, key }
    }

    pub fn buffer_too_small(key: BlockKey, required: usize, capacity: usize) -> Self {
        Self::BufferTooSmall {
            key,
            required,
            capacity,
        }
    }

    pub fn io(
        op: BlockOp,
        key: impl Into<Option<BlockKey>>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            op,
            key: key.into(),
            path: path.into(),
            source,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateBlock(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::UnknownBlock { .. })
    }

    pub fn is_buffer_too_small(&self) -> bool {
        matches!(self, Self::BufferTooSmall { .. })
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Cleanup(_))
    }
}

pub type SwapResult<T> = std::result::Result<T, SwapError>;

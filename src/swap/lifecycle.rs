// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::{const_mutex, Mutex};
use tracing::{debug, info, warn};

use super::io::{self, SweptEntry, TEMP_FILE_SUFFIX};
use super::registry::Registry;
use super::stats::SwapCounters;
use super::{
    BlockKey, BlockOp, BlockStore, CleanupFailure, SwapError, SwapOptions, SwapResult,
};

/// Swap directories owned by a live [`BlockStore`] in this process.
static ACTIVE_DIRECTORIES: Mutex<BTreeSet<PathBuf>> = const_mutex(BTreeSet::new());

/// Exclusive ownership of a swap directory, released on drop.
pub(super) struct DirectoryClaim {
    canonical: PathBuf,
}

impl DirectoryClaim {
    fn acquire(path: &Path) -> SwapResult<Self> {
        match fs::metadata(path) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => return Err(SwapError::NotADirectory(path.to_path_buf())),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(SwapError::NotADirectory(path.to_path_buf()))
            }
            Err(err) => return Err(SwapError::io(BlockOp::Startup, None, path, err)),
        }
        let canonical = fs::canonicalize(path)
            .map_err(|err| SwapError::io(BlockOp::Startup, None, path, err))?;

        if !ACTIVE_DIRECTORIES.lock().insert(canonical.clone()) {
            return Err(SwapError::DirectoryInUse(path.to_path_buf()));
        }
        Ok(Self { canonical })
    }

    fn path(&self) -> &Path {
        &self.canonical
    }
}

impl Drop for DirectoryClaim {
    fn drop(&mut self) {
        ACTIVE_DIRECTORIES.lock().remove(&self.canonical);
    }
}

impl BlockStore {
    /// Take ownership of the swap directory in `options` and return an empty store.
    ///
    /// Everything already in the directory is treated as debris of an earlier process
    /// and deleted. The directory itself must exist.
    pub fn startup(mut options: SwapOptions) -> SwapResult<Self> {
        let claim = DirectoryClaim::acquire(&options.path)?;
        // block paths must not depend on the working directory of later calls
        options.path = claim.path().to_path_buf();

        // if anything below fails, `claim` is dropped and the directory is free again
        let swept = io::sweep_directory(&options.path)
            .map_err(|err| SwapError::io(BlockOp::Startup, None, &options.path, err))?;
        let debris = swept.len();
        for SweptEntry { path, result } in swept {
            result.map_err(|err| SwapError::io(BlockOp::Startup, None, &path, err))?;
            log_debris(&path);
        }

        info!(
            path = %options.path.display(),
            debris,
            "block store started"
        );
        Ok(Self {
            options,
            registry: Registry::default(),
            counters: SwapCounters::default(),
            claim: Some(claim),
        })
    }

    /// Delete every block still stored and anything else left in the swap directory,
    /// then give up the directory.
    ///
    /// Deletion failures do not stop the sweep. They are returned together as
    /// [`SwapError::Cleanup`] after the sweep has finished, and the directory is
    /// released either way.
    pub fn shutdown(mut self) -> SwapResult<()> {
        self.teardown()
    }

    pub(super) fn teardown(&mut self) -> SwapResult<()> {
        let claim = match self.claim.take() {
            Some(claim) => claim,
            None => return Ok(()),
        };

        let mut cleanup = CleanupLog::default();
        let outstanding = self.registry.drain();
        let outstanding_blocks = outstanding.len();
        for (key, entry) in outstanding {
            match io::remove_block(&entry.path) {
                Ok(()) => debug!(%key, "removed outstanding block"),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    warn!(%key, "outstanding block file already gone")
                }
                Err(source) => cleanup.failed(entry.path, source),
            }
        }

        let directory = self.options.path.clone();
        match io::sweep_directory(&directory) {
            Ok(swept) => {
                for SweptEntry { path, result } in swept {
                    match result {
                        Ok(()) => {
                            cleanup.removed(&path);
                            log_debris(&path);
                        }
                        Err(source) => cleanup.failed(path, source),
                    }
                }
            }
            Err(source) => cleanup.failed(directory.clone(), source),
        }
        drop(claim);

        if cleanup.failures.is_empty() {
            info!(
                path = %directory.display(),
                outstanding_blocks,
                "block store shut down"
            );
        } else {
            warn!(
                path = %directory.display(),
                outstanding_blocks,
                failures = cleanup.failures.len(),
                "block store shut down with leftover files"
            );
        }
        cleanup.finish()
    }
}

/// Deletion failures collected by the shutdown sweep. A path that fails once and is
/// removed by a later pass is no longer a failure.
#[derive(Default)]
struct CleanupLog {
    failures: Vec<CleanupFailure>,
}

impl CleanupLog {
    fn failed(&mut self, path: PathBuf, source: std::io::Error) {
        match self.failures.iter_mut().find(|f| f.path == path) {
            Some(failure) => failure.source = source,
            None => self.failures.push(CleanupFailure { path, source }),
        }
    }

    fn removed(&mut self, path: &Path) {
        self.failures.retain(|f| f.path != path);
    }

    fn finish(self) -> SwapResult<()> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(SwapError::Cleanup(self.failures))
        }
    }
}

impl Drop for BlockStore {
    fn drop(&mut self) {
        if self.claim.is_none() {
            return;
        }
        warn!(
            path = %self.options.path.display(),
            "block store dropped without shutdown, cleaning up"
        );
        if let Err(err) = self.teardown() {
            warn!("{}", err);
        }
    }
}

fn log_debris(path: &Path) {
    let name = path.file_name().and_then(|name| name.to_str()).unwrap_or_default();
    let block_name = name.strip_suffix(TEMP_FILE_SUFFIX).unwrap_or(name);
    match BlockKey::from_file_name(block_name) {
        Some(key) => debug!(%key, "removed stale block file {}", name),
        None => warn!("removed foreign entry {} from swap directory", path.display()),
    }
}

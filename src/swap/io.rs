// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! Blocking file operations on the swap directory.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Suffix of a block file that is still being written.
pub const TEMP_FILE_SUFFIX: &str = ".tmp";

pub fn temp_path_of(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(TEMP_FILE_SUFFIX);
    PathBuf::from(name)
}

/// Write `data` to `path` so that `path` either does not exist or holds all of `data`.
///
/// The bytes go to a sibling temp file first, which is renamed onto `path` once fully
/// written. The temp file is removed if anything fails.
pub fn write_block(path: &Path, data: &[u8], enable_fsync: bool) -> io::Result<()> {
    let temp_path = temp_path_of(path);
    let result = write_then_rename(&temp_path, path, data, enable_fsync);
    if result.is_err() {
        fs::remove_file(&temp_path).ok();
    }
    result
}

fn write_then_rename(
    temp_path: &Path,
    path: &Path,
    data: &[u8],
    enable_fsync: bool,
) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(temp_path)?;
    file.write_all(data)?;
    file.flush()?;
    if enable_fsync {
        file.sync_data()?;
    }
    drop(file);

    fs::rename(temp_path, path)?;
    if enable_fsync {
        if let Some(dir) = path.parent() {
            sync_dir(dir)?;
        }
    }
    Ok(())
}

fn sync_dir(path: &Path) -> io::Result<()> {
    File::open(path)?.sync_data()
}

/// Read the whole block at `path` into `dest`, whose length must equal the size the
/// block was stored with.
pub fn read_block(path: &Path, dest: &mut [u8]) -> io::Result<()> {
    let mut file = File::open(path)?;
    let actual = file.metadata()?.len();
    if actual != dest.len() as u64 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "block file has {} bytes but {} were stored",
                actual,
                dest.len()
            ),
        ));
    }
    file.read_exact(dest)
}

pub fn remove_block(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

/// Result of removing one entry of the swap directory.
pub struct SweptEntry {
    pub path: PathBuf,
    pub result: io::Result<()>,
}

/// Remove every entry of `dir`. Failing to list the directory is an error; failing to
/// remove an individual entry is reported in its [`SweptEntry`] and does not stop the
/// sweep.
pub fn sweep_directory(dir: &Path) -> io::Result<Vec<SweptEntry>> {
    let mut swept = vec![];
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let result = match entry.file_type() {
            Ok(file_type) if file_type.is_dir() => fs::remove_dir_all(&path),
            Ok(_) => fs::remove_file(&path),
            Err(err) => Err(err),
        };
        swept.push(SweptEntry { path, result });
    }
    Ok(swept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1___1.block");

        write_block(&path, b"hello block", true).unwrap();
        assert!(path.exists());
        assert!(!temp_path_of(&path).exists());

        let mut buf = vec![0; 11];
        read_block(&path, &mut buf).unwrap();
        assert_eq!(&buf, b"hello block");

        let mut short = vec![0; 5];
        let err = read_block(&path, &mut short).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_failed_write_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        // parent directory does not exist, so the temp file cannot be created
        let path = dir.path().join("missing").join("1___1.block");

        write_block(&path, b"data", false).unwrap_err();
        assert!(!path.exists());
        assert!(!temp_path_of(&path).exists());
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // a non-empty directory sits at the target path, so the rename fails
        let path = dir.path().join("1___1.block");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("occupied"), b"x").unwrap();

        write_block(&path, b"data", false).unwrap_err();
        assert!(path.is_dir());
        assert!(!temp_path_of(&path).exists());
    }

    #[test]
    fn test_sweep_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("0___999.block"), b"").unwrap();
        fs::write(dir.path().join("stray.txt"), b"stray").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("deep"), b"deep").unwrap();

        let swept = sweep_directory(dir.path()).unwrap();
        assert_eq!(swept.len(), 3);
        assert!(swept.iter().all(|entry| entry.result.is_ok()));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

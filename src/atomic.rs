//! Atomic replacement of a target file.
//!
//! New content is written to a temporary file next to the target, flushed to
//! disk and renamed over the target. Staying in the same directory keeps the
//! rename on one filesystem. Until [`StagedFile::commit`] succeeds the target
//! is untouched, and a staged file that is dropped without being committed
//! removes its temporary.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error;

const TEMP_SUFFIX: &str = "verstamp-tmp";

/// A temporary file waiting to replace `target`
#[derive(Debug)]
pub struct StagedFile {
    target: PathBuf,
    temp: PathBuf,
    committed: bool,
}

/// The temporary path used for `target`: a hidden sibling of the target
pub fn temp_path_for(target: &Path) -> error::Result<PathBuf> {
    let name = target.file_name().ok_or_else(|| {
        error::Error::IO(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} has no file name", target.display()),
        ))
    })?;
    let mut temp_name = std::ffi::OsString::from(".");
    temp_name.push(name);
    temp_name.push(".");
    temp_name.push(TEMP_SUFFIX);
    Ok(target.with_file_name(temp_name))
}

impl StagedFile {
    /// Stages `bytes` as the new content of `target`
    pub fn with_contents(target: &Path, bytes: &[u8]) -> error::Result<Self> {
        let staged = Self::empty(target)?;
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&staged.temp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(staged)
    }

    /// Stages a byte copy of `target`, for tools that edit a file in place
    pub fn copy_of(target: &Path) -> error::Result<Self> {
        let staged = Self::empty(target)?;
        fs::copy(target, &staged.temp)?;
        Ok(staged)
    }

    fn empty(target: &Path) -> error::Result<Self> {
        let temp = temp_path_for(target)?;
        File::create(&temp)?;
        debug!("Staging {} as {}", target.display(), temp.display());
        Ok(StagedFile {
            target: target.to_path_buf(),
            temp,
            committed: false,
        })
    }

    /// Path of the temporary file
    pub fn path(&self) -> &Path {
        &self.temp
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Flushes the temporary file and renames it over the target
    pub fn commit(mut self) -> error::Result<()> {
        OpenOptions::new().write(true).open(&self.temp)?.sync_all()?;
        fs::rename(&self.temp, &self.target)?;
        self.committed = true;
        debug!("Replaced {}", self.target.display());
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp);
        }
    }
}

/// Atomically replaces the contents of `target` with `bytes`
pub fn replace(target: &Path, bytes: &[u8]) -> error::Result<()> {
    StagedFile::with_contents(target, bytes)?.commit()
}

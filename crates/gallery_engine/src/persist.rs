use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cannot use {path:?} as an output directory: {reason}")]
    OutputDir { path: PathBuf, reason: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl PersistError {
    fn output_dir(path: &Path, reason: impl ToString) -> Self {
        PersistError::OutputDir {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Creates `dir` (and its parents) when missing and checks that files can be
/// created in it.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(PersistError::output_dir(dir, "not a directory")),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|err| PersistError::output_dir(dir, err))?;
        }
        Err(err) => return Err(PersistError::output_dir(dir, err)),
    }
    NamedTempFile::new_in(dir).map_err(|err| PersistError::output_dir(dir, err))?;
    Ok(())
}

/// Writes files below a root directory so readers never see a partial file.
///
/// Names are relative and may contain `/`; missing directories are created.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, name: &str, content: &str) -> Result<PathBuf, PersistError> {
        self.write_bytes(name, content.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        let target = self.dir.join(name);
        let parent = target.parent().unwrap_or(&self.dir);
        ensure_output_dir(parent)?;

        let mut staged = NamedTempFile::new_in(parent)?;
        staged.write_all(content)?;
        staged.as_file_mut().sync_all()?;

        // persist() does not overwrite on every platform
        if target.exists() {
            fs::remove_file(&target)?;
        }
        staged.persist(&target).map_err(|err| err.error)?;
        Ok(target)
    }
}

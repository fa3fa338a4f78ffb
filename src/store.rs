//! Project-scoped state directory.
//!
//! All harness documents live under `<project>/.claude/`. Files are written
//! owner-only and atomically (temp file + rename). Read-modify-write of the
//! mutable documents happens under an exclusive lock on `.fic.lock`, so
//! concurrent hook processes serialize instead of losing updates.

use fs2::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const STATE_DIR: &str = ".claude";
const LOCK_FILE: &str = ".fic.lock";

#[cfg(unix)]
const FILE_MODE: u32 = 0o600;
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("reading {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("writing {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parsing {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("serializing {what}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("locking {}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    /// The message followed by its cause, for logging a bare `StoreError`
    /// outside an `anyhow` chain.
    pub fn detail(&self) -> String {
        match std::error::Error::source(self) {
            Some(cause) => format!("{self}: {cause}"),
            None => self.to_string(),
        }
    }
}

/// Read and deserialize a JSON file, returning `None` if it doesn't exist.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match fs::read_to_string(path) {
        Ok(s) => serde_json::from_str(&s)
            .map(Some)
            .map_err(|source| StoreError::Parse {
                path: path.to_path_buf(),
                source,
            }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path`.
pub fn write_json_file<T: Serialize>(
    path: &Path,
    value: &T,
    what: &'static str,
) -> Result<(), StoreError> {
    let json =
        serde_json::to_string_pretty(value).map_err(|source| StoreError::Serialize { what, source })?;
    if let Some(parent) = path.parent() {
        create_private_dir(parent)?;
    }
    let tmp = tmp_path(path);
    write_private_file(&tmp, json.as_bytes())?;
    fs::rename(&tmp, path).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Create `dir` (and parents) with owner-only permissions.
pub fn create_private_dir(dir: &Path) -> Result<(), StoreError> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder.create(dir).map_err(|source| StoreError::Write {
        path: dir.to_path_buf(),
        source,
    })
}

/// Open `path` for writing with owner-only permissions.
pub fn private_open_options(append: bool) -> OpenOptions {
    let mut opts = OpenOptions::new();
    opts.create(true);
    if append {
        opts.append(true);
    } else {
        opts.write(true).truncate(true);
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(FILE_MODE);
    }
    opts
}

pub fn write_private_file(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let to_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut file = private_open_options(false).open(path).map_err(to_err)?;
    file.write_all(contents).map_err(to_err)?;
    file.sync_all().map_err(to_err)
}

fn tmp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

/// Exclusive advisory lock on the state directory, released on drop.
pub struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Handle on `<project>/.claude/`.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(work_dir: &Path) -> Self {
        Self {
            dir: work_dir.join(STATE_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn ensure_dir(&self) -> Result<(), StoreError> {
        create_private_dir(&self.dir)
    }

    pub fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StoreError> {
        read_json_file(&self.path(name))
    }

    pub fn write<T: Serialize>(&self, name: &'static str, value: &T) -> Result<(), StoreError> {
        write_json_file(&self.path(name), value, name)
    }

    /// Block until this process holds the state-directory lock.
    pub fn lock(&self) -> Result<StoreLock, StoreError> {
        self.ensure_dir()?;
        let path = self.path(LOCK_FILE);
        let to_err = |source| StoreError::Lock {
            path: path.clone(),
            source,
        };
        let file = private_open_options(true).open(&path).map_err(to_err)?;
        FileExt::lock_exclusive(&file).map_err(to_err)?;
        Ok(StoreLock { file })
    }

    /// Locked read-modify-write of one JSON document.
    ///
    /// `prepare` turns the stored document (or `None` when absent) into the
    /// value handed to `mutate`; the result is written back before the lock
    /// is released.
    pub fn update<T, R>(
        &self,
        name: &'static str,
        prepare: impl FnOnce(Option<T>) -> T,
        mutate: impl FnOnce(&mut T) -> R,
    ) -> Result<R, StoreError>
    where
        T: Serialize + DeserializeOwned,
    {
        let _guard = self.lock()?;
        let mut doc = prepare(self.read(name)?);
        let out = mutate(&mut doc);
        self.write(name, &doc)?;
        Ok(out)
    }
}

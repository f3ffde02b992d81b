//! Turning a [`ConfigSource`] into a path the engine can open.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, warn};

use crate::ConfigSource;

/// Name prefix of materialized inline configs.
pub const SCRATCH_FILE_PREFIX: &str = "hev-socks5-tunnel-";

/// Random characters appended to the prefix.
const SCRATCH_SUFFIX_LEN: usize = 12;

/// A config path that stays valid for one engine invocation.
///
/// For inline configs the handle owns the scratch file and deletes it when
/// dropped, so unwinding and early returns clean up too.
#[derive(Debug)]
pub struct ConfigPathHandle {
    path: PathBuf,
    artifact: Option<TempPath>,
}

impl ConfigPathHandle {
    fn existing(path: PathBuf) -> Self {
        Self {
            path,
            artifact: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this handle owns a scratch file.
    pub fn is_materialized(&self) -> bool {
        self.artifact.is_some()
    }

    /// Remove the scratch file now and report failures. No-op for existing paths.
    pub fn cleanup(self) -> io::Result<()> {
        match self.artifact {
            Some(artifact) => {
                debug!(path = %self.path.display(), "removing materialized config");
                artifact.close()
            }
            None => Ok(()),
        }
    }
}

/// Produce a path for `source`.
///
/// `ExistingPath` is wrapped without touching the filesystem. `InlineText` is
/// written to a fresh file in `scratch_dir` created with `O_EXCL` and a random
/// suffix, so names never collide even across processes sharing the
/// directory. A short write is an error.
pub fn materialize(source: &ConfigSource, scratch_dir: &Path) -> io::Result<ConfigPathHandle> {
    match source {
        ConfigSource::ExistingPath(path) => Ok(ConfigPathHandle::existing(path.clone())),
        ConfigSource::InlineText(text) => write_scratch_file(text.as_bytes(), scratch_dir),
    }
}

fn write_scratch_file(content: &[u8], scratch_dir: &Path) -> io::Result<ConfigPathHandle> {
    let mut file = tempfile::Builder::new()
        .prefix(SCRATCH_FILE_PREFIX)
        .rand_bytes(SCRATCH_SUFFIX_LEN)
        .tempfile_in(scratch_dir)
        .map_err(|e| {
            warn!(dir = %scratch_dir.display(), error = %e, "failed to create scratch config");
            e
        })?;

    file.write_all(content)?;
    file.flush()?;
    file.as_file().sync_all()?;

    let on_disk = file.as_file().metadata()?.len();
    if on_disk != content.len() as u64 {
        return Err(io::Error::new(
            io::ErrorKind::WriteZero,
            format!(
                "short write: {} of {} bytes reached {}",
                on_disk,
                content.len(),
                file.path().display()
            ),
        ));
    }

    let artifact = file.into_temp_path();
    let path = artifact.to_path_buf();
    debug!(path = %path.display(), bytes = content.len(), "config materialized");

    Ok(ConfigPathHandle {
        path,
        artifact: Some(artifact),
    })
}

use crate::backup::clock::{archive_stem, Clock};
use crate::backup::compression::compress_directory;
use crate::backup::manifest::{base_name, BackupManifest};
use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Packages a manifest into `<work_dir>/<MM-DD-YYYY>.zip`.
///
/// The staging directory `<work_dir>/<MM-DD-YYYY>/` only exists while
/// `pack` runs; it is removed on every exit path. The returned archive is
/// owned by the caller.
pub struct Archiver {
    work_dir: PathBuf,
    clock: Arc<dyn Clock>,
    compress: Compressor,
}

/// Writes the staging directory into the archive path, returning its size.
type Compressor = fn(&Path, &Path) -> Result<u64>;

impl Archiver {
    pub fn new(work_dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            work_dir: work_dir.into(),
            clock,
            compress: compress_directory,
        }
    }

    #[cfg(test)]
    fn with_compressor(mut self, compress: Compressor) -> Self {
        self.compress = compress;
        self
    }

    pub fn archive_name(&self) -> String {
        format!("{}.zip", archive_stem(self.clock.today()))
    }

    pub fn pack(&self, manifest: &BackupManifest) -> Result<PathBuf> {
        let stem = archive_stem(self.clock.today());
        let staging = self.work_dir.join(&stem);
        let archive_path = self.work_dir.join(format!("{}.zip", stem));

        manifest.verify()?;

        if staging.exists() {
            warn!("Removing leftover staging directory {}", staging.display());
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;
        debug!("Staging backup in {}", staging.display());

        let packed = stage(manifest, &staging).and_then(|_| (self.compress)(&staging, &archive_path));
        let cleaned = fs::remove_dir_all(&staging);

        match (packed, cleaned) {
            (Ok(size), Ok(())) => {
                info!("Packed {} ({} bytes)", archive_path.display(), size);
                Ok(archive_path)
            }
            (Ok(_), Err(e)) => {
                discard_partial(&archive_path);
                Err(e.into())
            }
            (Err(e), cleaned) => {
                if let Err(ce) = cleaned {
                    warn!("Failed to remove staging directory {}: {}", staging.display(), ce);
                }
                discard_partial(&archive_path);
                Err(e)
            }
        }
    }
}

/// Mirrors the manifest into `staging`: both files by their base names and
/// a flat copy of the notes directory.
fn stage(manifest: &BackupManifest, staging: &Path) -> Result<()> {
    for source in [&manifest.database_file, &manifest.id_file] {
        let target = staging.join(base_name(source)?);
        fs::copy(source, &target)?;
    }

    let notes_target = staging.join(manifest.notes_dir_name()?);
    fs::create_dir(&notes_target)?;

    let mut copied = 0usize;
    for entry in fs::read_dir(&manifest.notes_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            debug!("Skipping non-file entry {}", entry.path().display());
            continue;
        }
        fs::copy(entry.path(), notes_target.join(entry.file_name()))?;
        copied += 1;
    }
    debug!("Copied {} note files", copied);

    Ok(())
}

fn discard_partial(archive_path: &Path) {
    if archive_path.is_file() {
        if let Err(e) = fs::remove_file(archive_path) {
            warn!("Failed to remove partial archive {}: {}", archive_path.display(), e);
        }
    }
}

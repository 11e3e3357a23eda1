use crate::config::DataConfig;
use crate::error::{BackupError, Result};
use std::path::{Path, PathBuf};

/// The fixed set of local sources packaged on each run.
#[derive(Debug, Clone)]
pub struct BackupManifest {
    pub database_file: PathBuf,
    pub id_file: PathBuf,
    pub notes_dir: PathBuf,
}

impl BackupManifest {
    pub fn new(database_file: PathBuf, id_file: PathBuf, notes_dir: PathBuf) -> Self {
        Self {
            database_file,
            id_file,
            notes_dir,
        }
    }

    pub fn from_config(config: &DataConfig) -> Result<Self> {
        if !config.is_complete() {
            return Err(BackupError::Config(
                "data paths are not configured".to_string(),
            ));
        }
        Ok(Self::new(
            std::path::absolute(&config.database_file)?,
            std::path::absolute(&config.id_file)?,
            std::path::absolute(&config.notes_dir)?,
        ))
    }

    /// Fails with a `NotFound` I/O error naming the first missing source.
    pub fn verify(&self) -> Result<()> {
        if !self.database_file.is_file() {
            return Err(BackupError::missing("Database file", &self.database_file));
        }
        if !self.id_file.is_file() {
            return Err(BackupError::missing("Id file", &self.id_file));
        }
        if !self.notes_dir.is_dir() {
            return Err(BackupError::missing("Notes directory", &self.notes_dir));
        }
        self.check_entry_names()
    }

    /// The three sources become top-level archive entries under their base
    /// names, so those names must be pairwise distinct.
    fn check_entry_names(&self) -> Result<()> {
        let database = base_name(&self.database_file)?;
        let id = base_name(&self.id_file)?;
        let notes = self.notes_dir_name()?;

        let clash = if database == id {
            Some(database)
        } else if database == notes || id == notes {
            Some(notes)
        } else {
            None
        };
        match clash {
            Some(name) => Err(BackupError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("two backup sources share the archive entry name '{}'", name),
            ))),
            None => Ok(()),
        }
    }

    pub fn notes_dir_name(&self) -> Result<String> {
        base_name(&self.notes_dir)
    }
}

pub(crate) fn base_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            BackupError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("path has no file name: {}", path.display()),
            ))
        })
}

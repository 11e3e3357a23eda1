use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_FOLDER_NAME: &str = "NotesManager";
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
pub const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
/// Resumable upload chunks must be a multiple of this.
pub const CHUNK_ALIGNMENT: usize = 256 * 1024;
const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Schedule {
    Minutes(u32),
    Hours(u32),
    Days(u32),
}

impl Schedule {
    pub fn as_seconds(&self) -> u64 {
        match self {
            Schedule::Minutes(n) => *n as u64 * 60,
            Schedule::Hours(n) => *n as u64 * 3600,
            Schedule::Days(n) => *n as u64 * 86400,
        }
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Schedule::Minutes(n) => write!(f, "Every {} minute(s)", n),
            Schedule::Hours(n) => write!(f, "Every {} hour(s)", n),
            Schedule::Days(n) => write!(f, "Every {} day(s)", n),
        }
    }
}

/// Local sources packaged into every backup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub database_file: PathBuf,
    pub id_file: PathBuf,
    pub notes_dir: PathBuf,
}

impl DataConfig {
    pub fn is_complete(&self) -> bool {
        !self.database_file.as_os_str().is_empty()
            && !self.id_file.as_os_str().is_empty()
            && !self.notes_dir.as_os_str().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    #[serde(default = "default_folder_name")]
    pub folder_name: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_upload_base")]
    pub upload_base: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_folder_name() -> String {
    DEFAULT_FOLDER_NAME.to_string()
}

impl DriveConfig {
    /// Chunk size rounded down to the resumable-upload alignment, never below one unit.
    pub fn aligned_chunk_size(&self) -> usize {
        let aligned = self.chunk_size - self.chunk_size % CHUNK_ALIGNMENT;
        aligned.max(CHUNK_ALIGNMENT)
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            folder_name: DEFAULT_FOLDER_NAME.to_string(),
            api_base: default_api_base(),
            upload_base: default_upload_base(),
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_api_base() -> String {
    DRIVE_API_BASE.to_string()
}

fn default_upload_base() -> String {
    DRIVE_UPLOAD_BASE.to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub client_secret_file: PathBuf,
    pub token_file: PathBuf,
    pub interactive: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let dir = super::config_dir();
        Self {
            client_secret_file: dir.join("client_secret.json"),
            token_file: dir.join("token.json"),
            interactive: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub schedule: Option<Schedule>,
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            data: DataConfig::default(),
            drive: DriveConfig::default(),
            auth: AuthConfig::default(),
            schedule: None,
        }
    }
}

//! In-process `DriveApi` used by tests.

use super::uploader::{
    DriveApi, RemoteItem, TransferStatus, UploadProgress, UploadSession, ARCHIVE_MIME_TYPE, FOLDER_MIME_TYPE,
};
use crate::auth::Credential;
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// How simulated transfers behave.
#[derive(Debug, Clone, Copy)]
pub enum TransferScript {
    Complete,
    /// End with the given status once this many chunks were accepted.
    EndAfterChunks(u32, TransferStatus),
    /// Fail at the transport level once this many chunks were accepted.
    ErrorAfterChunks(u32),
    /// Reject the next chunk with a permission error after this many.
    RejectAfterChunks(u32),
    /// Fail to re-read the local file after this many chunks.
    LocalReadErrorAfterChunks(u32),
    /// Never make progress.
    Stall,
}

struct PendingUpload {
    name: String,
    parent: String,
    chunks: u32,
}

#[derive(Default)]
struct State {
    items: Vec<RemoteItem>,
    next_id: u64,
    sessions: HashMap<String, PendingUpload>,
    calls: Vec<String>,
}

impl State {
    fn new_id(&mut self) -> String {
        self.next_id += 1;
        format!("id-{}", self.next_id)
    }
}

pub struct MemoryDrive {
    state: Mutex<State>,
    chunk_size: u64,
    script: TransferScript,
    fail_deletes: bool,
}

impl MemoryDrive {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            chunk_size: 1024 * 1024,
            script: TransferScript::Complete,
            fail_deletes: false,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_script(mut self, script: TransferScript) -> Self {
        self.script = script;
        self
    }

    pub fn failing_deletes(mut self) -> Self {
        self.fail_deletes = true;
        self
    }

    pub fn insert(&self, name: &str, mime_type: &str, parent: Option<&str>) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.new_id();
        state.items.push(RemoteItem {
            id: id.clone(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            parents: parent.map(|p| vec![p.to_string()]).unwrap_or_default(),
        });
        id
    }

    pub fn items(&self) -> Vec<RemoteItem> {
        self.state.lock().unwrap().items.clone()
    }

    /// Names of the calls made so far, e.g. `delete:id-2`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl DriveApi for MemoryDrive {
    async fn list_items(&self, _credential: &Credential) -> Result<Vec<RemoteItem>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("list".to_string());
        Ok(state.items.clone())
    }

    async fn create_folder(&self, _credential: &Credential, name: &str) -> Result<String> {
        self.state.lock().unwrap().calls.push(format!("create_folder:{}", name));
        Ok(self.insert(name, FOLDER_MIME_TYPE, None))
    }

    async fn begin_upload(
        &self,
        _credential: &Credential,
        name: &str,
        parent_id: &str,
        file_path: &Path,
    ) -> Result<UploadSession> {
        let total_bytes = std::fs::metadata(file_path)?.len();
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("begin_upload:{}", name));
        let location = format!("session-{}", state.new_id());
        state.sessions.insert(
            location.clone(),
            PendingUpload {
                name: name.to_string(),
                parent: parent_id.to_string(),
                chunks: 0,
            },
        );
        Ok(UploadSession::new(location, file_path, total_bytes))
    }

    async fn poll_upload(&self, _credential: &Credential, session: &mut UploadSession) -> Result<UploadProgress> {
        let mut state = self.state.lock().unwrap();
        let chunks = state
            .sessions
            .get(&session.location)
            .map(|p| p.chunks)
            .ok_or_else(|| BackupError::RemoteApi("unknown upload session".to_string()))?;

        match self.script {
            TransferScript::ErrorAfterChunks(n) if chunks >= n => {
                return Err(BackupError::Transport("connection reset".to_string()));
            }
            TransferScript::RejectAfterChunks(n) if chunks >= n => {
                return Err(BackupError::RemoteApi("403 Forbidden - insufficient permissions".to_string()));
            }
            TransferScript::LocalReadErrorAfterChunks(n) if chunks >= n => {
                return Err(BackupError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "archive is no longer readable",
                )));
            }
            TransferScript::EndAfterChunks(n, status) if chunks >= n => {
                state.sessions.remove(&session.location);
                return Ok(UploadProgress {
                    bytes_sent: session.bytes_sent,
                    status,
                });
            }
            TransferScript::Stall => {
                return Ok(UploadProgress {
                    bytes_sent: session.bytes_sent,
                    status: TransferStatus::Pending,
                });
            }
            _ => {}
        }

        session.bytes_sent = (session.bytes_sent + self.chunk_size).min(session.total_bytes);
        if let Some(pending) = state.sessions.get_mut(&session.location) {
            pending.chunks += 1;
        }

        if session.bytes_sent < session.total_bytes {
            return Ok(UploadProgress {
                bytes_sent: session.bytes_sent,
                status: TransferStatus::Pending,
            });
        }

        if let Some(pending) = state.sessions.remove(&session.location) {
            let id = state.new_id();
            state.items.push(RemoteItem {
                id,
                name: pending.name,
                mime_type: ARCHIVE_MIME_TYPE.to_string(),
                parents: vec![pending.parent],
            });
        }
        Ok(UploadProgress {
            bytes_sent: session.bytes_sent,
            status: TransferStatus::Completed,
        })
    }

    async fn delete_item(&self, _credential: &Credential, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete:{}", id));
        if self.fail_deletes {
            return Err(BackupError::RemoteApi("insufficient permissions".to_string()));
        }
        let before = state.items.len();
        state.items.retain(|item| item.id != id);
        if state.items.len() == before {
            return Err(BackupError::RemoteApi(format!("File not found: {}", id)));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Memory"
    }
}

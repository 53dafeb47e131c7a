//! File-per-session persistence under a single storage root.
//!
//! Layout: `<root>/conversations/<session>.json` and
//! `<root>/pending/<session>.json`. Writes go through a temp file and an
//! atomic rename, so readers never observe a half-written document. The
//! port is infallible; storage failures are logged and degrade to an empty
//! history or a missing record.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde_json::Value;

use crate::core::agent::pending::PendingRecord;
use crate::core::message::{history_from_value, ChatTurn};
use crate::core::ports::store::StorePort;

const RETENTION_FILE_THRESHOLD: usize = 100;
const RETENTION_MAX_AGE: Duration = Duration::from_secs(4 * 3600);

pub struct FileStore {
    conversations: PathBuf,
    pending: PathBuf,
}

/// Session ids come from the outside world; anything that is not a path-safe
/// character becomes an underscore before it touches the filesystem.
fn sanitize_session_id(session_id: &str) -> String {
    let safe: String = session_id
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if safe.is_empty() {
        "session".to_string()
    } else {
        safe
    }
}

fn write_atomic(path: &Path, contents: &str) {
    let tmp = path.with_extension("json.tmp");
    if let Err(err) = fs::write(&tmp, contents) {
        log::error!("cannot write {}: {err}", tmp.display());
        return;
    }
    if let Err(err) = fs::rename(&tmp, path) {
        log::error!("cannot move {} into place: {err}", tmp.display());
        let _ = fs::remove_file(&tmp);
    }
}

/// Deletes stale files once a directory grows past the threshold. Sessions
/// on a voice platform are short; anything older than the retention window
/// is abandoned.
fn prune_stale(dir: &Path) {
    let Ok(entries) = fs::read_dir(dir) else { return };
    let files: Vec<_> = entries.flatten().collect();
    if files.len() <= RETENTION_FILE_THRESHOLD {
        return;
    }

    let now = SystemTime::now();
    let mut removed = 0usize;
    for entry in files {
        let stale = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .is_some_and(|age| age > RETENTION_MAX_AGE);
        if stale && fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }
    if removed > 0 {
        log::info!("pruned {removed} stale files from {}", dir.display());
    }
}

impl FileStore {
    pub fn new(root: &Path) -> std::io::Result<Self> {
        let conversations = root.join("conversations");
        let pending = root.join("pending");
        fs::create_dir_all(&conversations)?;
        fs::create_dir_all(&pending)?;
        Ok(Self {
            conversations,
            pending,
        })
    }

    fn conversation_path(&self, session_id: &str) -> PathBuf {
        self.conversations
            .join(format!("{}.json", sanitize_session_id(session_id)))
    }

    fn pending_path(&self, session_id: &str) -> PathBuf {
        self.pending
            .join(format!("{}.json", sanitize_session_id(session_id)))
    }
}

impl StorePort for FileStore {
    fn load_conversation(&self, session_id: &str) -> Vec<ChatTurn> {
        let path = self.conversation_path(session_id);
        let Ok(raw) = fs::read_to_string(&path) else {
            return Vec::new();
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(data) => history_from_value(&data),
            Err(err) => {
                log::warn!("discarding corrupt conversation {}: {err}", path.display());
                Vec::new()
            }
        }
    }

    fn save_conversation(&self, session_id: &str, history: &[ChatTurn]) {
        match serde_json::to_string(history) {
            Ok(encoded) => {
                write_atomic(&self.conversation_path(session_id), &encoded);
                prune_stale(&self.conversations);
            }
            Err(err) => log::error!("cannot encode conversation: {err}"),
        }
    }

    fn clear_conversation(&self, session_id: &str) {
        let _ = fs::remove_file(self.conversation_path(session_id));
    }

    fn load_pending(&self, session_id: &str) -> Option<PendingRecord> {
        let path = self.pending_path(session_id);
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(err) => {
                log::warn!("discarding corrupt pending record {}: {err}", path.display());
                None
            }
        }
    }

    fn save_pending(&self, session_id: &str, record: &PendingRecord) {
        match serde_json::to_string(record) {
            Ok(encoded) => {
                write_atomic(&self.pending_path(session_id), &encoded);
                prune_stale(&self.pending);
            }
            Err(err) => log::error!("cannot encode pending record: {err}"),
        }
    }

    fn clear_pending(&self, session_id: &str) {
        let _ = fs::remove_file(self.pending_path(session_id));
    }
}

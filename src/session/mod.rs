//! Per-session state
//!
//! A `SessionState` is created when a session starts and dropped when it
//! ends. Handlers receive it by `&mut`, so at most one exchange can touch a
//! session's conversation at a time and no two sessions ever share a log.

pub mod conversation;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::upload::UploadContext;
pub use conversation::{ConversationLog, Role, Turn};

/// State owned by one chat session
#[derive(Debug)]
pub struct SessionState {
    id: Uuid,
    started_at: DateTime<Utc>,
    log: ConversationLog,
    upload: Option<UploadContext>,
    exchanges: usize,
    failures: usize,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            log: ConversationLog::new(),
            upload: None,
            exchanges: 0,
            failures: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    /// Record a turn in this session's conversation
    pub fn append(&mut self, turn: Turn) {
        self.log.append(turn);
    }

    /// Stage an uploaded file for the following exchanges
    pub fn attach(&mut self, upload: UploadContext) {
        self.upload = Some(upload);
    }

    /// Drop the staged upload, returning it if there was one
    pub fn detach(&mut self) -> Option<UploadContext> {
        self.upload.take()
    }

    pub fn upload(&self) -> Option<&UploadContext> {
        self.upload.as_ref()
    }

    pub(crate) fn record_exchange(&mut self, succeeded: bool) {
        self.exchanges += 1;
        if !succeeded {
            self.failures += 1;
        }
    }

    /// Exchanges attempted in this session
    pub fn exchange_count(&self) -> usize {
        self.exchanges
    }

    pub fn failure_count(&self) -> usize {
        self.failures
    }

    /// Session age in seconds
    pub fn duration_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

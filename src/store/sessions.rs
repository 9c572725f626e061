//! Session store: create, read, save, list, delete
//!
//! Each session lives in `{data_dir}/sessions/{chat_id}.json`. The store
//! enforces the minimum-word-count constraint at creation and an
//! optimistic-concurrency check (version compare-and-swap) on save, since
//! background phase continuations and manual retries can touch the same
//! session.

use super::{ensure_dir, read_json, write_json, StoreError};
use crate::models::{Session, SessionMetadata, MIN_PROBLEM_WORDS};
use crate::utils::word_count;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One page of a session listing
#[derive(Debug)]
pub struct SessionPage {
    pub sessions: Vec<Session>,
    pub total: usize,
}

#[derive(Clone)]
pub struct SessionStore {
    data_dir: PathBuf,
}

impl SessionStore {
    /// Open (or initialize) a store rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        let store = Self { data_dir };
        ensure_dir(&store.sessions_dir()).map_err(StoreError::Io)?;
        Ok(store)
    }

    fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join("sessions")
    }

    fn session_path(&self, chat_id: &str) -> PathBuf {
        self.sessions_dir().join(format!("{}.json", chat_id))
    }

    /// Create a new session for a problem statement.
    ///
    /// Fails with a validation error when the statement is under
    /// [`MIN_PROBLEM_WORDS`] words. The session starts with phase 1 already
    /// processing.
    pub fn create(
        &self,
        problem_statement: &str,
        user_email: Option<String>,
        metadata: SessionMetadata,
    ) -> Result<Session, StoreError> {
        let trimmed = problem_statement.trim();
        let words = word_count(trimmed);
        if words < MIN_PROBLEM_WORDS {
            return Err(StoreError::Validation {
                min: MIN_PROBLEM_WORDS,
                actual: words,
            });
        }

        let chat_id = Uuid::new_v4().to_string();
        let session = Session::new(chat_id, trimmed.to_string(), user_email, metadata);

        write_json(&self.session_path(&session.chat_id), &session).map_err(StoreError::Io)?;
        Ok(session)
    }

    pub fn exists(&self, chat_id: &str) -> bool {
        self.session_path(chat_id).exists()
    }

    /// Read a session by chat id
    pub fn get(&self, chat_id: &str) -> Result<Session, StoreError> {
        let path = self.session_path(chat_id);
        if !path.exists() {
            return Err(StoreError::NotFound);
        }
        read_json(&path).map_err(StoreError::Io)
    }

    /// Persist a session, checking that nobody else saved in between.
    ///
    /// The session's `version` must match the version on disk; on success
    /// the version is bumped and written back. A mismatch means a concurrent
    /// writer got there first and surfaces as [`StoreError::Conflict`].
    pub fn save(&self, session: &mut Session) -> Result<(), StoreError> {
        let path = self.session_path(&session.chat_id);
        if !path.exists() {
            return Err(StoreError::NotFound);
        }

        let on_disk: Session = read_json(&path).map_err(StoreError::Io)?;
        if on_disk.version != session.version {
            return Err(StoreError::Conflict {
                chat_id: session.chat_id.clone(),
                expected: session.version,
                found: on_disk.version,
            });
        }

        session.version += 1;
        session.touch();
        write_json(&path, session).map_err(StoreError::Io)
    }

    /// Re-load a session, apply a mutation, and save with the concurrency
    /// check, retrying the whole read-modify-write on conflict.
    ///
    /// This is what background continuations use so a lost race never
    /// silently clobbers another writer's fields.
    pub fn update<F>(&self, chat_id: &str, mut apply: F) -> Result<Session, StoreError>
    where
        F: FnMut(&mut Session),
    {
        const MAX_ATTEMPTS: u32 = 3;

        let mut last_conflict = None;
        for _ in 0..MAX_ATTEMPTS {
            let mut session = self.get(chat_id)?;
            apply(&mut session);
            match self.save(&mut session) {
                Ok(()) => return Ok(session),
                Err(StoreError::Conflict {
                    chat_id,
                    expected,
                    found,
                }) => {
                    log::warn!(
                        "Concurrent save on session {} (expected v{}, found v{}); retrying",
                        chat_id,
                        expected,
                        found
                    );
                    last_conflict = Some(StoreError::Conflict {
                        chat_id,
                        expected,
                        found,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_conflict.unwrap_or(StoreError::NotFound))
    }

    /// List sessions newest-first, optionally filtered by owner email,
    /// with 1-based pagination
    pub fn list(
        &self,
        user_email: Option<&str>,
        page: usize,
        page_size: usize,
    ) -> Result<SessionPage, StoreError> {
        let dir = self.sessions_dir();
        if !dir.exists() {
            return Ok(SessionPage {
                sessions: Vec::new(),
                total: 0,
            });
        }

        let entries = fs::read_dir(&dir)
            .map_err(|e| StoreError::Io(format!("Failed to read sessions directory: {}", e)))?;

        let mut sessions: Vec<Session> = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                // Skip unreadable or non-session files
                match read_json::<Session>(&path) {
                    Ok(session) => sessions.push(session),
                    Err(e) => log::warn!("Skipping unreadable session file: {}", e),
                }
            }
        }

        if let Some(email) = user_email {
            sessions.retain(|s| s.user_email.as_deref() == Some(email));
        }

        // Newest first
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = sessions.len();
        let page = page.max(1);
        let start = (page - 1).saturating_mul(page_size);
        let sessions = sessions.into_iter().skip(start).take(page_size).collect();

        Ok(SessionPage { sessions, total })
    }

    /// Hard-delete a session document
    pub fn delete(&self, chat_id: &str) -> Result<(), StoreError> {
        let path = self.session_path(chat_id);
        if !path.exists() {
            return Err(StoreError::NotFound);
        }
        fs::remove_file(&path)
            .map_err(|e| StoreError::Io(format!("Failed to delete session file: {}", e)))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

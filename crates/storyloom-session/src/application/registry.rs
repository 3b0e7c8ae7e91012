//! In-memory session registry.
//!
//! Every loaded session lives in a [`SessionCell`]. Engine mutations run to
//! completion under the cell's lock and never suspend, so readers always see
//! a whole transition. The `busy` flag is claimed through [`BusyGuard`], which
//! releases it on drop so every exit path of a posting attempt frees the slot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use storyloom_core::aggregate::AggregateRoot;
use storyloom_core::error::DomainError;
use storyloom_core::ids::SessionId;
use tracing::info;

use crate::domain::aggregates::{Session, SessionSnapshot};
use crate::domain::events::SessionEvent;
use crate::domain::repository::SessionRepository;

/// Shared handle to one live session.
pub type SessionHandle = Arc<SessionCell>;

/// A live session behind a lock.
#[derive(Debug)]
pub struct SessionCell {
    session: Mutex<Session>,
}

/// Result of a committed mutation: the handler's value, the snapshot to
/// persist and the events to announce.
pub type Mutation<R> = (R, SessionSnapshot, Vec<SessionEvent>);

impl SessionCell {
    /// Wraps a session.
    #[must_use]
    pub fn new(session: Session) -> SessionHandle {
        Arc::new(Self {
            session: Mutex::new(session),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` against the session without mutating it.
    pub fn read<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        f(&self.lock())
    }

    /// Runs `f` against the session and drains the events it produced.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns. Aggregate methods leave the session
    /// unchanged when they fail.
    pub fn mutate<R>(
        &self,
        f: impl FnOnce(&mut Session) -> Result<R, DomainError>,
    ) -> Result<Mutation<R>, DomainError> {
        let mut session = self.lock();
        let value = f(&mut session)?;
        let events = session.take_uncommitted_events();
        Ok((value, session.snapshot(), events))
    }

    /// Claims the session's posting slot. Returns `None` when another attempt
    /// already holds it.
    #[must_use]
    pub fn try_begin_posting(self: &Arc<Self>) -> Option<BusyGuard> {
        if self.lock().try_mark_busy() {
            Some(BusyGuard {
                cell: Arc::clone(self),
            })
        } else {
            None
        }
    }
}

/// Owns a session's posting slot until dropped.
#[derive(Debug)]
pub struct BusyGuard {
    cell: SessionHandle,
}

impl BusyGuard {
    /// The session this guard belongs to.
    #[must_use]
    pub fn session(&self) -> &SessionHandle {
        &self.cell
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.cell.lock().clear_busy();
    }
}

/// Every live session, keyed by id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session, replacing any previous entry with the same id.
    pub fn insert(&self, session: Session) -> SessionHandle {
        let id = session.id;
        let handle = SessionCell::new(session);
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::clone(&handle));
        handle
    }

    /// Looks up a live session.
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<SessionHandle> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Looks up a live session.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the session is not loaded.
    pub fn require(&self, id: SessionId) -> Result<SessionHandle, DomainError> {
        self.get(id)
            .ok_or_else(|| DomainError::not_found("session", id))
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no session is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loads every persisted session. Returns how many were loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot list sessions.
    pub async fn load_all(&self, repo: &dyn SessionRepository) -> Result<usize, DomainError> {
        let snapshots = repo.find_all().await?;
        let count = snapshots.len();
        for snapshot in snapshots {
            self.insert(Session::restore(snapshot));
        }
        info!(count, "loaded sessions");
        Ok(count)
    }
}

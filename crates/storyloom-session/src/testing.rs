//! In-memory and failing session repositories for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use storyloom_core::error::DomainError;
use storyloom_core::ids::SessionId;

use crate::domain::aggregates::SessionSnapshot;
use crate::domain::repository::SessionRepository;

/// Keeps session snapshots in a map.
#[derive(Debug, Default)]
pub struct InMemorySessionRepository {
    sessions: Mutex<HashMap<SessionId, SessionSnapshot>>,
}

impl InMemorySessionRepository {
    /// Creates a repository pre-populated with `sessions`.
    #[must_use]
    pub fn with(sessions: impl IntoIterator<Item = SessionSnapshot>) -> Self {
        Self {
            sessions: Mutex::new(sessions.into_iter().map(|s| (s.id, s)).collect()),
        }
    }

    /// Returns a stored snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<SessionSnapshot> {
        self.sessions.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create(&self, session: &SessionSnapshot) -> Result<(), DomainError> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn find(&self, id: SessionId) -> Result<Option<SessionSnapshot>, DomainError> {
        Ok(self.get(id))
    }

    async fn find_all(&self) -> Result<Vec<SessionSnapshot>, DomainError> {
        Ok(self.sessions.lock().unwrap().values().cloned().collect())
    }

    async fn update(&self, session: &SessionSnapshot) -> Result<(), DomainError> {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get_mut(&session.id) {
            Some(stored) if stored.version < session.version => {
                *stored = session.clone();
                Ok(())
            }
            Some(_) => Ok(()),
            None => Err(DomainError::not_found("session", session.id)),
        }
    }
}

/// A repository whose every call fails with an infrastructure error.
#[derive(Debug, Default)]
pub struct FailingSessionRepository;

#[async_trait]
impl SessionRepository for FailingSessionRepository {
    async fn create(&self, _session: &SessionSnapshot) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("session store unavailable".to_owned()))
    }

    async fn find(&self, _id: SessionId) -> Result<Option<SessionSnapshot>, DomainError> {
        Err(DomainError::Infrastructure("session store unavailable".to_owned()))
    }

    async fn find_all(&self) -> Result<Vec<SessionSnapshot>, DomainError> {
        Err(DomainError::Infrastructure("session store unavailable".to_owned()))
    }

    async fn update(&self, _session: &SessionSnapshot) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("session store unavailable".to_owned()))
    }
}

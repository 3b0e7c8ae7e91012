//! Panel-refresh notifications.
//!
//! Collaborators that render turn-order panels subscribe here and redraw on
//! every `PanelRefresh`. Section breaks are forwarded separately so a
//! subscriber can print the heading without diffing state.

use serde::Serialize;
use storyloom_core::ids::SessionId;
use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::events::{SessionEvent, SessionEventKind};

const NOTICE_CAPACITY: usize = 64;

/// A notice published after a session mutation is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionNotice {
    /// The session's panel should be redrawn.
    PanelRefresh {
        /// The session that changed.
        session_id: SessionId,
        /// Session version after the change.
        version: i64,
    },
    /// An act or chapter began.
    SectionBreak {
        /// The session that changed.
        session_id: SessionId,
        /// Rendered heading.
        heading: String,
    },
}

impl SessionNotice {
    /// The session the notice is about.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::PanelRefresh { session_id, .. } | Self::SectionBreak { session_id, .. } => {
                *session_id
            }
        }
    }
}

/// Fan-out of session notices to any number of subscribers.
#[derive(Debug, Clone)]
pub struct SessionNotifier {
    sender: broadcast::Sender<SessionNotice>,
}

impl Default for SessionNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionNotifier {
    /// Creates a notifier with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(NOTICE_CAPACITY);
        Self { sender }
    }

    /// Subscribes to every future notice.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotice> {
        self.sender.subscribe()
    }

    /// Announces committed events: one section-break notice per break and a
    /// single panel refresh for the batch.
    pub fn publish(&self, events: &[SessionEvent]) {
        let Some(last) = events.last() else {
            return;
        };

        for event in events {
            if let SessionEventKind::SectionBreak(section) = &event.kind {
                self.send(SessionNotice::SectionBreak {
                    session_id: section.session_id,
                    heading: section.heading(),
                });
            }
        }

        self.send(SessionNotice::PanelRefresh {
            session_id: SessionId::from_uuid(last.metadata.aggregate_id),
            version: last.metadata.version,
        });
    }

    fn send(&self, notice: SessionNotice) {
        if self.sender.send(notice).is_err() {
            debug!("no notice subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use storyloom_core::color::Color;
    use storyloom_core::ids::{ChannelId, CharacterId, GuildId, MemberId};
    use storyloom_test_support::FixedClock;
    use uuid::Uuid;

    use super::*;
    use crate::domain::aggregates::{Session, SessionProfile};
    use storyloom_core::aggregate::AggregateRoot;

    #[test]
    fn test_publish_sends_section_break_before_refresh() {
        // Arrange
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap());
        let mut session = Session::create(
            SessionId::new(),
            SessionProfile {
                name: "Ashes of Vell".to_owned(),
                description: String::new(),
                guild: GuildId::new("guild-1"),
                gm_member: MemberId::new("gm-1"),
                color: Color::WHITE,
                channel: ChannelId::new("story"),
            },
            CharacterId::new(),
            Uuid::new_v4(),
            &clock,
        );
        session.take_uncommitted_events();
        session.increment_chapter(Some("The Descent".to_owned()), Uuid::new_v4(), &clock);
        let events = session.take_uncommitted_events();
        let notifier = SessionNotifier::new();
        let mut receiver = notifier.subscribe();

        // Act
        notifier.publish(&events);

        // Assert
        assert_eq!(
            receiver.try_recv().unwrap(),
            SessionNotice::SectionBreak {
                session_id: session.id,
                heading: "Chapter 1: The Descent".to_owned(),
            }
        );
        assert_eq!(
            receiver.try_recv().unwrap(),
            SessionNotice::PanelRefresh {
                session_id: session.id,
                version: 2,
            }
        );
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let notifier = SessionNotifier::new();

        notifier.publish(&[]);
    }
}

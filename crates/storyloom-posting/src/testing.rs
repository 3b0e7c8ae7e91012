//! Scripted messaging surface and in-memory post log for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use storyloom_core::error::DomainError;
use storyloom_core::ids::{ChannelId, CharacterId, MemberId, MessageRef, PostId, SessionId};

use crate::domain::messaging::{
    Attachment, CharacterChoice, MemberProfile, MessagingSurface, OutgoingMessage,
    PublishedMessage, Reply,
};
use crate::domain::post::PostRecord;
use crate::domain::repository::PostRepository;

/// A message sent through [`ScriptedMessaging`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Reference handed back to the caller.
    pub reference: MessageRef,
    /// Where it was sent.
    pub channel: ChannelId,
    /// What was sent.
    pub message: OutgoingMessage,
}

#[derive(Debug)]
enum Scripted {
    Reply(Reply),
    Silence,
}

#[derive(Debug, Default)]
struct Script {
    choice: Option<Option<CharacterId>>,
    replies: VecDeque<Scripted>,
    attachments: HashMap<String, Result<String, String>>,
    sent: Vec<SentMessage>,
    live: HashMap<MessageRef, String>,
    edits: Vec<(MessageRef, String)>,
    deleted: Vec<MessageRef>,
    private: Vec<(MemberId, String)>,
    send_limit: Option<usize>,
    next_ref: u64,
}

/// A messaging surface driven by a script of user behaviour.
///
/// Replies are handed out in the order they were pushed. Once the script runs
/// dry (or reaches a silence) the wait never completes, so callers' timeouts
/// decide the outcome.
#[derive(Debug, Default)]
pub struct ScriptedMessaging {
    script: Mutex<Script>,
}

impl ScriptedMessaging {
    /// An empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the answer to every character selection.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn choose(&self, choice: Option<CharacterId>) {
        self.script.lock().unwrap().choice = Some(choice);
    }

    /// Queues a reply.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn push_reply(&self, reply: Reply) {
        self.script
            .lock()
            .unwrap()
            .replies
            .push_back(Scripted::Reply(reply));
    }

    /// Queues a wait that never gets an answer.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn push_silence(&self) {
        self.script.lock().unwrap().replies.push_back(Scripted::Silence);
    }

    /// Sets what fetching the attachment at `url` yields.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn attachment(&self, url: &str, text: Result<String, String>) {
        self.script
            .lock()
            .unwrap()
            .attachments
            .insert(url.to_owned(), text);
    }

    /// Makes every send after the first `count` fail.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_sends_after(&self, count: usize) {
        self.script.lock().unwrap().send_limit = Some(count);
    }

    /// Deletes a message behind the caller's back.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn forget(&self, reference: &MessageRef) {
        self.script.lock().unwrap().live.remove(reference);
    }

    /// Every message sent so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.script.lock().unwrap().sent.clone()
    }

    /// The message sent under `reference`, ignoring later edits.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn message(&self, reference: &MessageRef) -> Option<OutgoingMessage> {
        self.script
            .lock()
            .unwrap()
            .sent
            .iter()
            .find(|m| &m.reference == reference)
            .map(|m| m.message.clone())
    }

    /// Messages sent to `channel` under a character's name.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn authored_in(&self, channel: &ChannelId) -> Vec<OutgoingMessage> {
        self.script
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter(|m| &m.channel == channel && m.message.author.is_some())
            .map(|m| m.message.clone())
            .collect()
    }

    /// Edits applied so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn edits(&self) -> Vec<(MessageRef, String)> {
        self.script.lock().unwrap().edits.clone()
    }

    /// Messages deleted through the surface.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn deleted(&self) -> Vec<MessageRef> {
        self.script.lock().unwrap().deleted.clone()
    }

    /// Private messages sent so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn private_messages(&self) -> Vec<(MemberId, String)> {
        self.script.lock().unwrap().private.clone()
    }
}

#[async_trait]
impl MessagingSurface for ScriptedMessaging {
    async fn send_message(
        &self,
        channel: &ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageRef, DomainError> {
        let mut script = self.script.lock().unwrap();
        if script.send_limit.is_some_and(|limit| script.sent.len() >= limit) {
            return Err(DomainError::Messaging("send rejected".to_owned()));
        }
        script.next_ref += 1;
        let reference = MessageRef::new(format!("msg-{}", script.next_ref));
        script.live.insert(reference.clone(), message.body.clone());
        script.sent.push(SentMessage {
            reference: reference.clone(),
            channel: channel.clone(),
            message,
        });
        Ok(reference)
    }

    async fn edit_message(&self, message: &MessageRef, body: String) -> Result<(), DomainError> {
        let mut guard = self.script.lock().unwrap();
        let script = &mut *guard;
        match script.live.get_mut(message) {
            Some(stored) => {
                stored.clone_from(&body);
                script.edits.push((message.clone(), body));
                Ok(())
            }
            None => Err(DomainError::Messaging(format!("unknown message {message}"))),
        }
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<bool, DomainError> {
        let mut script = self.script.lock().unwrap();
        if script.live.remove(message).is_some() {
            script.deleted.push(message.clone());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn fetch_message(
        &self,
        message: &MessageRef,
    ) -> Result<Option<PublishedMessage>, DomainError> {
        Ok(self
            .script
            .lock()
            .unwrap()
            .live
            .get(message)
            .map(|body| PublishedMessage {
                reference: message.clone(),
                body: body.clone(),
            }))
    }

    async fn await_reply(
        &self,
        _channel: &ChannelId,
        _member: &MemberId,
    ) -> Result<Option<Reply>, DomainError> {
        let next = self.script.lock().unwrap().replies.pop_front();
        match next {
            Some(Scripted::Reply(reply)) => Ok(Some(reply)),
            Some(Scripted::Silence) | None => std::future::pending().await,
        }
    }

    async fn choose_character(
        &self,
        _channel: &ChannelId,
        _member: &MemberId,
        _options: &[CharacterChoice],
    ) -> Result<Option<CharacterId>, DomainError> {
        let choice = self.script.lock().unwrap().choice;
        match choice {
            Some(choice) => Ok(choice),
            None => std::future::pending().await,
        }
    }

    async fn fetch_attachment_text(&self, attachment: &Attachment) -> Result<String, DomainError> {
        self.script
            .lock()
            .unwrap()
            .attachments
            .get(&attachment.url)
            .cloned()
            .unwrap_or_else(|| Err(format!("no file at {}", attachment.url)))
            .map_err(DomainError::AttachmentFetchFailed)
    }

    async fn send_private(&self, member: &MemberId, body: String) -> Result<(), DomainError> {
        self.script
            .lock()
            .unwrap()
            .private
            .push((member.clone(), body));
        Ok(())
    }

    async fn resolve_member(&self, member: &MemberId) -> Result<MemberProfile, DomainError> {
        Ok(MemberProfile {
            member: member.clone(),
            display_name: format!("@{member}"),
            avatar_url: None,
        })
    }
}

/// Keeps post records in creation order.
#[derive(Debug, Default)]
pub struct InMemoryPostRepository {
    posts: Mutex<Vec<PostRecord>>,
}

impl InMemoryPostRepository {
    /// The most recently created record across all sessions.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn latest(&self) -> Option<PostRecord> {
        self.posts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn create(&self, post: &PostRecord) -> Result<(), DomainError> {
        self.posts.lock().unwrap().push(post.clone());
        Ok(())
    }

    async fn find_latest_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Option<PostRecord>, DomainError> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|p| p.session_id == session_id)
            .cloned())
    }

    async fn destroy(&self, id: PostId) -> Result<bool, DomainError> {
        let mut posts = self.posts.lock().unwrap();
        let before = posts.len();
        posts.retain(|p| p.id != id);
        Ok(posts.len() != before)
    }
}

/// A post log whose writes always fail.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingPostRepository;

#[async_trait]
impl PostRepository for FailingPostRepository {
    async fn create(&self, _post: &PostRecord) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("post log unavailable".to_owned()))
    }

    async fn find_latest_for_session(
        &self,
        _session_id: SessionId,
    ) -> Result<Option<PostRecord>, DomainError> {
        Ok(None)
    }

    async fn destroy(&self, _id: PostId) -> Result<bool, DomainError> {
        Err(DomainError::Infrastructure("post log unavailable".to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deleting_twice_reports_already_gone() {
        let messaging = ScriptedMessaging::new();
        let reference = messaging
            .send_message(&ChannelId::new("story"), OutgoingMessage::plain("hi"))
            .await
            .unwrap();

        assert!(messaging.delete_message(&reference).await.unwrap());
        assert!(!messaging.delete_message(&reference).await.unwrap());
        assert_eq!(messaging.deleted(), vec![reference]);
    }
}

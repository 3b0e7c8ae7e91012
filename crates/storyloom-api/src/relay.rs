//! Relay messaging surface.
//!
//! Outgoing traffic is written to the relay outbox for a chat bridge to
//! deliver. Inbound replies arrive over HTTP and are handed to whichever
//! posting attempt is waiting on that channel and member.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use storyloom_core::clock::Clock;
use storyloom_core::error::DomainError;
use storyloom_core::ids::{ChannelId, CharacterId, MemberId, MessageRef};
use storyloom_posting::domain::messaging::{
    Attachment, CharacterChoice, MemberProfile, MessagingSurface, OutgoingMessage,
    PublishedMessage, Reply,
};
use storyloom_store::relay_outbox::{OutboxEntry, OutboxTarget, RelayOutbox};
use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

type WaiterKey = (ChannelId, MemberId);
type Waiters = Mutex<HashMap<WaiterKey, oneshot::Sender<Reply>>>;

/// A registered reply waiter. Dropping it, on delivery or on timeout,
/// removes its entry unless a newer waiter has taken the key.
struct PendingReply<'a> {
    waiters: &'a Waiters,
    key: WaiterKey,
    receiver: oneshot::Receiver<Reply>,
}

impl Drop for PendingReply<'_> {
    fn drop(&mut self) {
        self.receiver.close();
        let mut waiters = self.waiters.lock().unwrap_or_else(PoisonError::into_inner);
        if waiters.get(&self.key).is_some_and(oneshot::Sender::is_closed) {
            waiters.remove(&self.key);
        }
    }
}

/// [`MessagingSurface`] backed by the relay outbox.
pub struct RelayMessaging {
    outbox: Arc<dyn RelayOutbox>,
    clock: Arc<dyn Clock>,
    http: reqwest::Client,
    waiters: Waiters,
}

impl RelayMessaging {
    /// Creates a relay writing to `outbox`.
    #[must_use]
    pub fn new(outbox: Arc<dyn RelayOutbox>, clock: Arc<dyn Clock>) -> Self {
        Self {
            outbox,
            clock,
            http: reqwest::Client::new(),
            waiters: Mutex::new(HashMap::new()),
        }
    }

    /// Hands `reply` to the attempt waiting on `member` in `channel`.
    /// Returns `false` when nobody is waiting.
    pub fn deliver_reply(&self, channel: &ChannelId, member: &MemberId, reply: Reply) -> bool {
        let waiter = self
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(channel.clone(), member.clone()));
        match waiter {
            Some(sender) => sender.send(reply).is_ok(),
            None => false,
        }
    }

    /// Whether an attempt is waiting on `member` in `channel`.
    #[must_use]
    pub fn is_waiting(&self, channel: &ChannelId, member: &MemberId) -> bool {
        self.waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(channel.clone(), member.clone()))
            .is_some_and(|sender| !sender.is_closed())
    }

    /// Live messages of `channel`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns the outbox's persistence error.
    pub async fn channel_messages(&self, channel: &ChannelId) -> Result<Vec<OutboxEntry>, DomainError> {
        self.outbox.list_channel(channel).await
    }

    async fn write(&self, target: OutboxTarget, message: OutgoingMessage) -> Result<MessageRef, DomainError> {
        let entry = OutboxEntry {
            reference: MessageRef::new(Uuid::now_v7().to_string()),
            target,
            body: message.body,
            author: message.author,
            footer: message.footer,
            deleted: false,
            created_at: self.clock.now(),
        };
        self.outbox.append(&entry).await?;
        Ok(entry.reference)
    }
}

fn choice_prompt(options: &[CharacterChoice]) -> String {
    let mut body = String::from("Which character is posting? Reply with a number or a name.");
    for (index, option) in options.iter().enumerate() {
        body.push_str(&format!("\n{}. {}", index + 1, option.name));
    }
    body
}

fn parse_choice(answer: &str, options: &[CharacterChoice]) -> Option<CharacterId> {
    let answer = answer.trim();
    if let Ok(index) = answer.parse::<usize>() {
        return index
            .checked_sub(1)
            .and_then(|i| options.get(i))
            .map(|option| option.id);
    }
    options
        .iter()
        .find(|option| option.name.eq_ignore_ascii_case(answer))
        .map(|option| option.id)
}

#[async_trait]
impl MessagingSurface for RelayMessaging {
    #[instrument(skip_all, fields(channel = %channel))]
    async fn send_message(
        &self,
        channel: &ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageRef, DomainError> {
        self.write(OutboxTarget::Channel(channel.clone()), message).await
    }

    async fn edit_message(&self, message: &MessageRef, body: String) -> Result<(), DomainError> {
        if self.outbox.edit(message, &body).await? {
            Ok(())
        } else {
            Err(DomainError::Messaging(format!("message {message} cannot be edited")))
        }
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<bool, DomainError> {
        self.outbox.mark_deleted(message).await
    }

    async fn fetch_message(
        &self,
        message: &MessageRef,
    ) -> Result<Option<PublishedMessage>, DomainError> {
        Ok(self
            .outbox
            .find(message)
            .await?
            .filter(|entry| !entry.deleted)
            .map(|entry| PublishedMessage {
                reference: entry.reference,
                body: entry.body,
            }))
    }

    async fn await_reply(
        &self,
        channel: &ChannelId,
        member: &MemberId,
    ) -> Result<Option<Reply>, DomainError> {
        let (sender, receiver) = oneshot::channel();
        let key = (channel.clone(), member.clone());
        let replaced = self
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), sender);
        if replaced.is_some() {
            debug!(channel = %channel, member = %member, "replaced a stale reply waiter");
        }
        let mut pending = PendingReply {
            waiters: &self.waiters,
            key,
            receiver,
        };
        Ok((&mut pending.receiver).await.ok())
    }

    #[instrument(skip_all, fields(channel = %channel, options = options.len()))]
    async fn choose_character(
        &self,
        channel: &ChannelId,
        member: &MemberId,
        options: &[CharacterChoice],
    ) -> Result<Option<CharacterId>, DomainError> {
        let prompt = self
            .send_message(channel, OutgoingMessage::plain(choice_prompt(options)))
            .await?;
        let chosen = loop {
            let Some(reply) = self.await_reply(channel, member).await? else {
                break None;
            };
            match parse_choice(&reply.content, options) {
                Some(id) => break Some(id),
                None => debug!(answer = %reply.content, "unrecognised character choice"),
            }
        };
        if let Err(e) = self.delete_message(&prompt).await {
            warn!(error = %e, "failed to remove character prompt");
        }
        Ok(chosen)
    }

    #[instrument(skip_all, fields(file_name = %attachment.file_name))]
    async fn fetch_attachment_text(&self, attachment: &Attachment) -> Result<String, DomainError> {
        let failed = |reason: String| DomainError::AttachmentFetchFailed(reason);
        let response = self
            .http
            .get(&attachment.url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?
            .error_for_status()
            .map_err(|e| failed(e.to_string()))?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        if !content_type.starts_with("text/plain") {
            return Err(failed(format!(
                "{} is {content_type:?}, not a plain-text file",
                attachment.file_name
            )));
        }
        response.text().await.map_err(|e| failed(e.to_string()))
    }

    async fn send_private(&self, member: &MemberId, body: String) -> Result<(), DomainError> {
        self.write(OutboxTarget::Member(member.clone()), OutgoingMessage::plain(body))
            .await
            .map(|_| ())
    }

    async fn resolve_member(&self, member: &MemberId) -> Result<MemberProfile, DomainError> {
        Ok(MemberProfile {
            member: member.clone(),
            display_name: format!("<@{member}>"),
            avatar_url: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use storyloom_store::testing::InMemoryRelayOutbox;
    use storyloom_test_support::FixedClock;

    use super::*;

    fn relay() -> (Arc<RelayMessaging>, Arc<InMemoryRelayOutbox>) {
        let outbox = Arc::new(InMemoryRelayOutbox::default());
        let clock = Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()));
        (Arc::new(RelayMessaging::new(outbox.clone(), clock)), outbox)
    }

    fn options() -> Vec<CharacterChoice> {
        vec![
            CharacterChoice {
                id: CharacterId::new(),
                name: "Mira".to_owned(),
            },
            CharacterChoice {
                id: CharacterId::new(),
                name: "Tov".to_owned(),
            },
        ]
    }

    async fn wait_until_listening(relay: &RelayMessaging, channel: &ChannelId, member: &MemberId) {
        while !relay.is_waiting(channel, member) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test]
    async fn test_timed_out_wait_leaves_no_waiter_behind() {
        // Arrange
        let (relay, _) = relay();
        let (channel, member) = (ChannelId::new("story"), MemberId::new("m-ash"));

        // Act
        let waited =
            tokio::time::timeout(Duration::from_millis(10), relay.await_reply(&channel, &member)).await;

        // Assert
        assert!(waited.is_err());
        assert!(relay.waiters.lock().unwrap().is_empty());
        assert!(!relay.deliver_reply(&channel, &member, Reply::text("late")));
    }

    #[tokio::test]
    async fn test_replaced_waiter_does_not_evict_its_successor() {
        // Arrange
        let (relay, _) = relay();
        let (channel, member) = (ChannelId::new("story"), MemberId::new("m-ash"));
        let first = {
            let (relay, channel, member) = (relay.clone(), channel.clone(), member.clone());
            tokio::spawn(async move { relay.await_reply(&channel, &member).await })
        };
        wait_until_listening(&relay, &channel, &member).await;
        let second = {
            let (relay, channel, member) = (relay.clone(), channel.clone(), member.clone());
            tokio::spawn(async move { relay.await_reply(&channel, &member).await })
        };

        // Act
        let stale = first.await.unwrap().unwrap();
        wait_until_listening(&relay, &channel, &member).await;

        // Assert
        assert!(stale.is_none());
        assert!(relay.deliver_reply(&channel, &member, Reply::text("hello")));
        assert_eq!(second.await.unwrap().unwrap().unwrap().content, "hello");
    }

    #[test]
    fn test_parse_choice_accepts_index_or_name() {
        let options = options();

        assert_eq!(parse_choice("2", &options), Some(options[1].id));
        assert_eq!(parse_choice(" mira ", &options), Some(options[0].id));
        assert_eq!(parse_choice("0", &options), None);
        assert_eq!(parse_choice("3", &options), None);
        assert_eq!(parse_choice("Ren", &options), None);
    }

    #[tokio::test]
    async fn test_delivered_reply_reaches_the_waiting_attempt() {
        // Arrange
        let (relay, _) = relay();
        let channel = ChannelId::new("story");
        let member = MemberId::new("m-ash");
        let waiting = {
            let relay = relay.clone();
            let (channel, member) = (channel.clone(), member.clone());
            tokio::spawn(async move { relay.await_reply(&channel, &member).await })
        };
        wait_until_listening(&relay, &channel, &member).await;

        // Act
        let delivered = relay.deliver_reply(&channel, &member, Reply::text("The door creaks."));

        // Assert
        assert!(delivered);
        let reply = waiting.await.unwrap().unwrap().unwrap();
        assert_eq!(reply.content, "The door creaks.");
    }

    #[tokio::test]
    async fn test_reply_without_waiter_is_not_delivered() {
        let (relay, _) = relay();

        let delivered = relay.deliver_reply(&ChannelId::new("story"), &MemberId::new("m"), Reply::text("hi"));

        assert!(!delivered);
    }

    #[tokio::test]
    async fn test_choose_character_reprompts_until_answer_parses() {
        // Arrange
        let (relay, outbox) = relay();
        let channel = ChannelId::new("story");
        let member = MemberId::new("m-ash");
        let options = options();
        let expected = options[1].id;
        let choosing = {
            let relay = relay.clone();
            let (channel, member) = (channel.clone(), member.clone());
            tokio::spawn(async move { relay.choose_character(&channel, &member, &options).await })
        };

        // Act
        wait_until_listening(&relay, &channel, &member).await;
        relay.deliver_reply(&channel, &member, Reply::text("the tall one"));
        wait_until_listening(&relay, &channel, &member).await;
        relay.deliver_reply(&channel, &member, Reply::text("tov"));

        // Assert
        assert_eq!(choosing.await.unwrap().unwrap(), Some(expected));
        let prompt = &outbox.entries()[0];
        assert!(prompt.body.contains("2. Tov"));
        assert!(prompt.deleted);
    }

    #[tokio::test]
    async fn test_outbox_backs_edit_delete_and_fetch() {
        // Arrange
        let (relay, outbox) = relay();
        let channel = ChannelId::new("story");
        let reference = relay
            .send_message(&channel, OutgoingMessage::plain("Lines collected: 0"))
            .await
            .unwrap();

        // Act
        relay
            .edit_message(&reference, "Lines collected: 1".to_owned())
            .await
            .unwrap();
        let fetched = relay.fetch_message(&reference).await.unwrap().unwrap();
        let first_delete = relay.delete_message(&reference).await.unwrap();
        let second_delete = relay.delete_message(&reference).await.unwrap();

        // Assert
        assert_eq!(fetched.body, "Lines collected: 1");
        assert!(first_delete);
        assert!(!second_delete);
        assert!(relay.fetch_message(&reference).await.unwrap().is_none());
        assert!(relay.edit_message(&reference, "late".to_owned()).await.is_err());
        assert_eq!(outbox.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_private_messages_are_addressed_to_the_member() {
        let (relay, outbox) = relay();

        relay
            .send_private(&MemberId::new("m-ash"), "Your post was undone".to_owned())
            .await
            .unwrap();

        assert_eq!(
            outbox.entries()[0].target,
            OutboxTarget::Member(MemberId::new("m-ash"))
        );
        assert!(relay.channel_messages(&ChannelId::new("story")).await.unwrap().is_empty());
    }
}

//! The posting attempt state machine.
//!
//! An attempt moves `SelectingCharacter → CollectingContent → Chunking →
//! Publishing → Done`, or ends early as `Cancelled` or `TimedOut`. The type
//! only tracks state; waiting on replies is the pipeline's job.

use serde::Serialize;
use storyloom_core::error::DomainError;
use storyloom_core::ids::CharacterId;

use super::chunking::chunk_content;
use super::messaging::{Attachment, Reply};

const DONE_KEYWORDS: [&str; 2] = ["done", "finish"];
const CANCEL_KEYWORD: &str = "cancel";

/// Where an attempt currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptPhase {
    /// Waiting for the acting character to be chosen.
    SelectingCharacter,
    /// Accumulating reply lines.
    CollectingContent,
    /// Content is final and about to be split.
    Chunking,
    /// Chunks are being published.
    Publishing,
    /// Published and recorded.
    Done,
    /// Ended without publishing.
    Cancelled,
    /// A wait ran out.
    TimedOut,
}

impl AttemptPhase {
    /// Whether the attempt has ended.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::TimedOut)
    }
}

/// What the pipeline should do after a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyStep {
    /// Keep waiting for replies.
    Continue,
    /// Collection ended; the attempt is ready to chunk.
    Finished,
    /// The user stopped the attempt, or finished without writing anything.
    Cancelled,
    /// Download this attachment and pass its text to
    /// [`PostingAttempt::attach`].
    FetchAttachment(Attachment),
}

/// State of one posting attempt.
#[derive(Debug, Clone)]
pub struct PostingAttempt {
    phase: AttemptPhase,
    character_id: Option<CharacterId>,
    lines: Vec<String>,
    content: Option<String>,
}

impl Default for PostingAttempt {
    fn default() -> Self {
        Self::new()
    }
}

impl PostingAttempt {
    /// A fresh attempt waiting for character selection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: AttemptPhase::SelectingCharacter,
            character_id: None,
            lines: Vec::new(),
            content: None,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> AttemptPhase {
        self.phase
    }

    /// The acting character once selected.
    #[must_use]
    pub fn character_id(&self) -> Option<CharacterId> {
        self.character_id
    }

    /// Number of lines collected so far.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Final content once collection has ended.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    fn expect_phase(&self, expected: AttemptPhase) -> Result<(), DomainError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(DomainError::Validation(format!(
                "posting attempt is {:?}, expected {expected:?}",
                self.phase
            )))
        }
    }

    /// Records the chosen character and starts collecting content.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` outside `SelectingCharacter`.
    pub fn select(&mut self, character_id: CharacterId) -> Result<(), DomainError> {
        self.expect_phase(AttemptPhase::SelectingCharacter)?;
        self.character_id = Some(character_id);
        self.phase = AttemptPhase::CollectingContent;
        Ok(())
    }

    /// Feeds one reply into the collection buffer.
    ///
    /// `done` (or `finish`) ends collection, or cancels the attempt when
    /// nothing was collected. `cancel` cancels. A plain-text attachment asks
    /// for the file to be fetched. Anything else is appended as a line.
    /// Keywords are matched on the trimmed reply, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` outside `CollectingContent`.
    pub fn on_reply(&mut self, reply: &Reply) -> Result<ReplyStep, DomainError> {
        self.expect_phase(AttemptPhase::CollectingContent)?;

        if let Some(attachment) = reply.attachment.as_ref().filter(|a| a.is_plain_text()) {
            return Ok(ReplyStep::FetchAttachment(attachment.clone()));
        }

        let keyword = reply.content.trim().to_lowercase();
        if DONE_KEYWORDS.contains(&keyword.as_str()) {
            if self.lines.is_empty() {
                self.phase = AttemptPhase::Cancelled;
                return Ok(ReplyStep::Cancelled);
            }
            self.content = Some(self.lines.join("\n"));
            self.phase = AttemptPhase::Chunking;
            return Ok(ReplyStep::Finished);
        }
        if keyword == CANCEL_KEYWORD {
            self.phase = AttemptPhase::Cancelled;
            return Ok(ReplyStep::Cancelled);
        }

        if !reply.content.trim().is_empty() {
            self.lines.push(reply.content.clone());
        }
        Ok(ReplyStep::Continue)
    }

    /// Uses fetched attachment text verbatim as the content, discarding any
    /// lines collected before it. A blank file cancels the attempt, the same
    /// as `done` with nothing collected.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` outside `CollectingContent`.
    pub fn attach(&mut self, text: String) -> Result<ReplyStep, DomainError> {
        self.expect_phase(AttemptPhase::CollectingContent)?;
        self.lines.clear();
        if text.trim().is_empty() {
            self.phase = AttemptPhase::Cancelled;
            return Ok(ReplyStep::Cancelled);
        }
        self.content = Some(text);
        self.phase = AttemptPhase::Chunking;
        Ok(ReplyStep::Finished)
    }

    /// Splits the content into chunks and moves on to publishing.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` outside `Chunking`.
    pub fn chunk(&mut self, limit: usize) -> Result<Vec<String>, DomainError> {
        self.expect_phase(AttemptPhase::Chunking)?;
        let chunks = chunk_content(self.content.as_deref().unwrap_or_default(), limit);
        self.phase = AttemptPhase::Publishing;
        Ok(chunks)
    }

    /// Marks the attempt published and recorded.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` outside `Publishing`.
    pub fn finish(&mut self) -> Result<(), DomainError> {
        self.expect_phase(AttemptPhase::Publishing)?;
        self.phase = AttemptPhase::Done;
        Ok(())
    }

    /// Ends the attempt without publishing.
    pub fn cancel(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = AttemptPhase::Cancelled;
        }
    }

    /// Ends the attempt because a wait ran out.
    pub fn time_out(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = AttemptPhase::TimedOut;
        }
    }
}

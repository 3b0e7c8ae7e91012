//! Domain error types.

use thiserror::Error;

use crate::ids::{CharacterId, MessageRef};

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An entity was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity that was looked up.
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// A turn-order reconfiguration was rejected.
    #[error("invalid turn order: {0}")]
    InvalidTurnOrder(String),

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// The text of a posted attachment could not be fetched.
    #[error("attachment fetch failed: {0}")]
    AttachmentFetchFailed(String),

    /// A character could not be resolved to the member who controls it.
    #[error("could not resolve the member for character {character_id}: {reason}")]
    IdentityResolutionFailed {
        /// The character being resolved.
        character_id: CharacterId,
        /// Why resolution failed.
        reason: String,
    },

    /// The messaging surface rejected an operation.
    #[error("messaging error: {0}")]
    Messaging(String),

    /// Messages were published but the post record could not be written.
    #[error("published {} message(s) but failed to record the post: {reason}", message_refs.len())]
    PublishedButNotRecorded {
        /// References to the messages that were published.
        message_refs: Vec<MessageRef>,
        /// The underlying persistence failure.
        reason: String,
    },

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Builds a `NotFound` error for the given entity kind and id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

//! Relay endpoints used by the chat bridge.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use storyloom_core::ids::{ChannelId, MemberId};
use storyloom_posting::domain::messaging::Reply;
use storyloom_store::relay_outbox::OutboxEntry;
use tracing::{debug, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /{channel}/replies.
#[derive(Debug, Deserialize)]
pub struct InboundReply {
    /// The member who wrote the reply.
    pub member: MemberId,
    /// Reply text and attachment.
    #[serde(flatten)]
    pub reply: Reply,
}

/// Response body for POST /{channel}/replies.
#[derive(Debug, Serialize)]
pub struct ReplyReceipt {
    /// Whether a posting attempt consumed the reply.
    pub delivered: bool,
}

/// POST /{channel}/replies
#[instrument(skip(state, request), fields(channel = %channel, member = %request.member))]
async fn deliver_reply(
    State(state): State<AppState>,
    Path(channel): Path<ChannelId>,
    Json(request): Json<InboundReply>,
) -> Json<ReplyReceipt> {
    let delivered = state
        .relay
        .deliver_reply(&channel, &request.member, request.reply);
    if !delivered {
        debug!("no attempt is waiting for this reply");
    }
    Json(ReplyReceipt { delivered })
}

/// GET /{channel}/messages
async fn channel_messages(
    State(state): State<AppState>,
    Path(channel): Path<ChannelId>,
) -> Result<Json<Vec<OutboxEntry>>, ApiError> {
    Ok(Json(state.relay.channel_messages(&channel).await?))
}

/// Returns the router for relay channels.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{channel}/replies", post(deliver_reply))
        .route("/{channel}/messages", get(channel_messages))
}

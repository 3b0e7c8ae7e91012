//! Routes for the Posting Pipeline & Undo bounded context.

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use storyloom_core::error::DomainError;
use storyloom_core::ids::{ChannelId, PlayerId, SessionId};
use storyloom_posting::application::pipeline::{self, PostRequest, Requester};
use storyloom_posting::application::undo::{self, UndoRequest};
use storyloom_posting::domain::outcome::{PostOutcome, UndoOutcome};
use storyloom_session::domain::turn_order::UndoMode;
use tokio::task::JoinError;
use tracing::{Instrument, info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Who a post is requested for.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "as", rename_all = "snake_case")]
pub enum PostAs {
    /// A registered player.
    Player {
        /// The requesting player.
        player_id: PlayerId,
    },
    /// The session's GM.
    Gm,
}

impl From<PostAs> for Requester {
    fn from(value: PostAs) -> Self {
        match value {
            PostAs::Player { player_id } => Self::Player(player_id),
            PostAs::Gm => Self::Gm,
        }
    }
}

/// Request body for POST /{id}/posts.
#[derive(Debug, Deserialize)]
pub struct StartPostRequest {
    /// The requester.
    #[serde(flatten)]
    pub requester: PostAs,
    /// Where to prompt; the session channel when absent.
    #[serde(default)]
    pub prompt_channel: Option<ChannelId>,
}

/// Request body for POST /{id}/undo.
#[derive(Debug, Default, Deserialize)]
pub struct UndoBody {
    /// How the author is put back into the round.
    #[serde(default)]
    pub mode: UndoMode,
}

fn task_failed(e: JoinError) -> DomainError {
    DomainError::Infrastructure(format!("posting task failed: {e}"))
}

/// POST /{id}/posts
///
/// Runs a whole posting attempt; the response is sent once the attempt ends.
/// The attempt runs on its own task, so a dropped request cannot stop it
/// between publishing and recording.
#[instrument(skip(state, request), fields(session_id = %session_id, requester = ?request.requester))]
async fn start_post(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(request): Json<StartPostRequest>,
) -> Result<Json<PostOutcome>, ApiError> {
    let handle = state.registry.require(session_id)?;
    let post_request = PostRequest {
        correlation_id: Uuid::new_v4(),
        requester: request.requester.into(),
        prompt_channel: request.prompt_channel,
    };

    info!(correlation_id = %post_request.correlation_id, "handling post request");

    let attempt = tokio::spawn(async move {
        pipeline::handle_post_request(&state.posting_context(), &handle, &post_request).await
    }
    .in_current_span());
    let outcome = attempt.await.map_err(task_failed)??;
    Ok(Json(outcome))
}

/// POST /{id}/undo
///
/// Runs detached like a post, so the messages and the record are always
/// removed together.
#[instrument(skip(state, request), fields(session_id = %session_id, mode = %request.mode))]
async fn undo_post(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(request): Json<UndoBody>,
) -> Result<Json<UndoOutcome>, ApiError> {
    let handle = state.registry.require(session_id)?;
    let undo_request = UndoRequest {
        correlation_id: Uuid::new_v4(),
        mode: request.mode,
    };

    info!(correlation_id = %undo_request.correlation_id, "handling undo request");

    let undoing = tokio::spawn(async move {
        undo::handle_undo_request(&state.posting_context(), &handle, &undo_request).await
    }
    .in_current_span());
    let outcome = undoing.await.map_err(task_failed)??;
    Ok(Json(outcome))
}

/// Returns the router for posting and undo.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{session_id}/posts", post(start_post))
        .route("/{session_id}/undo", post(undo_post))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use storyloom_core::ids::{GuildId, MemberId};
    use storyloom_core::ids::PostId;
    use storyloom_posting::domain::messaging::Reply;
    use storyloom_posting::domain::post::PostRecord;
    use storyloom_posting::domain::repository::PostRepository;
    use storyloom_posting::testing::InMemoryPostRepository;
    use storyloom_session::application::command_handlers::handle_create_session;
    use storyloom_session::application::registry::SessionHandle;
    use storyloom_session::domain::commands::CreateSession;
    use storyloom_store::relay_outbox::OutboxTarget;
    use tower::ServiceExt;

    use crate::relay::RelayMessaging;
    use crate::state::fakes::in_memory_state;

    async fn session(state: &AppState) -> SessionHandle {
        handle_create_session(
            &CreateSession {
                correlation_id: Uuid::new_v4(),
                name: "Ashes of Vell".to_owned(),
                description: String::new(),
                guild: GuildId::new("guild-1"),
                gm_member: MemberId::new("m-gm"),
                gm_name: "The Narrator".to_owned(),
                color: None,
                channel: ChannelId::new("story"),
            },
            state.clock.as_ref(),
            &state.registry,
            state.sessions.as_ref(),
            state.characters.as_ref(),
            &state.notifier,
        )
        .await
        .unwrap()
    }

    /// Post log whose writes take a while to land.
    struct SlowPosts(Arc<InMemoryPostRepository>);

    #[async_trait]
    impl PostRepository for SlowPosts {
        async fn create(&self, post: &PostRecord) -> Result<(), DomainError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            self.0.create(post).await
        }

        async fn find_latest_for_session(
            &self,
            session_id: SessionId,
        ) -> Result<Option<PostRecord>, DomainError> {
            self.0.find_latest_for_session(session_id).await
        }

        async fn destroy(&self, id: PostId) -> Result<bool, DomainError> {
            self.0.destroy(id).await
        }
    }

    fn post_request(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    async fn json_of(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn reply_when_waiting(relay: &RelayMessaging, text: &str) {
        let (channel, member) = (ChannelId::new("story"), MemberId::new("m-gm"));
        while !relay.is_waiting(&channel, &member) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(relay.deliver_reply(&channel, &member, Reply::text(text)));
    }

    async fn gm_posts(state: &AppState, session_id: SessionId, lines: &[&str]) -> Value {
        let app = router().with_state(state.clone());
        let posting = tokio::spawn(app.oneshot(post_request(
            &format!("/{session_id}/posts"),
            &json!({ "as": "gm" }),
        )));
        for line in lines {
            reply_when_waiting(&state.relay, line).await;
        }
        reply_when_waiting(&state.relay, "done").await;
        let response = posting.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        json_of(response).await
    }

    #[tokio::test]
    async fn test_gm_post_is_published_through_the_relay() {
        // Arrange
        let (state, fakes) = in_memory_state();
        let handle = session(&state).await;
        let session_id = handle.read(|s| s.id);

        // Act
        let json = gm_posts(&state, session_id, &["The gates open.", "Rain follows."]).await;

        // Assert
        assert_eq!(json["result"], "done");
        let refs = json["message_refs"].as_array().unwrap();
        assert_eq!(refs.len(), 1);
        let live = fakes
            .outbox
            .entries()
            .into_iter()
            .filter(|e| !e.deleted)
            .collect::<Vec<_>>();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].body, "The gates open.\nRain follows.");
        assert_eq!(live[0].author.as_ref().unwrap().name, "The Narrator");
        assert_eq!(refs[0], live[0].reference.as_str());
        assert!(fakes.posts.latest().is_some());
    }

    #[tokio::test]
    async fn test_dropped_request_still_records_published_post() {
        // Arrange
        let (mut state, fakes) = in_memory_state();
        state.posts = Arc::new(SlowPosts(fakes.posts.clone()));
        let handle = session(&state).await;
        let session_id = handle.read(|s| s.id);
        let app = router().with_state(state.clone());
        let request = tokio::spawn(app.oneshot(post_request(
            &format!("/{session_id}/posts"),
            &json!({ "as": "gm" }),
        )));
        reply_when_waiting(&state.relay, "The gates open.").await;
        reply_when_waiting(&state.relay, "done").await;
        while !fakes
            .outbox
            .entries()
            .iter()
            .any(|e| !e.deleted && e.body == "The gates open.")
        {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        // Act
        request.abort();
        let _ = request.await;

        // Assert
        let recorded = tokio::time::timeout(Duration::from_secs(5), async {
            while fakes.posts.latest().is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(recorded.is_ok());
        while handle.read(|s| s.is_busy()) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(handle.read(|s| s.engine().progression().round), 1);
    }

    #[tokio::test]
    async fn test_second_post_while_busy_reports_busy() {
        // Arrange
        let (state, _) = in_memory_state();
        let handle = session(&state).await;
        let session_id = handle.read(|s| s.id);
        let _guard = handle.try_begin_posting().unwrap();
        let app = router().with_state(state);

        // Act
        let response = app
            .oneshot(post_request(&format!("/{session_id}/posts"), &json!({ "as": "gm" })))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_of(response).await["result"], "busy");
    }

    #[tokio::test]
    async fn test_post_for_unknown_player_returns_404() {
        let (state, _) = in_memory_state();
        let handle = session(&state).await;
        let session_id = handle.read(|s| s.id);
        let app = router().with_state(state);

        let response = app
            .oneshot(post_request(
                &format!("/{session_id}/posts"),
                &json!({ "as": "player", "player_id": PlayerId::new() }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_undo_retracts_post_and_messages_author() {
        // Arrange
        let (state, fakes) = in_memory_state();
        let handle = session(&state).await;
        let session_id = handle.read(|s| s.id);
        gm_posts(&state, session_id, &["The gates open."]).await;
        let app = router().with_state(state);

        // Act
        let response = app
            .oneshot(post_request(&format!("/{session_id}/undo"), &json!({ "mode": "none" })))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_of(response).await;
        assert_eq!(json["result"], "undone");
        assert_eq!(json["deleted_messages"], 1);
        let entries = fakes.outbox.entries();
        assert!(entries
            .iter()
            .filter(|e| matches!(e.target, OutboxTarget::Channel(_)))
            .all(|e| e.deleted));
        let private = entries
            .iter()
            .find(|e| e.target == OutboxTarget::Member(MemberId::new("m-gm")))
            .unwrap();
        assert!(private.body.contains("The gates open."));
        assert!(fakes.posts.latest().is_none());
    }

    #[tokio::test]
    async fn test_undo_without_posts_reports_nothing_to_undo() {
        let (state, _) = in_memory_state();
        let handle = session(&state).await;
        let session_id = handle.read(|s| s.id);
        let app = router().with_state(state);

        let response = app
            .oneshot(post_request(&format!("/{session_id}/undo"), &json!({})))
            .await
            .unwrap();

        assert_eq!(json_of(response).await["result"], "nothing_to_undo");
    }
}

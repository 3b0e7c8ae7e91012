//! Routes for the Session & Turn Order bounded context.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use storyloom_character::application::query_handlers::PlayerView;
use storyloom_core::command::Command;
use storyloom_core::ids::{ChannelId, CharacterId, GuildId, MemberId, MessageRef, SessionId};
use storyloom_posting::application::publishing::announce_section_break;
use storyloom_session::application::command_handlers;
use storyloom_session::application::query_handlers::{self, SessionView, WhoMayPost};
use storyloom_session::domain::commands;
use storyloom_session::domain::events::SectionBreak;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Session name.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Owning community.
    pub guild: GuildId,
    /// The member acting as GM.
    pub gm_member: MemberId,
    /// Display name of the GM character.
    pub gm_name: String,
    /// `#RRGGBB` color.
    pub color: Option<String>,
    /// Publish target.
    pub channel: ChannelId,
}

/// Request body for PUT /{id}/turn-order.
#[derive(Debug, Deserialize)]
pub struct TurnOrderRequest {
    /// Ordered groups of character ids.
    pub turn_order: Vec<Vec<CharacterId>>,
}

/// Request body for POST /{id}/acts and POST /{id}/chapters.
#[derive(Debug, Default, Deserialize)]
pub struct SectionRequest {
    /// Optional heading title.
    #[serde(default)]
    pub title: Option<String>,
}

/// Request body for PUT /{id}/turn-duration.
#[derive(Debug, Deserialize)]
pub struct TurnDurationRequest {
    /// Turn length in milliseconds; `null` removes the deadline.
    pub turn_duration_ms: Option<i64>,
}

/// Request body for POST /{id}/characters.
#[derive(Debug, Deserialize)]
pub struct SessionCharacterRequest {
    /// The character joining the session.
    pub character_id: CharacterId,
}

/// Response body for a section break.
#[derive(Debug, Serialize)]
pub struct SectionResponse {
    /// The rendered heading.
    pub heading: String,
    /// The heading message, when it could be published.
    pub message_ref: Option<MessageRef>,
    /// The session after the break.
    pub session: SessionView,
}

fn view_of(state: &AppState, session_id: SessionId) -> Result<Json<SessionView>, ApiError> {
    let handle = state.registry.require(session_id)?;
    Ok(Json(query_handlers::get_session_view(&handle)))
}

/// POST /
#[instrument(skip(state, request), fields(name = %request.name))]
async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let command = commands::CreateSession {
        correlation_id: Uuid::new_v4(),
        name: request.name,
        description: request.description,
        guild: request.guild,
        gm_member: request.gm_member,
        gm_name: request.gm_name,
        color: request.color,
        channel: request.channel,
    };

    info!(command = command.command_type(), correlation_id = %command.correlation_id(), "handling command");

    let handle = command_handlers::handle_create_session(
        &command,
        state.clock.as_ref(),
        &state.registry,
        state.sessions.as_ref(),
        state.characters.as_ref(),
        &state.notifier,
    )
    .await?;

    if let Some(duration) = state.default_turn_duration {
        let session_id = handle.read(|s| s.id);
        command_handlers::handle_set_turn_duration(
            &commands::SetTurnDuration {
                correlation_id: command.correlation_id,
                session_id,
                turn_duration_ms: Some(duration.num_milliseconds()),
            },
            state.clock.as_ref(),
            &state.registry,
            state.sessions.as_ref(),
            &state.notifier,
        )
        .await?;
    }

    Ok((
        StatusCode::CREATED,
        Json(query_handlers::get_session_view(&handle)),
    ))
}

/// GET /{id}
async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<SessionView>, ApiError> {
    view_of(&state, session_id)
}

/// PUT /{id}/turn-order
#[instrument(skip(state, request), fields(session_id = %session_id))]
async fn set_turn_order(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(request): Json<TurnOrderRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let command = commands::SetTurnOrder {
        correlation_id: Uuid::new_v4(),
        session_id,
        turn_order: request.turn_order,
    };

    info!(command = command.command_type(), correlation_id = %command.correlation_id(), "handling command");

    command_handlers::handle_set_turn_order(
        &command,
        state.clock.as_ref(),
        &state.registry,
        state.sessions.as_ref(),
        &state.notifier,
    )
    .await?;

    view_of(&state, session_id)
}

async fn announce(
    state: &AppState,
    session_id: SessionId,
    section: SectionBreak,
) -> Result<Json<SectionResponse>, ApiError> {
    let handle = state.registry.require(session_id)?;
    let message_ref = match announce_section_break(state.relay.as_ref(), &handle, &section).await {
        Ok(reference) => Some(reference),
        Err(e) => {
            warn!(error = %e, "section heading could not be published");
            None
        }
    };
    Ok(Json(SectionResponse {
        heading: section.heading(),
        message_ref,
        session: query_handlers::get_session_view(&handle),
    }))
}

/// POST /{id}/acts
#[instrument(skip(state, request), fields(session_id = %session_id))]
async fn increment_act(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(request): Json<SectionRequest>,
) -> Result<Json<SectionResponse>, ApiError> {
    let command = commands::IncrementAct {
        correlation_id: Uuid::new_v4(),
        session_id,
        title: request.title,
    };

    info!(command = command.command_type(), correlation_id = %command.correlation_id(), "handling command");

    let section = command_handlers::handle_increment_act(
        &command,
        state.clock.as_ref(),
        &state.registry,
        state.sessions.as_ref(),
        &state.notifier,
    )
    .await?;

    announce(&state, session_id, section).await
}

/// POST /{id}/chapters
#[instrument(skip(state, request), fields(session_id = %session_id))]
async fn increment_chapter(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(request): Json<SectionRequest>,
) -> Result<Json<SectionResponse>, ApiError> {
    let command = commands::IncrementChapter {
        correlation_id: Uuid::new_v4(),
        session_id,
        title: request.title,
    };

    info!(command = command.command_type(), correlation_id = %command.correlation_id(), "handling command");

    let section = command_handlers::handle_increment_chapter(
        &command,
        state.clock.as_ref(),
        &state.registry,
        state.sessions.as_ref(),
        &state.notifier,
    )
    .await?;

    announce(&state, session_id, section).await
}

/// PUT /{id}/turn-duration
#[instrument(skip(state, request), fields(session_id = %session_id))]
async fn set_turn_duration(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(request): Json<TurnDurationRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let command = commands::SetTurnDuration {
        correlation_id: Uuid::new_v4(),
        session_id,
        turn_duration_ms: request.turn_duration_ms,
    };

    info!(command = command.command_type(), correlation_id = %command.correlation_id(), "handling command");

    command_handlers::handle_set_turn_duration(
        &command,
        state.clock.as_ref(),
        &state.registry,
        state.sessions.as_ref(),
        &state.notifier,
    )
    .await?;

    view_of(&state, session_id)
}

/// POST /{id}/characters
#[instrument(skip(state, request), fields(session_id = %session_id, character_id = %request.character_id))]
async fn add_character(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(request): Json<SessionCharacterRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let command = commands::AddSessionCharacter {
        correlation_id: Uuid::new_v4(),
        session_id,
        character_id: request.character_id,
    };

    info!(command = command.command_type(), correlation_id = %command.correlation_id(), "handling command");

    command_handlers::handle_add_session_character(
        &command,
        state.clock.as_ref(),
        &state.registry,
        state.sessions.as_ref(),
        state.characters.as_ref(),
        &state.notifier,
    )
    .await?;

    view_of(&state, session_id)
}

/// DELETE /{id}/characters/{character_id}
#[instrument(skip(state))]
async fn remove_character(
    State(state): State<AppState>,
    Path((session_id, character_id)): Path<(SessionId, CharacterId)>,
) -> Result<Json<SessionView>, ApiError> {
    let command = commands::RemoveSessionCharacter {
        correlation_id: Uuid::new_v4(),
        session_id,
        character_id,
    };

    info!(command = command.command_type(), correlation_id = %command.correlation_id(), "handling command");

    command_handlers::handle_remove_session_character(
        &command,
        state.clock.as_ref(),
        &state.registry,
        state.sessions.as_ref(),
        &state.notifier,
    )
    .await?;

    view_of(&state, session_id)
}

/// GET /{id}/who-may-post
async fn who_may_post(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<WhoMayPost>, ApiError> {
    let handle = state.registry.require(session_id)?;
    let who = query_handlers::who_may_post(&handle, state.resolver.as_ref()).await?;
    Ok(Json(who))
}

/// GET /{id}/players
async fn players(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<Vec<PlayerView>>, ApiError> {
    let handle = state.registry.require(session_id)?;
    let players = query_handlers::players_in_session(
        &handle,
        state.characters.as_ref(),
        state.players.as_ref(),
    )
    .await?;
    Ok(Json(players))
}

/// Returns the router for the session context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_session))
        .route("/{session_id}", get(get_session))
        .route("/{session_id}/turn-order", put(set_turn_order))
        .route("/{session_id}/acts", post(increment_act))
        .route("/{session_id}/chapters", post(increment_chapter))
        .route("/{session_id}/turn-duration", put(set_turn_duration))
        .route("/{session_id}/characters", post(add_character))
        .route(
            "/{session_id}/characters/{character_id}",
            delete(remove_character),
        )
        .route("/{session_id}/who-may-post", get(who_may_post))
        .route("/{session_id}/players", get(players))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{Value, json};
    use storyloom_store::relay_outbox::OutboxTarget;
    use tower::ServiceExt;

    use crate::state::fakes::in_memory_state;

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(serde_json::to_vec(&body).unwrap()),
                None => Body::empty(),
            })
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn create_body() -> Value {
        json!({
            "name": "Ashes of Vell",
            "guild": "guild-1",
            "gm_member": "m-gm",
            "gm_name": "The Narrator",
            "color": "#AA3300",
            "channel": "story"
        })
    }

    #[tokio::test]
    async fn test_create_session_returns_201_with_zeroed_counters() {
        // Arrange
        let (state, fakes) = in_memory_state();
        let app = router().with_state(state);

        // Act
        let (status, json) = send(app, "POST", "/", Some(create_body())).await;

        // Assert
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["act"], 0);
        assert_eq!(json["chapter"], 0);
        assert_eq!(json["round"], 0);
        assert_eq!(json["color"], "#AA3300");
        assert_eq!(json["characters"].as_array().unwrap().len(), 1);
        let id: SessionId = serde_json::from_value(json["id"].clone()).unwrap();
        assert!(fakes.sessions.get(id).is_some());
    }

    #[tokio::test]
    async fn test_create_session_applies_default_turn_duration() {
        let (mut state, _) = in_memory_state();
        state.default_turn_duration = Some(chrono::TimeDelta::hours(12));
        let app = router().with_state(state);

        let (status, json) = send(app, "POST", "/", Some(create_body())).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["turn_duration_ms"], 12 * 60 * 60 * 1000);
    }

    #[tokio::test]
    async fn test_create_session_rejects_malformed_color() {
        let (state, _) = in_memory_state();
        let app = router().with_state(state);
        let mut body = create_body();
        body["color"] = json!("crimson");

        let (status, json) = send(app, "POST", "/", Some(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_unknown_session_returns_404() {
        let (state, _) = in_memory_state();
        let app = router().with_state(state);

        let (status, json) = send(app, "GET", &format!("/{}", SessionId::new()), None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "not_found");
    }

    #[tokio::test]
    async fn test_turn_order_naming_the_gm_returns_422() {
        // Arrange
        let (state, _) = in_memory_state();
        let app = router().with_state(state);
        let (_, created) = send(app.clone(), "POST", "/", Some(create_body())).await;
        let id = created["id"].as_str().unwrap();

        // Act
        let (status, json) = send(
            app,
            "PUT",
            &format!("/{id}/turn-order"),
            Some(json!({ "turn_order": [[created["gm_character"]]] })),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"], "invalid_turn_order");
    }

    #[tokio::test]
    async fn test_increment_act_announces_heading_in_session_channel() {
        // Arrange
        let (state, fakes) = in_memory_state();
        let app = router().with_state(state);
        let (_, created) = send(app.clone(), "POST", "/", Some(create_body())).await;
        let id = created["id"].as_str().unwrap();

        // Act
        let (status, json) = send(
            app,
            "POST",
            &format!("/{id}/acts"),
            Some(json!({ "title": "The Burning Road" })),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["heading"], "Act 1: The Burning Road");
        assert_eq!(json["session"]["act"], 1);
        assert_eq!(json["session"]["chapter"], 0);
        let entries = fakes.outbox.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].body, "Act 1: The Burning Road");
        assert_eq!(entries[0].target, OutboxTarget::Channel(ChannelId::new("story")));
        assert_eq!(json["message_ref"], entries[0].reference.as_str());
    }

    #[tokio::test]
    async fn test_non_positive_turn_duration_returns_400() {
        let (state, _) = in_memory_state();
        let app = router().with_state(state);
        let (_, created) = send(app.clone(), "POST", "/", Some(create_body())).await;
        let id = created["id"].as_str().unwrap();

        let (status, _) = send(
            app,
            "PUT",
            &format!("/{id}/turn-duration"),
            Some(json!({ "turn_duration_ms": 0 })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_removing_the_gm_character_returns_400() {
        let (state, _) = in_memory_state();
        let app = router().with_state(state);
        let (_, created) = send(app.clone(), "POST", "/", Some(create_body())).await;
        let id = created["id"].as_str().unwrap();
        let gm = created["gm_character"].as_str().unwrap();

        let (status, _) = send(app, "DELETE", &format!("/{id}/characters/{gm}"), None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_who_may_post_falls_back_to_gm_at_round_boundary() {
        let (state, _) = in_memory_state();
        let app = router().with_state(state);
        let (_, created) = send(app.clone(), "POST", "/", Some(create_body())).await;
        let id = created["id"].as_str().unwrap();

        let (status, json) = send(app, "GET", &format!("/{id}/who-may-post"), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["character_ids"], json!([created["gm_character"]]));
        assert_eq!(json["members"], json!(["m-gm"]));
    }
}

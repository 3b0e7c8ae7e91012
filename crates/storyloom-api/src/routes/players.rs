//! Routes for the Player Registry.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use storyloom_character::application::command_handlers;
use storyloom_character::application::query_handlers::{self, PlayerView};
use storyloom_character::domain::commands;
use storyloom_core::command::Command;
use storyloom_core::ids::{CharacterId, GuildId, MemberId, PlayerId};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct RegisterPlayerRequest {
    /// Community the player joins.
    pub guild: GuildId,
    /// The registering member.
    pub member: MemberId,
    /// Display handle.
    pub display_name: String,
}

/// Request body for POST /{id}/characters.
#[derive(Debug, Deserialize)]
pub struct AssignCharacterRequest {
    /// The character handed to the player.
    pub character_id: CharacterId,
}

/// POST /
#[instrument(skip(state, request), fields(member = %request.member))]
async fn register_player(
    State(state): State<AppState>,
    Json(request): Json<RegisterPlayerRequest>,
) -> Result<(StatusCode, Json<PlayerView>), ApiError> {
    let command = commands::RegisterPlayer {
        correlation_id: Uuid::new_v4(),
        guild: request.guild,
        member: request.member,
        display_name: request.display_name,
    };

    info!(command = command.command_type(), correlation_id = %command.correlation_id(), "handling command");

    let player = command_handlers::handle_register_player(&command, state.players.as_ref()).await?;
    let view = query_handlers::get_player_view(player.id, state.players.as_ref()).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /{id}
async fn get_player(
    State(state): State<AppState>,
    Path(player_id): Path<PlayerId>,
) -> Result<Json<PlayerView>, ApiError> {
    Ok(Json(
        query_handlers::get_player_view(player_id, state.players.as_ref()).await?,
    ))
}

/// POST /{id}/characters
#[instrument(skip(state, request), fields(player_id = %player_id, character_id = %request.character_id))]
async fn assign_character(
    State(state): State<AppState>,
    Path(player_id): Path<PlayerId>,
    Json(request): Json<AssignCharacterRequest>,
) -> Result<Json<PlayerView>, ApiError> {
    let command = commands::AssignCharacter {
        correlation_id: Uuid::new_v4(),
        player_id,
        character_id: request.character_id,
    };

    info!(command = command.command_type(), correlation_id = %command.correlation_id(), "handling command");

    command_handlers::handle_assign_character(
        &command,
        state.characters.as_ref(),
        state.players.as_ref(),
    )
    .await?;
    Ok(Json(
        query_handlers::get_player_view(player_id, state.players.as_ref()).await?,
    ))
}

/// Returns the router for the player registry.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(register_player))
        .route("/{player_id}", get(get_player))
        .route("/{player_id}/characters", post(assign_character))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{Value, json};
    use storyloom_character::domain::aggregates::Character;
    use storyloom_character::domain::repository::CharacterRepository;
    use storyloom_core::color::Color;
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
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn registration() -> Value {
        json!({ "guild": "guild-1", "member": "m-ash", "display_name": "Ash" })
    }

    #[tokio::test]
    async fn test_reregistering_returns_the_same_player() {
        // Arrange
        let (state, _) = in_memory_state();
        let app = router().with_state(state);

        // Act
        let (first_status, first) = send(app.clone(), "POST", "/", Some(registration())).await;
        let (_, second) = send(app, "POST", "/", Some(registration())).await;

        // Assert
        assert_eq!(first_status, StatusCode::CREATED);
        assert_eq!(first["id"], second["id"]);
        assert_eq!(first["member"], "m-ash");
    }

    #[tokio::test]
    async fn test_assign_character_records_ownership() {
        // Arrange
        let (state, _) = in_memory_state();
        let character = Character::new(CharacterId::new(), "Mira", Color::WHITE, None).unwrap();
        state.characters.create(&character).await.unwrap();
        let app = router().with_state(state.clone());
        let (_, player) = send(app.clone(), "POST", "/", Some(registration())).await;
        let player_id = player["id"].as_str().unwrap();

        // Act
        let (status, json) = send(
            app,
            "POST",
            &format!("/{player_id}/characters"),
            Some(json!({ "character_id": character.id })),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["characters"], json!([character.id]));
        let stored = state.characters.find(character.id).await.unwrap().unwrap();
        assert_eq!(
            stored.owner.map(|id| id.to_string()).as_deref(),
            Some(player_id)
        );
    }

    #[tokio::test]
    async fn test_unknown_player_returns_404() {
        let (state, _) = in_memory_state();
        let app = router().with_state(state);

        let (status, _) = send(app, "GET", &format!("/{}", PlayerId::new()), None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

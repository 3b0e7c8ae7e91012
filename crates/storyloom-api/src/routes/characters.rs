//! Routes for the Character context.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use storyloom_character::application::command_handlers;
use storyloom_character::application::query_handlers::{self, CharacterView};
use storyloom_character::domain::commands;
use storyloom_character::domain::information::{Classification, Viewer};
use storyloom_core::command::Command;
use storyloom_core::error::DomainError;
use storyloom_core::ids::{CharacterId, InformationId, PlayerId};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct CreateCharacterRequest {
    /// Display name.
    pub name: String,
    /// `#RRGGBB` color.
    pub color: Option<String>,
    /// Controlling player.
    pub owner: Option<PlayerId>,
}

/// Request body for PATCH /{id}.
#[derive(Debug, Deserialize)]
pub struct EditCharacterRequest {
    /// New display name.
    pub name: Option<String>,
    /// New `#RRGGBB` color.
    pub color: Option<String>,
}

/// Request body for POST /{id}/information.
#[derive(Debug, Deserialize)]
pub struct AddInformationRequest {
    /// `public`, `private` or `gm`.
    pub classification: String,
    /// Information name.
    pub name: String,
    /// `attribute`, `skill`, `generic`, or any other tag.
    #[serde(rename = "type", default = "generic_kind")]
    pub kind: String,
    /// Raw value.
    pub value: String,
}

fn generic_kind() -> String {
    "generic".to_owned()
}

/// Request body for PUT /{id}/information/{info}/classification.
#[derive(Debug, Deserialize)]
pub struct ClassificationRequest {
    /// `public`, `private` or `gm`.
    pub classification: String,
}

/// Request body for POST /{id}/knowledge.
#[derive(Debug, Deserialize)]
pub struct LearnFactRequest {
    /// Opaque fact reference.
    pub fact: String,
}

/// Query string for GET /{id}.
#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    /// `anyone` (default), `owner` or `gm`.
    pub viewer: Option<String>,
}

/// Response body for POST /{id}/information.
#[derive(Debug, Serialize)]
pub struct InformationAdded {
    /// The new entry.
    pub information_id: InformationId,
    /// The character as the GM sees it.
    pub character: CharacterView,
}

fn parse_viewer(raw: Option<&str>) -> Result<Viewer, DomainError> {
    match raw {
        None | Some("anyone") => Ok(Viewer::Anyone),
        Some("owner") => Ok(Viewer::Owner),
        Some("gm") => Ok(Viewer::Gm),
        Some(other) => Err(DomainError::Validation(format!(
            "invalid viewer {other:?}; expected anyone, owner or gm"
        ))),
    }
}

async fn gm_view(state: &AppState, character_id: CharacterId) -> Result<CharacterView, ApiError> {
    Ok(query_handlers::get_character_view(character_id, Viewer::Gm, state.characters.as_ref()).await?)
}

/// POST /
#[instrument(skip(state, request), fields(name = %request.name))]
async fn create_character(
    State(state): State<AppState>,
    Json(request): Json<CreateCharacterRequest>,
) -> Result<(StatusCode, Json<CharacterView>), ApiError> {
    let command = commands::CreateCharacter {
        correlation_id: Uuid::new_v4(),
        name: request.name,
        color: request.color,
        owner: request.owner,
    };

    info!(command = command.command_type(), correlation_id = %command.correlation_id(), "handling command");

    let character = command_handlers::handle_create_character(
        &command,
        state.characters.as_ref(),
        state.players.as_ref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(gm_view(&state, character.id).await?)))
}

/// GET /{id}?viewer=
async fn get_character(
    State(state): State<AppState>,
    Path(character_id): Path<CharacterId>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<CharacterView>, ApiError> {
    let viewer = parse_viewer(query.viewer.as_deref())?;
    let view =
        query_handlers::get_character_view(character_id, viewer, state.characters.as_ref()).await?;
    Ok(Json(view))
}

/// PATCH /{id}
#[instrument(skip(state, request), fields(character_id = %character_id))]
async fn edit_character(
    State(state): State<AppState>,
    Path(character_id): Path<CharacterId>,
    Json(request): Json<EditCharacterRequest>,
) -> Result<Json<CharacterView>, ApiError> {
    let command = commands::EditCharacter {
        correlation_id: Uuid::new_v4(),
        character_id,
        name: request.name,
        color: request.color,
    };

    info!(command = command.command_type(), correlation_id = %command.correlation_id(), "handling command");

    command_handlers::handle_edit_character(&command, state.characters.as_ref()).await?;
    Ok(Json(gm_view(&state, character_id).await?))
}

/// POST /{id}/information
#[instrument(skip(state, request), fields(character_id = %character_id))]
async fn add_information(
    State(state): State<AppState>,
    Path(character_id): Path<CharacterId>,
    Json(request): Json<AddInformationRequest>,
) -> Result<(StatusCode, Json<InformationAdded>), ApiError> {
    let command = commands::AddInformation {
        correlation_id: Uuid::new_v4(),
        character_id,
        classification: request.classification.parse::<Classification>()?,
        name: request.name,
        kind: request.kind,
        value: request.value,
    };

    info!(command = command.command_type(), correlation_id = %command.correlation_id(), "handling command");

    let entry = command_handlers::handle_add_information(
        &command,
        state.characters.as_ref(),
        state.information.as_ref(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(InformationAdded {
            information_id: entry.id,
            character: gm_view(&state, character_id).await?,
        }),
    ))
}

/// PUT /{id}/information/{information_id}/classification
#[instrument(skip(state, request))]
async fn reclassify_information(
    State(state): State<AppState>,
    Path((character_id, information_id)): Path<(CharacterId, InformationId)>,
    Json(request): Json<ClassificationRequest>,
) -> Result<Json<CharacterView>, ApiError> {
    let command = commands::ReclassifyInformation {
        correlation_id: Uuid::new_v4(),
        character_id,
        information_id,
        classification: request.classification.parse::<Classification>()?,
    };

    info!(command = command.command_type(), correlation_id = %command.correlation_id(), "handling command");

    command_handlers::handle_reclassify_information(&command, state.characters.as_ref()).await?;
    Ok(Json(gm_view(&state, character_id).await?))
}

/// DELETE /{id}/information/{information_id}
#[instrument(skip(state))]
async fn remove_information(
    State(state): State<AppState>,
    Path((character_id, information_id)): Path<(CharacterId, InformationId)>,
) -> Result<Json<CharacterView>, ApiError> {
    let command = commands::RemoveInformation {
        correlation_id: Uuid::new_v4(),
        character_id,
        information_id,
    };

    info!(command = command.command_type(), correlation_id = %command.correlation_id(), "handling command");

    command_handlers::handle_remove_information(
        &command,
        state.characters.as_ref(),
        state.information.as_ref(),
    )
    .await?;
    Ok(Json(gm_view(&state, character_id).await?))
}

/// POST /{id}/knowledge
#[instrument(skip(state, request), fields(character_id = %character_id))]
async fn learn_fact(
    State(state): State<AppState>,
    Path(character_id): Path<CharacterId>,
    Json(request): Json<LearnFactRequest>,
) -> Result<Json<CharacterView>, ApiError> {
    let command = commands::LearnFact {
        correlation_id: Uuid::new_v4(),
        character_id,
        fact: request.fact,
    };

    info!(command = command.command_type(), correlation_id = %command.correlation_id(), "handling command");

    command_handlers::handle_learn_fact(&command, state.characters.as_ref()).await?;
    Ok(Json(gm_view(&state, character_id).await?))
}

/// Returns the router for the character context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_character))
        .route("/{character_id}", get(get_character).patch(edit_character))
        .route("/{character_id}/information", post(add_information))
        .route(
            "/{character_id}/information/{information_id}",
            delete(remove_information),
        )
        .route(
            "/{character_id}/information/{information_id}/classification",
            put(reclassify_information),
        )
        .route("/{character_id}/knowledge", post(learn_fact))
}

//! Server-sent stream of session notices.

use std::convert::Infallible;

use axum::Router;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use futures::Stream;
use storyloom_core::ids::SessionId;
use storyloom_session::application::notifier::SessionNotice;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{instrument, warn};

use crate::error::ApiError;
use crate::state::AppState;

fn event_name(notice: &SessionNotice) -> &'static str {
    match notice {
        SessionNotice::PanelRefresh { .. } => "panel_refresh",
        SessionNotice::SectionBreak { .. } => "section_break",
    }
}

/// GET /{id}/events
#[instrument(skip(state))]
async fn session_events(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    state.registry.require(session_id)?;

    let notices = BroadcastStream::new(state.notifier.subscribe()).filter_map(move |received| {
        let notice = match received {
            Ok(notice) if notice.session_id() == session_id => notice,
            Ok(_) => return None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "event subscriber lagged; notices dropped");
                return None;
            }
        };
        match Event::default().event(event_name(&notice)).json_data(&notice) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                warn!(error = %e, "failed to encode session notice");
                None
            }
        }
    });

    Ok(Sse::new(notices).keep_alive(KeepAlive::default()))
}

/// Returns the router for session event streams.
pub fn router() -> Router<AppState> {
    Router::new().route("/{session_id}/events", get(session_events))
}

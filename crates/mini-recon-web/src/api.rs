use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::stream::Stream;
use mini_recon::reconcile::{Bucket, MISSING_INPUT_MESSAGE, ReconciliationResult};
use mini_recon::session::{Action, Session, Side};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::state::AppState;

#[derive(Serialize)]
struct ErrorResponse {
    #[serde(skip)]
    status: StatusCode,
    error: String,
}

impl ErrorResponse {
    fn new(status: StatusCode, error: impl Into<String>) -> Self {
        ErrorResponse {
            status,
            error: error.into(),
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[derive(Serialize)]
pub struct SideResponse {
    pub file_name: Option<String>,
    pub record_count: Option<usize>,
}

#[derive(Serialize)]
pub struct StateResponse {
    pub internal: SideResponse,
    pub provider: SideResponse,
    pub is_loading: bool,
    pub can_reconcile: bool,
    pub message: String,
    pub results: Option<Arc<ReconciliationResult>>,
}

fn side_response(session: &Session, side: Side) -> SideResponse {
    SideResponse {
        file_name: session.file_name(side).map(ToOwned::to_owned),
        record_count: session.file(side).map(|file| file.records.len()),
    }
}

fn state_response(session: &Session) -> Json<StateResponse> {
    Json(StateResponse {
        internal: side_response(session, Side::Internal),
        provider: side_response(session, Side::Provider),
        is_loading: session.is_loading(),
        can_reconcile: session.can_reconcile(),
        message: session.message().to_string(),
        results: session.results().cloned(),
    })
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub name: Option<String>,
}

pub async fn get_state(State(state): State<AppState>) -> Json<StateResponse> {
    state_response(&state.snapshot())
}

pub async fn upload_file(
    State(state): State<AppState>,
    Path(side): Path<Side>,
    Query(params): Query<UploadParams>,
    body: String,
) -> Result<Json<StateResponse>, Response> {
    let name = params.name.unwrap_or_else(|| match side {
        Side::Internal => "internal.csv".to_string(),
        Side::Provider => "provider.csv".to_string(),
    });

    match state.load_text(side, name, &body) {
        Ok(session) => Ok(state_response(&session)),
        Err(session) => {
            Err(ErrorResponse::new(StatusCode::BAD_REQUEST, session.message()).into_response())
        }
    }
}

pub async fn clear_file(
    State(state): State<AppState>,
    Path(side): Path<Side>,
) -> Json<StateResponse> {
    tracing::info!("Clearing {:?} file", side);
    state_response(&state.dispatch(Action::Cleared { side }))
}

pub async fn reconcile(State(state): State<AppState>) -> Result<Json<StateResponse>, Response> {
    let session = state.dispatch(Action::Reconciled);
    if session.message() == MISSING_INPUT_MESSAGE {
        return Err(
            ErrorResponse::new(StatusCode::UNPROCESSABLE_ENTITY, MISSING_INPUT_MESSAGE)
                .into_response(),
        );
    }

    if let Some(results) = session.results() {
        tracing::info!(
            "Reconciled: {} matched, {} only internal, {} only provider",
            results.matched.len(),
            results.only_internal.len(),
            results.only_provider.len()
        );
    }
    Ok(state_response(&session))
}

pub async fn export(
    State(state): State<AppState>,
    Path(bucket): Path<Bucket>,
) -> Result<Response, Response> {
    let filename = bucket.filename();
    let text = state.snapshot().export(bucket, &state.codec).map_err(|e| {
        tracing::error!("Failed to export {}: {:#}", filename, e);
        ErrorResponse::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to export {filename}: {e}"),
        )
        .into_response()
    })?;

    let Some(text) = text else {
        let session = state.dispatch(Action::ExportSkipped {
            filename: filename.to_string(),
        });
        return Err(ErrorResponse::new(StatusCode::NOT_FOUND, session.message()).into_response());
    };

    state.dispatch(Action::Exported {
        filename: filename.to_string(),
    });
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        text,
    )
        .into_response())
}

pub async fn file_changes_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscriber_count = state.file_change_tx.receiver_count();
    tracing::info!("New SSE connection. Total subscribers: {subscriber_count}",);

    let rx = state.file_change_tx.subscribe();
    let stream = BroadcastStream::new(rx).map(|_| Ok(Event::default().data("reload")));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

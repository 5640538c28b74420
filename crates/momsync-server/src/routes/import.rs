use axum::extract::{Request, State};
use axum::http::StatusCode;
use momsync_core::xml::inbound;

use crate::error::AppError;
use crate::state::AppState;

/// Accepts one planning-system observation document and stores it in the
/// execution repository. Mounted as the router fallback, so the path and
/// method of the push do not matter.
pub async fn import_observation(
    State(app): State<AppState>,
    req: Request,
) -> Result<StatusCode, AppError> {
    let bytes = axum::body::to_bytes(req.into_body(), app.max_body_bytes)
        .await
        .map_err(|e| AppError::bad_request(format!("cannot read request body: {e}")))?;
    if bytes.is_empty() {
        return Err(AppError::bad_request("request has no body"));
    }
    let text = std::str::from_utf8(&bytes)
        .map_err(|e| AppError::bad_request(format!("request body is not UTF-8: {e}")))?;

    let record = inbound::decode(text)?;
    let mom2_id = record.mom2_id;
    let beams = record.beams.len();

    let repo = app.repo.clone();
    tokio::task::spawn_blocking(move || repo.store(&record))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    tracing::info!(mom2_id = ?mom2_id, beams, "stored inbound observation");
    Ok(StatusCode::OK)
}

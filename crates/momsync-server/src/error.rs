use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use momsync_core::error::{CodecError, MomsyncError, RepositoryError};

// ---------------------------------------------------------------------------
// Internal sentinel for explicit 400 Bad Request errors
// ---------------------------------------------------------------------------

/// Carries an explicit HTTP 400 through the `anyhow::Error` chain for
/// request problems that precede decoding (missing or unreadable body).
#[derive(Debug)]
struct BadRequestError(String);

impl std::fmt::Display for BadRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BadRequestError {}

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequestError(msg.into()).into())
    }

    fn status(&self) -> StatusCode {
        if self.0.downcast_ref::<BadRequestError>().is_some()
            || self.0.downcast_ref::<CodecError>().is_some()
        {
            return StatusCode::BAD_REQUEST;
        }
        match self.0.downcast_ref::<MomsyncError>() {
            Some(MomsyncError::Codec(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::BAD_REQUEST {
            tracing::warn!(error = %self.0, "rejected inbound push");
        } else if self.0.downcast_ref::<RepositoryError>().is_some() {
            tracing::error!(error = %self.0, "execution repository refused inbound observation");
        } else {
            tracing::error!(error = %format!("{:#}", self.0), "inbound push failed");
        }

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use momsync_core::error::{Domain, UnmappedValue};

    #[test]
    fn bad_request_maps_to_400() {
        let response = AppError::bad_request("request has no body").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn codec_errors_map_to_400() {
        let err = AppError(CodecError::UnexpectedRoot("project".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        let unmapped = CodecError::from(UnmappedValue::new(Domain::ClockMode, "fast"));
        let err = AppError(MomsyncError::from(unmapped).into());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn repository_errors_map_to_500() {
        let err = AppError(RepositoryError::Unavailable("disk full".into()).into());
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn anything_else_maps_to_500() {
        let err = AppError(anyhow::anyhow!("task join error"));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

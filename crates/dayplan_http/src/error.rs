//! HTTP error mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dayplan_core::DayPlanError;
use log::{error, warn};
use serde::Serialize;
use serde_json::Value;

/// Error returned by every handler.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<Value>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<DayPlanError> for ApiError {
    fn from(err: DayPlanError) -> Self {
        let status = match &err {
            DayPlanError::Validation { .. } => StatusCode::BAD_REQUEST,
            DayPlanError::NotFound(_) => StatusCode::NOT_FOUND,
            DayPlanError::Conflict(_) => StatusCode::CONFLICT,
            DayPlanError::Unsupported(_) => StatusCode::GONE,
            DayPlanError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
            details: err.details().cloned(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("invalid JSON body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(
                "event=request_failed module=http status=error code={} error={}",
                self.status.as_u16(),
                self.message
            );
        } else {
            warn!(
                "event=request_rejected module=http status=error code={} error={}",
                self.status.as_u16(),
                self.message
            );
        }
        let body = ErrorBody {
            error: &self.message,
            details: self.details.as_ref(),
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::ApiError;
    use axum::http::StatusCode;
    use dayplan_core::DayPlanError;
    use serde_json::json;

    #[test]
    fn domain_errors_map_to_status_codes() {
        let cases = [
            (DayPlanError::validation("bad"), StatusCode::BAD_REQUEST),
            (DayPlanError::not_found("gone"), StatusCode::NOT_FOUND),
            (DayPlanError::conflict("dup"), StatusCode::CONFLICT),
            (DayPlanError::Unsupported("legacy".into()), StatusCode::GONE),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn validation_details_are_kept() {
        let err = DayPlanError::validation_with("bad", json!({"fields": []}));
        let api = ApiError::from(err);
        assert_eq!(api.details, Some(json!({"fields": []})));
    }
}

pub mod backup;
pub mod health;

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tdp::auth::Actor;
use tdp::errors::{CoreError, CoreErrorKind};
use tracing::error;

/// Set by the authenticating reverse proxy
pub const USER_ID_HEADER: &str = "x-user-id";
/// Comma separated role names, e.g. `staff,manager`
pub const USER_ROLES_HEADER: &str = "x-user-roles";

/// Actor described by the trusted proxy headers. Requests without a valid
/// user id are anonymous.
pub fn actor_from_headers(headers: &HeaderMap) -> Actor {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<i32>().ok());

    let Some(user_id) = user_id else {
        return Actor::anonymous();
    };

    let roles = headers
        .get(USER_ROLES_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    Actor::user(user_id).with_roles(roles)
}

pub fn status_for(kind: CoreErrorKind) -> StatusCode {
    match kind {
        CoreErrorKind::Validation => StatusCode::BAD_REQUEST,
        CoreErrorKind::NotFound => StatusCode::NOT_FOUND,
        CoreErrorKind::Forbidden => StatusCode::FORBIDDEN,
        CoreErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        CoreErrorKind::Conflict | CoreErrorKind::Cancelled => StatusCode::CONFLICT,
        CoreErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `CoreError` rendered as `{"error": {"code", "message", "fields"}}`
#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind());
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }

        // Internal details stay in the log
        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.0.message().to_string()
        };

        let body = json!({
            "error": {
                "code": self.0.code(),
                "message": message,
                "fields": self.0.fields(),
            }
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_actor_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(actor_from_headers(&headers), Actor::anonymous());

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("12"));
        headers.insert(USER_ROLES_HEADER, HeaderValue::from_static("Staff, editor"));
        let actor = actor_from_headers(&headers);
        assert_eq!(actor.user_id, Some(12));
        assert!(actor.has_role("staff"));
        assert!(actor.has_role("editor"));
        assert!(!actor.is_system());

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("not-a-number"));
        assert_eq!(actor_from_headers(&headers), Actor::anonymous());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(CoreErrorKind::Validation), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(CoreErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(CoreErrorKind::Conflict), StatusCode::CONFLICT);
        assert_eq!(
            status_for(CoreErrorKind::Internal),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

use super::valid_email;
use crate::identity::{Error, ManagementClient};
use axum::{
    extract::Extension,
    http::{
        header::{ALLOW, AUTHORIZATION},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct ResendRequest {
    /// Only used for log correlation.
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ResendResponse {
    pub ok: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self {
            Self::MissingBearerToken | Self::InvalidUserToken => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            Self::Http(_) | Self::Url(_) => "Unexpected error".to_string(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            error!("Resend verification failed: {self}");
        }

        let body = ErrorBody {
            error: message,
            details: self.details().map(str::to_string),
        };

        (status, Json(body)).into_response()
    }
}

/// Token from an `Authorization: Bearer <token>` header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Resend the verification email to the caller.
#[utoipa::path(
    post,
    path = "/api/resend-verification",
    request_body(content = ResendRequest, description = "Optional; `email` is logged only"),
    params(
        ("Authorization" = String, Header, description = "Bearer access token of the caller")
    ),
    responses(
        (status = 200, description = "Verification email job created", body = ResendResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorBody),
        (status = 405, description = "Only POST is allowed"),
        (status = 500, description = "Identity provider call failed", body = ErrorBody)
    ),
    tag = "verification"
)]
pub async fn resend_verification(
    headers: HeaderMap,
    client: Extension<Arc<ManagementClient>>,
    payload: Option<Json<ResendRequest>>,
) -> Result<Json<ResendResponse>, Error> {
    let token = bearer_token(&headers).ok_or(Error::MissingBearerToken)?;

    let email_hint = payload
        .and_then(|Json(request)| request.email)
        .map(|email| email.trim().to_string())
        .filter(|email| valid_email(email));

    let job = client.resend_verification_email(token).await?;

    info!(
        job_id = job.id.as_deref().unwrap_or("none"),
        email = email_hint.as_deref().unwrap_or("unknown"),
        "Verification email job created"
    );

    Ok(Json(ResendResponse { ok: true }))
}

// Any method other than POST on the resend path.
pub async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(ALLOW, HeaderValue::from_static("POST"))],
        "Method Not Allowed",
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("bearer  abc ")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn error_statuses() {
        assert_eq!(
            Error::MissingBearerToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::InvalidUserToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::VerificationJob {
                details: "boom".to_string()
            }
            .into_response()
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn verification_job_error_body_carries_details() {
        let response = Error::VerificationJob {
            details: "user is blocked".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&bytes).unwrap(),
            serde_json::json!({
                "error": "Failed to create verification job",
                "details": "user is blocked"
            })
        );
    }

    #[test]
    fn error_body_omits_missing_details() {
        let body = ErrorBody {
            error: "Missing bearer token".to_string(),
            details: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "error": "Missing bearer token" })
        );
    }
}

//! HTTP mapping for relay errors.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use relay_shared::RelayError;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::error;

const DESERIALIZE_PREFIX: &str = "Failed to deserialize the JSON body into the target type: ";

/// Error returned by route handlers
#[derive(Debug)]
pub struct ApiError(pub RelayError);

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            RelayError::Validation { .. } => StatusCode::BAD_REQUEST,
            RelayError::InvalidToken(_) => StatusCode::NOT_FOUND,
            RelayError::UpstreamUnavailable(_)
            | RelayError::UpstreamMalformed(_)
            | RelayError::Delivery(_)
            | RelayError::NotificationsDisabled
            | RelayError::Unhandled(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("  Request failed: {}", self.0);
        }

        let mut body = json!({
            "success": false,
            "error": self.0.to_string(),
            "code": self.0.code(),
        });
        if let RelayError::Validation { field, .. } = &self.0 {
            body["field"] = json!(field);
        }
        (status, Json(body)).into_response()
    }
}

/// `Json` extractor whose rejections are reported as validation errors.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidJson(value)),
            Err(rejection) => Err(ApiError(rejection_error(&rejection))),
        }
    }
}

fn rejection_error(rejection: &JsonRejection) -> RelayError {
    let text = rejection.body_text();
    match rejection {
        JsonRejection::MissingJsonContentType(_) => RelayError::validation("content-type", text),
        JsonRejection::JsonDataError(_) => {
            RelayError::validation(&rejected_field(&text), text)
        }
        _ => RelayError::validation("body", text),
    }
}

/// Field path named in a deserialization error, or `body` when there is none.
fn rejected_field(text: &str) -> String {
    let detail = text.strip_prefix(DESERIALIZE_PREFIX).unwrap_or(text);
    match detail.split_once(": ") {
        Some((path, _)) if !path.is_empty() && !path.contains(char::is_whitespace) => {
            path.to_string()
        }
        _ => "body".to_string(),
    }
}

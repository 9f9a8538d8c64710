use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use switchyard_types::GatewayError;

/// Handler failure rendered as `{"error": {"kind", "message"}}`.
#[derive(Debug)]
pub enum ApiError {
    Gateway(GatewayError),
    /// The auth layer in front of us did not set `x-tenant-id`
    MissingTenant,
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError::Gateway(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Gateway(err) => StatusCode::from_u16(err.kind.http_status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ApiError::MissingTenant => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn body(&self) -> serde_json::Value {
        let (kind, message) = match self {
            ApiError::Gateway(err) => (err.kind.as_str(), err.message.as_str()),
            ApiError::MissingTenant => ("unauthenticated", "Missing x-tenant-id header"),
        };
        serde_json::json!({ "error": { "kind": kind, "message": message } })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Gateway(err) = &self {
            tracing::debug!("Request failed: {}", err);
        }
        (self.status(), Json(self.body())).into_response()
    }
}

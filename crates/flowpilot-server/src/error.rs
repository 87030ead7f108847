use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use flowpilot_core::CreateError;
use flowpilot_engine::{EditError, FailureKind};
use flowpilot_store::StoreError;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// An error response: `{ error, details? }` with a status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                details: None,
            },
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.body.details = Some(details);
        self
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<EditError> for ApiError {
    fn from(err: EditError) -> Self {
        let status = match (err.kind(), &err) {
            (FailureKind::InvalidRequest, _) => StatusCode::BAD_REQUEST,
            (FailureKind::Conflict, _) => StatusCode::CONFLICT,
            (_, EditError::Fetch { status: Some(404), .. }) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let details = err.details();
        let mut api = Self::new(status, err.to_string());
        api.body.details = details;
        api
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let details = err.body().cloned();
        let mut api = Self::new(status, err.to_string());
        api.body.details = details;
        api
    }
}

impl From<CreateError> for ApiError {
    fn from(err: CreateError) -> Self {
        Self::bad_request(err.to_string())
    }
}

//! API request and response types.
//!
//! Every response body uses the same envelope: `{ success, data?, error? }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BoardError, BoardResult, ErrorKind};
use crate::textgen::Tone;

/// Response envelope shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

/// Error half of the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: &BoardError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                kind: error.kind(),
                message: error.message().to_string(),
            }),
        }
    }

    /// Unwrap the envelope on the receiving side.
    pub fn into_result(self) -> BoardResult<T> {
        match (self.success, self.data, self.error) {
            (true, Some(data), _) => Ok(data),
            (_, _, Some(error)) => Err(BoardError::from_parts(error.kind, error.message)),
            (true, None, None) => Err(BoardError::PersistenceFailure(
                "Response reported success without data".to_string(),
            )),
            (false, _, None) => Err(BoardError::PersistenceFailure(
                "Response reported failure without an error".to_string(),
            )),
        }
    }
}

/// Handler result: the envelope on success, a `BoardError` rendered as an envelope otherwise.
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, BoardError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::PersistenceFailure => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::MalformedInput => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for BoardError {
    fn into_response(self) -> Response {
        let status = status_for(self.kind());
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }
        (status, Json(ApiResponse::<()>::err(&self))).into_response()
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Whether the server is running in dev mode (auth disabled)
    pub dev_mode: bool,

    /// Whether the board store survives restarts
    pub persistent: bool,

    /// Whether the task assistant is configured
    pub assistant: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkspaceRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBoardRequest {
    pub name: String,
}

/// Body for creating or renaming a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListTitleRequest {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveTaskRequest {
    pub list_id: Uuid,
    pub target_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveListRequest {
    pub board_id: Uuid,
    pub target_index: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteTaskQuery {
    #[serde(default)]
    pub cascade: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubtasksRequest {
    pub titles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteRequest {
    pub tone: Tone,
}

/// Ids removed by a delete (a cascading delete removes more than one).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub deleted: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_shape() {
        let body = ApiResponse::<()>::err(&BoardError::NotFound("List x".to_string()));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["kind"], "not_found");
        assert_eq!(json["error"]["message"], "List x");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_into_result_rebuilds_error() {
        let body: ApiResponse<u32> = serde_json::from_str(
            r#"{"success": false, "error": {"kind": "malformed_input", "message": "bad"}}"#,
        )
        .unwrap();
        assert_eq!(
            body.into_result(),
            Err(BoardError::MalformedInput("bad".to_string()))
        );

        let body: ApiResponse<u32> =
            serde_json::from_str(r#"{"success": true, "data": 7}"#).unwrap();
        assert_eq!(body.into_result(), Ok(7));
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct Created {
        id: Uuid,
    }

    #[test]
    fn test_envelope_payload_needs_no_default() {
        let id = Uuid::new_v4();
        let body: ApiResponse<Created> =
            serde_json::from_value(serde_json::json!({ "success": true, "data": { "id": id } }))
                .unwrap();
        assert_eq!(body.into_result(), Ok(Created { id }));

        let body: ApiResponse<Created> = serde_json::from_str(
            r#"{"success": false, "error": {"kind": "not_found", "message": "Board b"}}"#,
        )
        .unwrap();
        assert!(body.data.is_none());
        assert_eq!(
            body.into_result(),
            Err(BoardError::NotFound("Board b".to_string()))
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(ErrorKind::PersistenceFailure),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status_for(ErrorKind::MalformedInput), StatusCode::BAD_REQUEST);
    }
}

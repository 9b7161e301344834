use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Success envelope shared by every endpoint:
/// `{ statusCode, data, message, success }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub data: Option<T>,
    pub message: String,
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn new(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            data: Some(data),
            message: message.into(),
            success: status.as_u16() < 400,
        }
    }

    /// 200 with data
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, data, message)
    }

    /// 201 with data
    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CREATED, data, message)
    }

    /// 200 that reports a lookup miss. Public listing pages treat an unknown
    /// category as an empty result instead of an error page.
    pub fn miss(data: T, message: impl Into<String>) -> Self {
        Self {
            status_code: StatusCode::OK.as_u16(),
            data: Some(data),
            message: message.into(),
            success: false,
        }
    }
}

impl ApiResponse<()> {
    /// 200 without data
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status_code: StatusCode::OK.as_u16(),
            data: None,
            message: message.into(),
            success: true,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_envelope_shape() {
        let body = ApiResponse::created(json!({"id": 1}), "Created");
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "statusCode": 201,
                "data": {"id": 1},
                "message": "Created",
                "success": true
            })
        );
    }

    #[test]
    fn test_success_follows_status() {
        let body = ApiResponse::new(StatusCode::BAD_REQUEST, (), "nope");
        assert!(!body.success);

        let miss = ApiResponse::miss(Vec::<u8>::new(), "Category not found");
        assert_eq!(miss.status_code, 200);
        assert!(!miss.success);
    }

    #[test]
    fn test_into_response_uses_status() {
        let response = ApiResponse::created((), "ok").into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}

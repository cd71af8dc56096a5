// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::application::orchestrator::PipelineError;
use crate::domain::repositories::RepositoryError;

/// 应用错误类型
///
/// 封装所有可能的应用层错误，提供统一的错误处理接口
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        if self.0.downcast_ref::<validator::ValidationErrors>().is_some() {
            return StatusCode::BAD_REQUEST;
        }

        match self.0.downcast_ref::<PipelineError>() {
            Some(PipelineError::InvalidTarget(_)) => StatusCode::BAD_REQUEST,
            Some(PipelineError::UpstreamUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Some(PipelineError::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(PipelineError::Repository(RepositoryError::NotFound)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {:#}", self.0);
            "internal server error".to_string()
        } else {
            self.0.to_string()
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
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
    use uuid::Uuid;

    #[test]
    fn test_pipeline_errors_map_to_status_codes() {
        let cases = [
            (PipelineError::InvalidTarget("x".into()), StatusCode::BAD_REQUEST),
            (
                PipelineError::UpstreamUnavailable("down".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (PipelineError::NotFound(Uuid::new_v4()), StatusCode::NOT_FOUND),
        ];
        for (err, expected) in cases {
            assert_eq!(AppError::from(err).into_response().status(), expected);
        }
    }

    #[test]
    fn test_unexpected_errors_hide_details() {
        let err = AppError::from(anyhow::anyhow!("connection string leaked"));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

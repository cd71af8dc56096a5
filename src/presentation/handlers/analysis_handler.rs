// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::application::dto::analysis_request::{AnalysisCreatedDto, AnalysisRequestDto};
use crate::application::orchestrator::Orchestrator;
use crate::presentation::errors::AppError;

/// 提交分析
///
/// 成功时返回 202 和分析 ID，结果通过查询接口获取
pub async fn create_analysis(
    Extension(orchestrator): Extension<Arc<Orchestrator>>,
    Json(payload): Json<AnalysisRequestDto>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let id = orchestrator
        .start_analysis(&payload.url, payload.owner())
        .await?;
    info!(analysis_id = %id, "Analysis accepted");

    Ok((StatusCode::ACCEPTED, Json(AnalysisCreatedDto { id })))
}

/// 查询分析状态、分数和问题
pub async fn get_analysis(
    Extension(orchestrator): Extension<Arc<Orchestrator>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let report = orchestrator.report(id).await?;
    Ok(Json(report))
}

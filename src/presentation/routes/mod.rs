// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::orchestrator::Orchestrator;
use crate::presentation::handlers::analysis_handler;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// 创建应用路由
///
/// # 参数
///
/// * `orchestrator` - 流水线编排器
///
/// # 返回值
///
/// 返回配置好的路由
pub fn routes(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/version", get(version))
        .route("/v1/analyses", post(analysis_handler::create_analysis))
        .route("/v1/analyses/{id}", get(analysis_handler::get_analysis))
        .layer(Extension(orchestrator))
        .layer(TraceLayer::new_for_http())
}

/// 健康检查端点
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

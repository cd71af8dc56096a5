// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 该模块定义了领域层的仓库接口，遵循依赖倒置原则。
/// 具体实现由基础设施层提供。
///
/// 包含的仓库接口：
/// - 分析仓库（analysis_repository）：分析记录及其状态转换
/// - 作业仓库（analysis_job_repository）：每个规则类别的作业
/// - 问题仓库（finding_repository）：问题的只读访问
/// - 任务仓库（task_repository）：投递通道的持久化
/// - 资源存储（asset_store）：抓取快照的一写多读存储
pub mod analysis_job_repository;
pub mod analysis_repository;
pub mod asset_store;
pub mod finding_repository;
pub mod task_repository;

use sea_orm::DbErr;
use thiserror::Error;

use crate::domain::models::analysis::DomainError;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// 存储的数据无法解析
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    /// 请求的状态转换不在状态机中
    #[error(transparent)]
    Domain(#[from] DomainError),
}

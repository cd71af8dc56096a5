// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::RepositoryError;
use crate::domain::models::finding::Finding;
use async_trait::async_trait;
use uuid::Uuid;

/// 问题仓库特质
///
/// 问题只会随作业完成一起写入（见 `AnalysisJobRepository::complete_with_findings`），
/// 因此这里只提供读取接口
#[async_trait]
pub trait FindingRepository: Send + Sync {
    /// 查找分析下的全部问题
    async fn find_by_analysis(&self, analysis_id: Uuid) -> Result<Vec<Finding>, RepositoryError>;

    /// 查找某个作业产生的问题
    async fn find_by_job(&self, job_id: Uuid) -> Result<Vec<Finding>, RepositoryError>;
}

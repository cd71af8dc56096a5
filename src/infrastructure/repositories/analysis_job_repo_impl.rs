// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use super::finding_repo_impl::finding_to_active_model;
use super::{from_db_time, parse_column, to_db_time};
use crate::domain::models::analysis_job::{AnalysisJob, JobStatus};
use crate::domain::models::failure::{FailureCode, FailureReason};
use crate::domain::models::finding::Finding;
use crate::domain::repositories::analysis_job_repository::AnalysisJobRepository;
use crate::domain::repositories::RepositoryError;
use crate::infrastructure::database::entities::{analysis_job, finding};

/// 分析作业仓库实现
#[derive(Clone)]
pub struct AnalysisJobRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl AnalysisJobRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn open_statuses() -> Vec<String> {
        vec![JobStatus::Pending.to_string(), JobStatus::Running.to_string()]
    }
}

impl TryFrom<analysis_job::Model> for AnalysisJob {
    type Error = RepositoryError;

    fn try_from(model: analysis_job::Model) -> Result<Self, Self::Error> {
        let error = match model.error_code {
            Some(code) => Some(FailureReason::new(
                parse_column::<FailureCode>("error_code", &code)?,
                model.error_message.unwrap_or_default(),
            )),
            None => None,
        };

        Ok(Self {
            id: model.id,
            analysis_id: model.analysis_id,
            category: parse_column("category", &model.category)?,
            status: parse_column("job status", &model.status)?,
            error,
            findings_count: model.findings_count,
            created_at: from_db_time(model.created_at),
            updated_at: from_db_time(model.updated_at),
            started_at: model.started_at.map(from_db_time),
            completed_at: model.completed_at.map(from_db_time),
            deadline_at: from_db_time(model.deadline_at),
        })
    }
}

pub(crate) fn job_to_active_model(job: &AnalysisJob) -> analysis_job::ActiveModel {
    analysis_job::ActiveModel {
        id: Set(job.id),
        analysis_id: Set(job.analysis_id),
        category: Set(job.category.to_string()),
        status: Set(job.status.to_string()),
        error_code: Set(job.error.as_ref().map(|e| e.code.to_string())),
        error_message: Set(job.error.as_ref().map(|e| e.message.clone())),
        findings_count: Set(job.findings_count),
        created_at: Set(to_db_time(job.created_at)),
        updated_at: Set(to_db_time(job.updated_at)),
        started_at: Set(job.started_at.map(to_db_time)),
        completed_at: Set(job.completed_at.map(to_db_time)),
        deadline_at: Set(to_db_time(job.deadline_at)),
    }
}

#[async_trait]
impl AnalysisJobRepository for AnalysisJobRepositoryImpl {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<AnalysisJob>, RepositoryError> {
        analysis_job::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(AnalysisJob::try_from)
            .transpose()
    }

    async fn find_by_analysis(
        &self,
        analysis_id: Uuid,
    ) -> Result<Vec<AnalysisJob>, RepositoryError> {
        analysis_job::Entity::find()
            .filter(analysis_job::Column::AnalysisId.eq(analysis_id))
            .order_by_asc(analysis_job::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(AnalysisJob::try_from)
            .collect()
    }

    async fn mark_running(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let now = to_db_time(Utc::now());
        let result = analysis_job::Entity::update_many()
            .col_expr(
                analysis_job::Column::Status,
                Expr::value(JobStatus::Running.to_string()),
            )
            .col_expr(analysis_job::Column::StartedAt, Expr::value(Some(now)))
            .col_expr(analysis_job::Column::UpdatedAt, Expr::value(now))
            .filter(analysis_job::Column::Id.eq(id))
            .filter(analysis_job::Column::Status.eq(JobStatus::Pending.to_string()))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn complete_with_findings(
        &self,
        id: Uuid,
        findings: &[Finding],
    ) -> Result<bool, RepositoryError> {
        let now = to_db_time(Utc::now());
        let txn = self.db.begin().await?;

        let result = analysis_job::Entity::update_many()
            .col_expr(
                analysis_job::Column::Status,
                Expr::value(JobStatus::Completed.to_string()),
            )
            .col_expr(
                analysis_job::Column::FindingsCount,
                Expr::value(findings.len() as i32),
            )
            .col_expr(analysis_job::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(analysis_job::Column::UpdatedAt, Expr::value(now))
            .filter(analysis_job::Column::Id.eq(id))
            .filter(analysis_job::Column::Status.is_in(Self::open_statuses()))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(false);
        }

        if !findings.is_empty() {
            finding::Entity::insert_many(findings.iter().map(finding_to_active_model))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(true)
    }

    async fn mark_failed(&self, id: Uuid, reason: &FailureReason) -> Result<bool, RepositoryError> {
        let now = to_db_time(Utc::now());
        let result = analysis_job::Entity::update_many()
            .col_expr(
                analysis_job::Column::Status,
                Expr::value(JobStatus::Failed.to_string()),
            )
            .col_expr(analysis_job::Column::ErrorCode, Expr::value(Some(reason.code.to_string())))
            .col_expr(
                analysis_job::Column::ErrorMessage,
                Expr::value(Some(reason.message.clone())),
            )
            .col_expr(analysis_job::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(analysis_job::Column::UpdatedAt, Expr::value(now))
            .filter(analysis_job::Column::Id.eq(id))
            .filter(analysis_job::Column::Status.is_in(Self::open_statuses()))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn fail_overdue(
        &self,
        now: DateTime<Utc>,
        reason: &FailureReason,
    ) -> Result<Vec<AnalysisJob>, RepositoryError> {
        let candidates = analysis_job::Entity::find()
            .filter(analysis_job::Column::Status.is_in(Self::open_statuses()))
            .filter(analysis_job::Column::DeadlineAt.lte(to_db_time(now)))
            .order_by_asc(analysis_job::Column::DeadlineAt)
            .all(self.db.as_ref())
            .await?;

        let mut failed = Vec::new();
        for model in candidates {
            let mut job = AnalysisJob::try_from(model)?;
            if !job.is_overdue(now) {
                continue;
            }
            // 工作器可能在查询之后刚好完成，条件更新会跳过它
            if self.mark_failed(job.id, reason).await? {
                job.status = JobStatus::Failed;
                job.error = Some(reason.clone());
                failed.push(job);
            }
        }
        Ok(failed)
    }
}

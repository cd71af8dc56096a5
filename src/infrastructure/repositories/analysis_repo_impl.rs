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

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use super::analysis_job_repo_impl::job_to_active_model;
use super::{from_db_time, parse_column, to_db_time};
use crate::domain::models::analysis::{Analysis, AnalysisStatus};
use crate::domain::models::analysis_job::AnalysisJob;
use crate::domain::models::category::RuleCategory;
use crate::domain::models::failure::{FailureCode, FailureReason};
use crate::domain::repositories::analysis_repository::AnalysisRepository;
use crate::domain::repositories::RepositoryError;
use crate::domain::services::scoring_service::AnalysisOutcome;
use crate::infrastructure::database::entities::{analysis, analysis_job};

/// 分析仓库实现
#[derive(Clone)]
pub struct AnalysisRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl AnalysisRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl TryFrom<analysis::Model> for Analysis {
    type Error = RepositoryError;

    fn try_from(model: analysis::Model) -> Result<Self, Self::Error> {
        let category_scores: BTreeMap<RuleCategory, u32> = match model.category_scores {
            Some(value) => serde_json::from_value(value)?,
            None => BTreeMap::new(),
        };
        let missing_categories: Vec<RuleCategory> = match model.missing_categories {
            Some(value) => serde_json::from_value(value)?,
            None => Vec::new(),
        };
        let failure = match model.failure_code {
            Some(code) => Some(FailureReason::new(
                parse_column::<FailureCode>("failure_code", &code)?,
                model.failure_message.unwrap_or_default(),
            )),
            None => None,
        };

        Ok(Self {
            id: model.id,
            target_url: model.target_url,
            owner_id: model.owner_id,
            workspace_id: model.workspace_id,
            status: parse_column("analysis status", &model.status)?,
            overall_score: model.overall_score,
            category_scores,
            missing_categories,
            failure,
            created_at: from_db_time(model.created_at),
            updated_at: from_db_time(model.updated_at),
            processing_started_at: model.processing_started_at.map(from_db_time),
            completed_at: model.completed_at.map(from_db_time),
            expires_at: model.expires_at.map(from_db_time),
        })
    }
}

fn to_active_model(analysis: &Analysis) -> Result<analysis::ActiveModel, RepositoryError> {
    Ok(analysis::ActiveModel {
        id: Set(analysis.id),
        target_url: Set(analysis.target_url.clone()),
        owner_id: Set(analysis.owner_id),
        workspace_id: Set(analysis.workspace_id),
        status: Set(analysis.status.to_string()),
        overall_score: Set(analysis.overall_score),
        category_scores: Set(Some(serde_json::to_value(&analysis.category_scores)?)),
        missing_categories: Set(Some(serde_json::to_value(&analysis.missing_categories)?)),
        failure_code: Set(analysis.failure.as_ref().map(|f| f.code.to_string())),
        failure_message: Set(analysis.failure.as_ref().map(|f| f.message.clone())),
        created_at: Set(to_db_time(analysis.created_at)),
        updated_at: Set(to_db_time(analysis.updated_at)),
        processing_started_at: Set(analysis.processing_started_at.map(to_db_time)),
        completed_at: Set(analysis.completed_at.map(to_db_time)),
        expires_at: Set(analysis.expires_at.map(to_db_time)),
    })
}

/// 条件更新的状态守卫
///
/// 只有状态机中存在 `from → to` 这条边时才返回 `from`，作为 `WHERE status = ?` 的取值
fn guard(from: AnalysisStatus, to: AnalysisStatus) -> Result<String, RepositoryError> {
    from.check_transition(to)?;
    Ok(from.to_string())
}

#[async_trait]
impl AnalysisRepository for AnalysisRepositoryImpl {
    async fn create(&self, analysis: &Analysis) -> Result<Analysis, RepositoryError> {
        to_active_model(analysis)?.insert(self.db.as_ref()).await?;
        Ok(analysis.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Analysis>, RepositoryError> {
        analysis::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(Analysis::try_from)
            .transpose()
    }

    async fn start_processing(
        &self,
        id: Uuid,
        jobs: &[AnalysisJob],
    ) -> Result<bool, RepositoryError> {
        let expected = guard(AnalysisStatus::Pending, AnalysisStatus::Processing)?;
        let now = to_db_time(Utc::now());
        let txn = self.db.begin().await?;

        let result = analysis::Entity::update_many()
            .col_expr(
                analysis::Column::Status,
                Expr::value(AnalysisStatus::Processing.to_string()),
            )
            .col_expr(analysis::Column::ProcessingStartedAt, Expr::value(Some(now)))
            .col_expr(analysis::Column::UpdatedAt, Expr::value(now))
            .filter(analysis::Column::Id.eq(id))
            .filter(analysis::Column::Status.eq(expected))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(false);
        }

        if !jobs.is_empty() {
            analysis_job::Entity::insert_many(jobs.iter().map(job_to_active_model))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(true)
    }

    async fn fail_pending(&self, id: Uuid, reason: &FailureReason) -> Result<bool, RepositoryError> {
        let expected = guard(AnalysisStatus::Pending, AnalysisStatus::Failed)?;
        let now = to_db_time(Utc::now());
        let result = analysis::Entity::update_many()
            .col_expr(
                analysis::Column::Status,
                Expr::value(AnalysisStatus::Failed.to_string()),
            )
            .col_expr(analysis::Column::FailureCode, Expr::value(Some(reason.code.to_string())))
            .col_expr(analysis::Column::FailureMessage, Expr::value(Some(reason.message.clone())))
            .col_expr(analysis::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(analysis::Column::UpdatedAt, Expr::value(now))
            .filter(analysis::Column::Id.eq(id))
            .filter(analysis::Column::Status.eq(expected))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn finalize(&self, id: Uuid, outcome: &AnalysisOutcome) -> Result<bool, RepositoryError> {
        let expected = guard(AnalysisStatus::Processing, outcome.status)?;
        let now = to_db_time(Utc::now());
        let result = analysis::Entity::update_many()
            .col_expr(analysis::Column::Status, Expr::value(outcome.status.to_string()))
            .col_expr(analysis::Column::OverallScore, Expr::value(outcome.overall_score))
            .col_expr(
                analysis::Column::CategoryScores,
                Expr::value(Some(serde_json::to_value(&outcome.category_scores)?)),
            )
            .col_expr(
                analysis::Column::MissingCategories,
                Expr::value(Some(serde_json::to_value(&outcome.missing_categories)?)),
            )
            .col_expr(
                analysis::Column::FailureCode,
                Expr::value(outcome.failure.as_ref().map(|f| f.code.to_string())),
            )
            .col_expr(
                analysis::Column::FailureMessage,
                Expr::value(outcome.failure.as_ref().map(|f| f.message.clone())),
            )
            .col_expr(analysis::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(analysis::Column::UpdatedAt, Expr::value(now))
            .filter(analysis::Column::Id.eq(id))
            .filter(analysis::Column::Status.eq(expected))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn find_stale_pending(
        &self,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, RepositoryError> {
        let models = analysis::Entity::find()
            .filter(analysis::Column::Status.eq(AnalysisStatus::Pending.to_string()))
            .filter(analysis::Column::CreatedAt.lt(to_db_time(created_before)))
            .order_by_asc(analysis::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        Ok(models.into_iter().map(|m| m.id).collect())
    }

    async fn find_stale_processing(
        &self,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, RepositoryError> {
        let models = analysis::Entity::find()
            .filter(analysis::Column::Status.eq(AnalysisStatus::Processing.to_string()))
            .filter(analysis::Column::UpdatedAt.lt(to_db_time(updated_before)))
            .order_by_asc(analysis::Column::UpdatedAt)
            .all(self.db.as_ref())
            .await?;
        Ok(models.into_iter().map(|m| m.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::analysis::OwnerContext;
    use crate::domain::repositories::analysis_job_repository::AnalysisJobRepository;
    use crate::infrastructure::repositories::analysis_job_repo_impl::AnalysisJobRepositoryImpl;
    use crate::infrastructure::repositories::test_support::memory_db;
    use chrono::Duration;

    fn new_analysis() -> Analysis {
        Analysis::new(
            "https://example.com/".to_string(),
            OwnerContext::anonymous(),
            Duration::hours(24),
        )
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let repo = AnalysisRepositoryImpl::new(memory_db().await);
        let analysis = new_analysis();
        repo.create(&analysis).await.unwrap();

        let found = repo.find_by_id(analysis.id).await.unwrap().unwrap();
        assert_eq!(found.status, AnalysisStatus::Pending);
        assert_eq!(found.target_url, "https://example.com/");
        assert!(found.expires_at.is_some());
        assert!(repo.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_start_processing_is_conditional() {
        let db = memory_db().await;
        let repo = AnalysisRepositoryImpl::new(db.clone());
        let jobs_repo = AnalysisJobRepositoryImpl::new(db);
        let analysis = new_analysis();
        repo.create(&analysis).await.unwrap();

        let jobs: Vec<AnalysisJob> = RuleCategory::ALL
            .iter()
            .map(|c| AnalysisJob::new(analysis.id, *c, Duration::minutes(5)))
            .collect();
        assert!(repo.start_processing(analysis.id, &jobs).await.unwrap());

        let duplicate: Vec<AnalysisJob> = RuleCategory::ALL
            .iter()
            .map(|c| AnalysisJob::new(analysis.id, *c, Duration::minutes(5)))
            .collect();
        assert!(!repo.start_processing(analysis.id, &duplicate).await.unwrap());

        assert_eq!(jobs_repo.find_by_analysis(analysis.id).await.unwrap().len(), 6);
        let found = repo.find_by_id(analysis.id).await.unwrap().unwrap();
        assert_eq!(found.status, AnalysisStatus::Processing);
        assert!(found.processing_started_at.is_some());
    }

    #[tokio::test]
    async fn test_fail_pending_only_from_pending() {
        let repo = AnalysisRepositoryImpl::new(memory_db().await);
        let analysis = new_analysis();
        repo.create(&analysis).await.unwrap();

        let reason = FailureReason::new(FailureCode::NonSuccessStatus, "HTTP 404");
        assert!(repo.fail_pending(analysis.id, &reason).await.unwrap());
        assert!(!repo.fail_pending(analysis.id, &reason).await.unwrap());
        assert!(!repo.start_processing(analysis.id, &[]).await.unwrap());

        let found = repo.find_by_id(analysis.id).await.unwrap().unwrap();
        assert_eq!(found.status, AnalysisStatus::Failed);
        assert_eq!(found.failure.unwrap().code, FailureCode::NonSuccessStatus);
    }

    #[tokio::test]
    async fn test_finalize_once() {
        let repo = AnalysisRepositoryImpl::new(memory_db().await);
        let analysis = new_analysis();
        repo.create(&analysis).await.unwrap();
        repo.start_processing(analysis.id, &[]).await.unwrap();

        let mut category_scores = BTreeMap::new();
        category_scores.insert(RuleCategory::Seo, 90);
        category_scores.insert(RuleCategory::Media, 100);
        let outcome = AnalysisOutcome {
            status: AnalysisStatus::CompletedWithErrors,
            overall_score: Some(95.0),
            category_scores,
            missing_categories: vec![RuleCategory::Keyboard],
            failure: None,
        };
        assert!(repo.finalize(analysis.id, &outcome).await.unwrap());

        let mut second = outcome.clone();
        second.status = AnalysisStatus::Failed;
        second.overall_score = None;
        assert!(!repo.finalize(analysis.id, &second).await.unwrap());

        let found = repo.find_by_id(analysis.id).await.unwrap().unwrap();
        assert_eq!(found.status, AnalysisStatus::CompletedWithErrors);
        assert_eq!(found.overall_score, Some(95.0));
        assert_eq!(found.category_scores.get(&RuleCategory::Seo), Some(&90));
        assert_eq!(found.missing_categories, vec![RuleCategory::Keyboard]);
        assert!(found.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_finalize_rejects_non_terminal_outcome() {
        let repo = AnalysisRepositoryImpl::new(memory_db().await);
        let analysis = new_analysis();
        repo.create(&analysis).await.unwrap();
        repo.start_processing(analysis.id, &[]).await.unwrap();

        let outcome = AnalysisOutcome {
            status: AnalysisStatus::Pending,
            overall_score: None,
            category_scores: BTreeMap::new(),
            missing_categories: Vec::new(),
            failure: None,
        };
        let err = repo.finalize(analysis.id, &outcome).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Domain(_)));

        let found = repo.find_by_id(analysis.id).await.unwrap().unwrap();
        assert_eq!(found.status, AnalysisStatus::Processing);
    }

    #[tokio::test]
    async fn test_stale_queries() {
        let repo = AnalysisRepositoryImpl::new(memory_db().await);
        let pending = new_analysis();
        repo.create(&pending).await.unwrap();
        let processing = new_analysis();
        repo.create(&processing).await.unwrap();
        repo.start_processing(processing.id, &[]).await.unwrap();

        let future = Utc::now() + Duration::minutes(1);
        assert_eq!(repo.find_stale_pending(future).await.unwrap(), vec![pending.id]);
        assert_eq!(repo.find_stale_processing(future).await.unwrap(), vec![processing.id]);

        let past = Utc::now() - Duration::minutes(1);
        assert!(repo.find_stale_pending(past).await.unwrap().is_empty());
        assert!(repo.find_stale_processing(past).await.unwrap().is_empty());
    }
}

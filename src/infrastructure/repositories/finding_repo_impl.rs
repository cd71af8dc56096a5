// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use std::sync::Arc;
use uuid::Uuid;

use super::{from_db_time, parse_column, to_db_time};
use crate::domain::models::finding::Finding;
use crate::domain::repositories::finding_repository::FindingRepository;
use crate::domain::repositories::RepositoryError;
use crate::infrastructure::database::entities::finding;

/// 问题仓库实现
///
/// 问题只在作业完成的事务中写入，这里只提供读取
#[derive(Clone)]
pub struct FindingRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl FindingRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl TryFrom<finding::Model> for Finding {
    type Error = RepositoryError;

    fn try_from(model: finding::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            job_id: model.job_id,
            analysis_id: model.analysis_id,
            category: parse_column("category", &model.category)?,
            rule_key: model.rule_key,
            severity: parse_column("severity", &model.severity)?,
            title: model.title,
            location: model.location,
            metric_value: model.metric_value,
            remediation: model.remediation,
            created_at: from_db_time(model.created_at),
        })
    }
}

pub(crate) fn finding_to_active_model(finding: &Finding) -> finding::ActiveModel {
    finding::ActiveModel {
        id: Set(finding.id),
        job_id: Set(finding.job_id),
        analysis_id: Set(finding.analysis_id),
        category: Set(finding.category.to_string()),
        rule_key: Set(finding.rule_key.clone()),
        severity: Set(finding.severity.to_string()),
        title: Set(finding.title.clone()),
        location: Set(finding.location.clone()),
        metric_value: Set(finding.metric_value),
        remediation: Set(finding.remediation.clone()),
        created_at: Set(to_db_time(finding.created_at)),
    }
}

#[async_trait]
impl FindingRepository for FindingRepositoryImpl {
    async fn find_by_analysis(&self, analysis_id: Uuid) -> Result<Vec<Finding>, RepositoryError> {
        finding::Entity::find()
            .filter(finding::Column::AnalysisId.eq(analysis_id))
            .order_by_asc(finding::Column::Category)
            .order_by_asc(finding::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(Finding::try_from)
            .collect()
    }

    async fn find_by_job(&self, job_id: Uuid) -> Result<Vec<Finding>, RepositoryError> {
        finding::Entity::find()
            .filter(finding::Column::JobId.eq(job_id))
            .order_by_asc(finding::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(Finding::try_from)
            .collect()
    }
}

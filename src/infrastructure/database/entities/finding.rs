// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "findings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub job_id: Uuid,
    pub analysis_id: Uuid,
    pub category: String,
    pub rule_key: String,
    pub severity: String,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub location: String,
    pub metric_value: Option<f64>,
    pub remediation: Option<Json>,
    pub created_at: ChronoDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::analysis_job::Entity",
        from = "Column::JobId",
        to = "super::analysis_job::Column::Id",
        on_delete = "Cascade"
    )]
    AnalysisJob,
}

impl Related<super::analysis_job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AnalysisJob.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

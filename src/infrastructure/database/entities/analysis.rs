// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "analyses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(column_type = "Text")]
    pub target_url: String,
    pub owner_id: Option<Uuid>,
    pub workspace_id: Option<Uuid>,
    pub status: String,
    pub overall_score: Option<f64>,
    pub category_scores: Option<Json>,
    pub missing_categories: Option<Json>,
    pub failure_code: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub failure_message: Option<String>,
    pub created_at: ChronoDateTimeWithTimeZone,
    pub updated_at: ChronoDateTimeWithTimeZone,
    pub processing_started_at: Option<ChronoDateTimeWithTimeZone>,
    pub completed_at: Option<ChronoDateTimeWithTimeZone>,
    pub expires_at: Option<ChronoDateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::analysis_job::Entity")]
    AnalysisJob,
}

impl Related<super::analysis_job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AnalysisJob.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

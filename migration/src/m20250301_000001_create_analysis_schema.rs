// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Analyses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Analyses::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Analyses::TargetUrl).text().not_null())
                    .col(ColumnDef::new(Analyses::OwnerId).uuid())
                    .col(ColumnDef::new(Analyses::WorkspaceId).uuid())
                    .col(ColumnDef::new(Analyses::Status).string().not_null())
                    .col(ColumnDef::new(Analyses::OverallScore).double())
                    .col(ColumnDef::new(Analyses::CategoryScores).json())
                    .col(ColumnDef::new(Analyses::MissingCategories).json())
                    .col(ColumnDef::new(Analyses::FailureCode).string())
                    .col(ColumnDef::new(Analyses::FailureMessage).text())
                    .col(
                        ColumnDef::new(Analyses::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Analyses::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Analyses::ProcessingStartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Analyses::CompletedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Analyses::ExpiresAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_analyses_status_updated")
                    .table(Analyses::Table)
                    .col(Analyses::Status)
                    .col(Analyses::UpdatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AnalysisJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AnalysisJobs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AnalysisJobs::AnalysisId).uuid().not_null())
                    .col(ColumnDef::new(AnalysisJobs::Category).string().not_null())
                    .col(ColumnDef::new(AnalysisJobs::Status).string().not_null())
                    .col(ColumnDef::new(AnalysisJobs::ErrorCode).string())
                    .col(ColumnDef::new(AnalysisJobs::ErrorMessage).text())
                    .col(
                        ColumnDef::new(AnalysisJobs::FindingsCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(AnalysisJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(AnalysisJobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(AnalysisJobs::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(AnalysisJobs::CompletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(AnalysisJobs::DeadlineAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_analysis_jobs_analysis")
                            .from(AnalysisJobs::Table, AnalysisJobs::AnalysisId)
                            .to(Analyses::Table, Analyses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 同一个分析的同一类别只允许存在一个作业
        manager
            .create_index(
                Index::create()
                    .name("idx_analysis_jobs_analysis_category")
                    .table(AnalysisJobs::Table)
                    .col(AnalysisJobs::AnalysisId)
                    .col(AnalysisJobs::Category)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_analysis_jobs_status_deadline")
                    .table(AnalysisJobs::Table)
                    .col(AnalysisJobs::Status)
                    .col(AnalysisJobs::DeadlineAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Findings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Findings::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Findings::JobId).uuid().not_null())
                    .col(ColumnDef::new(Findings::AnalysisId).uuid().not_null())
                    .col(ColumnDef::new(Findings::Category).string().not_null())
                    .col(ColumnDef::new(Findings::RuleKey).string().not_null())
                    .col(ColumnDef::new(Findings::Severity).string().not_null())
                    .col(ColumnDef::new(Findings::Title).string().not_null())
                    .col(ColumnDef::new(Findings::Location).text().not_null())
                    .col(ColumnDef::new(Findings::MetricValue).double())
                    .col(ColumnDef::new(Findings::Remediation).json())
                    .col(
                        ColumnDef::new(Findings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_findings_job")
                            .from(Findings::Table, Findings::JobId)
                            .to(AnalysisJobs::Table, AnalysisJobs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_findings_analysis")
                            .from(Findings::Table, Findings::AnalysisId)
                            .to(Analyses::Table, Analyses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_findings_analysis")
                    .table(Findings::Table)
                    .col(Findings::AnalysisId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Findings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AnalysisJobs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Analyses::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Analyses {
    Table,
    Id,
    TargetUrl,
    OwnerId,
    WorkspaceId,
    Status,
    OverallScore,
    CategoryScores,
    MissingCategories,
    FailureCode,
    FailureMessage,
    CreatedAt,
    UpdatedAt,
    ProcessingStartedAt,
    CompletedAt,
    ExpiresAt,
}

#[derive(DeriveIden)]
enum AnalysisJobs {
    Table,
    Id,
    AnalysisId,
    Category,
    Status,
    ErrorCode,
    ErrorMessage,
    FindingsCount,
    CreatedAt,
    UpdatedAt,
    StartedAt,
    CompletedAt,
    DeadlineAt,
}

#[derive(DeriveIden)]
enum Findings {
    Table,
    Id,
    JobId,
    AnalysisId,
    Category,
    RuleKey,
    Severity,
    Title,
    Location,
    MetricValue,
    Remediation,
    CreatedAt,
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{create_test_app, create_test_app_with, ScriptedLoader, CLEAN_PAGE};
use auditrs::application::orchestrator::{OrchestratorConfig, PipelineError};
use auditrs::domain::models::analysis::{AnalysisStatus, OwnerContext};
use auditrs::domain::models::analysis_job::JobStatus;
use auditrs::domain::models::category::RuleCategory;
use auditrs::domain::models::failure::{FailureCode, FailureReason};
use auditrs::domain::models::finding::NewFinding;
use auditrs::domain::models::task::{FetchTaskPayload, Task};
use auditrs::rules::{PageSnapshot, RuleError, RuleEvaluator, WorkerRegistry};
use auditrs::workers::Worker;
use chrono::Utc;

const TARGET: &str = "https://example.com/";

struct BrokenKeyboardEvaluator;

impl RuleEvaluator for BrokenKeyboardEvaluator {
    fn category(&self) -> RuleCategory {
        RuleCategory::Keyboard
    }

    fn evaluate(&self, _page: &PageSnapshot) -> Result<Vec<NewFinding>, RuleError> {
        Err(RuleError::Evaluation("focus traversal failed".to_string()))
    }
}

#[tokio::test]
async fn test_clean_page_scores_full_marks() {
    let app = create_test_app(ScriptedLoader::default().page(TARGET, 200, CLEAN_PAGE)).await;

    let id = app
        .orchestrator
        .start_analysis("example.com", OwnerContext::anonymous())
        .await
        .unwrap();
    app.drain().await;

    let report = app.orchestrator.report(id).await.unwrap();
    assert_eq!(report.status, AnalysisStatus::Completed);
    assert_eq!(report.overall_score, Some(100.0));
    assert_eq!(report.jobs.len(), RuleCategory::ALL.len());
    assert!(report.jobs.iter().all(|j| j.status == JobStatus::Completed));
    assert!(report.findings.is_empty(), "{:?}", report.findings);
    assert!(report.category_scores.values().all(|score| *score == 100));
    assert!(report.missing_categories.is_empty());
    assert!(report.completed_at.is_some());

    // html、元数据和桌面截图
    assert_eq!(app.store.keys().await.len(), 3);
    assert_eq!(app.loader.loads(), 1);
}

#[tokio::test]
async fn test_findings_reduce_category_score() {
    let page = CLEAN_PAGE.replace(
        "<p>Welcome to the example.</p>",
        r#"<p>Welcome to the example.</p><img src="/photo.JPG?v=2">"#,
    );
    let app = create_test_app(ScriptedLoader::default().page(TARGET, 200, &page)).await;

    let id = app
        .orchestrator
        .start_analysis(TARGET, OwnerContext::anonymous())
        .await
        .unwrap();
    app.drain().await;

    let report = app.orchestrator.report(id).await.unwrap();
    assert_eq!(report.status, AnalysisStatus::Completed);
    // critical 10 + minor 1 + minor 1
    assert_eq!(report.category_scores[&RuleCategory::Images], 88);
    assert_eq!(report.overall_score, Some(98.0));

    let image_findings: Vec<_> = report
        .findings
        .iter()
        .filter(|f| f.category == RuleCategory::Images)
        .collect();
    assert_eq!(image_findings.len(), 3);
    assert!(image_findings.iter().all(|f| f.location == "/photo.JPG?v=2"));
}

#[tokio::test]
async fn test_failed_category_completes_with_errors() {
    let app = create_test_app_with(
        ScriptedLoader::default().page(TARGET, 200, CLEAN_PAGE),
        WorkerRegistry::with_defaults().register(BrokenKeyboardEvaluator),
        OrchestratorConfig::default(),
    )
    .await;

    let id = app
        .orchestrator
        .start_analysis(TARGET, OwnerContext::anonymous())
        .await
        .unwrap();
    app.drain().await;

    let report = app.orchestrator.report(id).await.unwrap();
    assert_eq!(report.status, AnalysisStatus::CompletedWithErrors);
    assert_eq!(report.missing_categories, vec![RuleCategory::Keyboard]);
    assert_eq!(report.overall_score, Some(100.0));
    assert!(!report.category_scores.contains_key(&RuleCategory::Keyboard));

    let keyboard = report
        .jobs
        .iter()
        .find(|j| j.category == RuleCategory::Keyboard)
        .unwrap();
    assert_eq!(keyboard.status, JobStatus::Failed);
    assert_eq!(
        keyboard.error.as_ref().unwrap().code,
        FailureCode::RuleEvaluationError
    );
}

#[tokio::test]
async fn test_not_found_page_fails_without_jobs() {
    let app = create_test_app(ScriptedLoader::default().page(TARGET, 404, "<h1>Not Found</h1>")).await;

    let id = app
        .orchestrator
        .start_analysis(TARGET, OwnerContext::anonymous())
        .await
        .unwrap();
    app.drain().await;

    let report = app.orchestrator.report(id).await.unwrap();
    assert_eq!(report.status, AnalysisStatus::Failed);
    assert_eq!(report.failure.unwrap().code, FailureCode::NonSuccessStatus);
    assert!(report.jobs.is_empty());
    assert!(report.overall_score.is_none());
    assert!(app.store.keys().await.is_empty());
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    let app = create_test_app(ScriptedLoader::default()).await;

    let id = app
        .orchestrator
        .start_analysis("https://unreachable.example/", OwnerContext::anonymous())
        .await
        .unwrap();
    app.drain().await;

    let analysis = app.orchestrator.find_analysis(id).await.unwrap().unwrap();
    assert_eq!(analysis.status, AnalysisStatus::Failed);
    assert_eq!(analysis.failure.unwrap().code, FailureCode::NetworkError);
}

#[tokio::test]
async fn test_invalid_input_is_rejected_synchronously() {
    let app = create_test_app(ScriptedLoader::default()).await;

    let result = app
        .orchestrator
        .start_analysis("ftp://example.com/file", OwnerContext::anonymous())
        .await;
    assert!(matches!(result, Err(PipelineError::InvalidTarget(_))));

    app.drain().await;
    assert_eq!(app.loader.loads(), 0);
}

#[tokio::test]
async fn test_redelivered_fetch_does_not_refetch() {
    let app = create_test_app(ScriptedLoader::default().page(TARGET, 200, CLEAN_PAGE)).await;

    let id = app
        .orchestrator
        .start_analysis(TARGET, OwnerContext::anonymous())
        .await
        .unwrap();
    app.drain().await;

    let duplicate = Task::fetch(
        &FetchTaskPayload {
            analysis_id: id,
            target_url: TARGET.to_string(),
        },
        3,
    )
    .unwrap();
    app.queue.enqueue(duplicate).await.unwrap();
    app.drain().await;

    assert_eq!(app.loader.loads(), 1);
    let report = app.orchestrator.report(id).await.unwrap();
    assert_eq!(report.status, AnalysisStatus::Completed);
    assert_eq!(report.jobs.len(), RuleCategory::ALL.len());
}

#[tokio::test]
async fn test_terminal_analysis_ignores_late_reports() {
    let app = create_test_app(ScriptedLoader::default().page(TARGET, 200, CLEAN_PAGE)).await;

    let id = app
        .orchestrator
        .start_analysis(TARGET, OwnerContext::anonymous())
        .await
        .unwrap();
    app.drain().await;
    let before = app.orchestrator.report(id).await.unwrap();

    let applied = app
        .orchestrator
        .on_fetch_failed(id, FailureReason::new(FailureCode::NetworkError, "late"))
        .await
        .unwrap();
    assert!(!applied);

    let job = before.jobs[0].id;
    app.orchestrator
        .on_job_failed(job, FailureReason::new(FailureCode::WorkerCrash, "late"))
        .await
        .unwrap();

    let after = app.orchestrator.report(id).await.unwrap();
    assert_eq!(after.status, AnalysisStatus::Completed);
    assert_eq!(after.overall_score, before.overall_score);
    assert_eq!(after.completed_at, before.completed_at);
    let late_job = after.jobs.iter().find(|j| j.id == job).unwrap();
    assert_eq!(late_job.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_sweep_reclaims_jobs_nobody_picked_up() {
    let config = OrchestratorConfig {
        job_timeout: chrono::Duration::seconds(-1),
        ..OrchestratorConfig::default()
    };
    let app = create_test_app_with(
        ScriptedLoader::default().page(TARGET, 200, CLEAN_PAGE),
        WorkerRegistry::with_defaults(),
        config,
    )
    .await;

    let id = app
        .orchestrator
        .start_analysis(TARGET, OwnerContext::anonymous())
        .await
        .unwrap();
    // 只运行抓取阶段，规则工作器全部缺席
    assert!(app.fetch_worker.process_next().await.unwrap());

    let report = app.orchestrator.sweep(Utc::now()).await.unwrap();
    assert_eq!(report.reclaimed_jobs, RuleCategory::ALL.len());
    assert_eq!(report.finalized, 1);

    let analysis = app.orchestrator.find_analysis(id).await.unwrap().unwrap();
    assert_eq!(analysis.status, AnalysisStatus::Failed);
    assert_eq!(analysis.failure.unwrap().code, FailureCode::AllJobsFailed);

    // 迟到的规则工作器不会改变已终结的分析
    app.drain().await;
    let after = app.orchestrator.report(id).await.unwrap();
    assert_eq!(after.status, AnalysisStatus::Failed);
    assert!(after.jobs.iter().all(|j| j.status == JobStatus::Failed));
    assert!(after
        .jobs
        .iter()
        .all(|j| j.error.as_ref().unwrap().code == FailureCode::Timeout));
}

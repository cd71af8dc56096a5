// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::orchestrator::{Orchestrator, PipelineError, SweepReport};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// 维护调度器
///
/// 定期执行超时清扫：释放过期任务锁、回收超时作业、终止停滞的分析
pub struct MaintenanceScheduler {
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
}

impl MaintenanceScheduler {
    /// 创建新的维护调度器实例
    ///
    /// # 参数
    ///
    /// * `orchestrator` - 流水线编排器
    /// * `interval` - 清扫间隔
    pub fn new(orchestrator: Arc<Orchestrator>, interval: Duration) -> Self {
        Self {
            orchestrator,
            interval,
        }
    }

    /// 执行一次清扫
    pub async fn tick(&self) -> Result<SweepReport, PipelineError> {
        self.orchestrator.sweep(Utc::now()).await
    }

    /// 启动调度器后台任务，直到收到关闭信号
    ///
    /// # 返回值
    ///
    /// 返回后台任务的句柄
    pub fn start(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("Maintenance scheduler started, interval {:?}", self.interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.tick().await {
                            Ok(report) => debug!(?report, "Maintenance tick"),
                            Err(e) => error!("Timeout sweep failed: {}", e),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Maintenance scheduler stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::orchestrator::OrchestratorConfig;
    use crate::domain::models::analysis::{AnalysisStatus, OwnerContext};
    use crate::infrastructure::repositories::analysis_job_repo_impl::AnalysisJobRepositoryImpl;
    use crate::infrastructure::repositories::analysis_repo_impl::AnalysisRepositoryImpl;
    use crate::infrastructure::repositories::finding_repo_impl::FindingRepositoryImpl;
    use crate::infrastructure::repositories::task_repo_impl::TaskRepositoryImpl;
    use crate::infrastructure::repositories::test_support::memory_db;
    use crate::queue::task_queue::DatabaseTaskQueue;

    async fn orchestrator(config: OrchestratorConfig) -> Arc<Orchestrator> {
        let db = memory_db().await;
        let queue = Arc::new(DatabaseTaskQueue::new(
            Arc::new(TaskRepositoryImpl::new(db.clone())),
            chrono::Duration::minutes(2),
        ));
        Arc::new(Orchestrator::new(
            Arc::new(AnalysisRepositoryImpl::new(db.clone())),
            Arc::new(AnalysisJobRepositoryImpl::new(db.clone())),
            Arc::new(FindingRepositoryImpl::new(db)),
            queue,
            config,
        ))
    }

    #[tokio::test]
    async fn test_tick_reclaims_expired_jobs() {
        let config = OrchestratorConfig {
            job_timeout: chrono::Duration::seconds(-1),
            ..OrchestratorConfig::default()
        };
        let orchestrator = orchestrator(config).await;
        let id = orchestrator
            .start_analysis("https://example.com", OwnerContext::anonymous())
            .await
            .unwrap();
        orchestrator.on_fetch_complete(id, vec![]).await.unwrap();

        let scheduler = MaintenanceScheduler::new(orchestrator.clone(), Duration::from_secs(60));
        let report = scheduler.tick().await.unwrap();

        assert_eq!(report.reclaimed_jobs, 6);
        assert_eq!(report.finalized, 1);
        let analysis = orchestrator.find_analysis(id).await.unwrap().unwrap();
        assert_eq!(analysis.status, AnalysisStatus::Failed);
    }

    #[tokio::test]
    async fn test_scheduler_stops_on_shutdown() {
        let orchestrator = orchestrator(OrchestratorConfig::default()).await;
        let (tx, rx) = watch::channel(false);
        let handle = MaintenanceScheduler::new(orchestrator, Duration::from_millis(10)).start(rx);

        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}

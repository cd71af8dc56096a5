// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::fetcher::Fetcher;
use crate::application::orchestrator::Orchestrator;
use crate::config::settings::WorkerSettings;
use crate::domain::repositories::asset_store::AssetStore;
use crate::queue::scheduler::MaintenanceScheduler;
use crate::queue::task_queue::TaskQueue;
use crate::rules::WorkerRegistry;
use crate::workers::fetch_worker::FetchWorker;
use crate::workers::rule_worker::RuleWorker;
use crate::workers::worker::Worker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// 工作器共享依赖
#[derive(Clone)]
pub struct WorkerDependencies {
    pub queue: Arc<dyn TaskQueue>,
    pub orchestrator: Arc<Orchestrator>,
    pub fetcher: Arc<Fetcher>,
    pub registry: Arc<WorkerRegistry>,
    pub store: Arc<dyn AssetStore>,
}

/// 工作管理器
///
/// 持有全部后台任务的句柄，并通过 watch 通道统一发出关闭信号
pub struct WorkerManager {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Default for WorkerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerManager {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown,
            handles: Vec::new(),
        }
    }

    /// 启动抓取工作器、规则工作器和维护调度器
    pub fn start(
        deps: WorkerDependencies,
        settings: &WorkerSettings,
        sweep_interval: Duration,
    ) -> Self {
        let mut manager = Self::new();

        for _ in 0..settings.fetch_concurrency {
            manager.spawn(FetchWorker::new(
                deps.queue.clone(),
                deps.orchestrator.clone(),
                deps.fetcher.clone(),
                settings.poll_interval(),
            ));
        }

        for _ in 0..settings.rule_concurrency {
            manager.spawn(RuleWorker::new(
                deps.queue.clone(),
                deps.orchestrator.clone(),
                deps.registry.clone(),
                deps.store.clone(),
                settings.evaluation_timeout(),
                settings.poll_interval(),
            ));
        }

        let scheduler = MaintenanceScheduler::new(deps.orchestrator.clone(), sweep_interval);
        manager
            .handles
            .push(scheduler.start(manager.shutdown.subscribe()));

        info!(
            fetch_workers = settings.fetch_concurrency,
            rule_workers = settings.rule_concurrency,
            "Workers started"
        );
        manager
    }

    /// 在独立任务中运行一个工作器
    pub fn spawn<W: Worker + 'static>(&mut self, worker: W) {
        let shutdown = self.shutdown.subscribe();
        self.handles.push(tokio::spawn(async move {
            worker.run(shutdown).await;
        }));
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// 发出关闭信号并等待工作器结束当前任务
    pub async fn shutdown(self, grace: Duration) {
        info!("Shutting down workers...");
        let _ = self.shutdown.send(true);

        for handle in self.handles {
            let abort = handle.abort_handle();
            match tokio::time::timeout(grace, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Worker task ended abnormally: {}", e),
                Err(_) => {
                    warn!("Worker did not stop within {:?}, aborting", grace);
                    abort.abort();
                }
            }
        }

        info!("Workers shut down successfully");
    }
}

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

use auditrs::application::fetcher::Fetcher;
use auditrs::application::orchestrator::{Orchestrator, OrchestratorConfig};
use auditrs::config::settings::{FetcherSettings, Settings};
use auditrs::engines::browser_engine::BrowserLoader;
use auditrs::engines::http_engine::HttpLoader;
use auditrs::engines::traits::{LoadOptions, PageLoader};
use auditrs::infrastructure::database::connection;
use auditrs::infrastructure::metrics;
use auditrs::infrastructure::repositories::analysis_job_repo_impl::AnalysisJobRepositoryImpl;
use auditrs::infrastructure::repositories::analysis_repo_impl::AnalysisRepositoryImpl;
use auditrs::infrastructure::repositories::finding_repo_impl::FindingRepositoryImpl;
use auditrs::infrastructure::repositories::task_repo_impl::TaskRepositoryImpl;
use auditrs::infrastructure::storage::create_asset_store;
use auditrs::presentation::routes;
use auditrs::queue::task_queue::{DatabaseTaskQueue, TaskQueue};
use auditrs::rules::WorkerRegistry;
use auditrs::utils::telemetry;
use auditrs::workers::manager::{WorkerDependencies, WorkerManager};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

/// 根据配置选择页面加载器
fn build_loader(settings: &FetcherSettings) -> anyhow::Result<Arc<dyn PageLoader>> {
    match settings.engine.as_str() {
        "browser" => Ok(Arc::new(BrowserLoader::new(
            settings.remote_debugging_url.clone(),
        ))),
        "http" => Ok(Arc::new(
            HttpLoader::new()?
                .with_ssrf_protection(settings.ssrf_protection)
                .with_max_body_bytes(settings.max_body_bytes),
        )),
        other => anyhow::bail!("Unsupported fetcher engine: {}", other),
    }
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(err) => error!("Unable to listen for shutdown signal: {}", err),
    }
}

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration
    let settings = Settings::new()?;

    // 2. Initialize logging and metrics
    telemetry::init_telemetry(settings.telemetry.json_logs);
    info!("Starting auditrs...");
    if let Some(addr) = settings.telemetry.metrics_addr.as_deref() {
        metrics::init_metrics(addr);
    }

    // 3. Connect to database
    let db = Arc::new(connection::create_pool(&settings.database).await?);
    info!("Database connection established");

    // 4. Initialize components
    let store = create_asset_store(&settings.storage)?;
    let queue: Arc<dyn TaskQueue> = Arc::new(DatabaseTaskQueue::new(
        Arc::new(TaskRepositoryImpl::new(db.clone())),
        settings.pipeline.task_lock(),
    ));
    let orchestrator = Arc::new(
        Orchestrator::new(
            Arc::new(AnalysisRepositoryImpl::new(db.clone())),
            Arc::new(AnalysisJobRepositoryImpl::new(db.clone())),
            Arc::new(FindingRepositoryImpl::new(db.clone())),
            queue.clone(),
            OrchestratorConfig::from_settings(&settings.pipeline, settings.scoring),
        ),
    );

    let loader = build_loader(&settings.fetcher)?;
    info!("Page loader: {}", loader.name());
    let fetcher = Arc::new(
        Fetcher::new(
            loader,
            store.clone(),
            LoadOptions {
                timeout: settings.fetcher.navigation_timeout(),
                capture_screenshots: settings.fetcher.capture_screenshots,
                capture_mobile: settings.fetcher.capture_mobile,
            },
        )
        .with_ssrf_protection(settings.fetcher.ssrf_protection),
    );

    // 5. Start workers
    let workers = WorkerManager::start(
        WorkerDependencies {
            queue,
            orchestrator: orchestrator.clone(),
            fetcher,
            registry: Arc::new(WorkerRegistry::with_defaults()),
            store,
        },
        &settings.workers,
        settings.pipeline.sweep_interval(),
    );

    // 6. Start HTTP server
    let app = routes::routes(orchestrator);
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    workers.shutdown(Duration::from_secs(30)).await;
    info!("auditrs stopped");
    Ok(())
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use auditrs::application::fetcher::Fetcher;
use auditrs::application::orchestrator::{Orchestrator, OrchestratorConfig};
use auditrs::engines::traits::{FetchError, LoadOptions, PageCapture, PageLoader};
use auditrs::infrastructure::database::connection;
use auditrs::infrastructure::repositories::analysis_job_repo_impl::AnalysisJobRepositoryImpl;
use auditrs::infrastructure::repositories::analysis_repo_impl::AnalysisRepositoryImpl;
use auditrs::infrastructure::repositories::finding_repo_impl::FindingRepositoryImpl;
use auditrs::infrastructure::repositories::task_repo_impl::TaskRepositoryImpl;
use auditrs::infrastructure::storage::InMemoryAssetStore;
use auditrs::presentation::routes;
use auditrs::queue::task_queue::{DatabaseTaskQueue, TaskQueue};
use auditrs::rules::WorkerRegistry;
use auditrs::workers::fetch_worker::FetchWorker;
use auditrs::workers::rule_worker::RuleWorker;
use auditrs::workers::Worker;
use axum_test::TestServer;
use sea_orm::DatabaseConnection;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 通过全部内置规则的页面
pub const CLEAN_PAGE: &str = r#"<html lang="en"><head>
<title>Example Domain for Testing</title>
<meta name="description" content="An example page">
<meta name="viewport" content="width=device-width">
<link rel="canonical" href="https://example.com/">
</head><body><h1>Hello</h1><p>Welcome to the example.</p></body></html>"#;

/// 按 URL 返回预设响应的加载器
#[derive(Default)]
pub struct ScriptedLoader {
    pages: HashMap<String, (u16, String)>,
    loads: AtomicUsize,
}

impl ScriptedLoader {
    pub fn page(mut self, url: &str, status: u16, html: &str) -> Self {
        self.pages
            .insert(url.to_string(), (status, html.to_string()));
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageLoader for ScriptedLoader {
    async fn load(&self, url: &str, _options: &LoadOptions) -> Result<PageCapture, FetchError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let (status, html) = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Network(format!("connection refused: {}", url)))?;
        Ok(PageCapture {
            html,
            final_url: url.to_string(),
            status_code: status,
            content_type: "text/html; charset=utf-8".to_string(),
            headers: HashMap::new(),
            response_time_ms: 40,
            desktop_screenshot: Some(vec![0x89, 0x50, 0x4e, 0x47]),
            mobile_screenshot: None,
        })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub orchestrator: Arc<Orchestrator>,
    pub queue: Arc<dyn TaskQueue>,
    pub fetch_worker: FetchWorker,
    pub rule_worker: RuleWorker,
    pub loader: Arc<ScriptedLoader>,
    pub store: InMemoryAssetStore,
    pub db: Arc<DatabaseConnection>,
}

pub async fn create_test_app(loader: ScriptedLoader) -> TestApp {
    create_test_app_with(loader, WorkerRegistry::with_defaults(), OrchestratorConfig::default())
        .await
}

pub async fn create_test_app_with(
    loader: ScriptedLoader,
    registry: WorkerRegistry,
    config: OrchestratorConfig,
) -> TestApp {
    let db = Arc::new(connection::create_memory_pool().await.unwrap());
    let queue: Arc<dyn TaskQueue> = Arc::new(DatabaseTaskQueue::new(
        Arc::new(TaskRepositoryImpl::new(db.clone())),
        chrono::Duration::minutes(2),
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(AnalysisRepositoryImpl::new(db.clone())),
        Arc::new(AnalysisJobRepositoryImpl::new(db.clone())),
        Arc::new(FindingRepositoryImpl::new(db.clone())),
        queue.clone(),
        config,
    ));

    let loader = Arc::new(loader);
    let store = InMemoryAssetStore::new();
    let fetcher = Arc::new(
        Fetcher::new(loader.clone(), Arc::new(store.clone()), LoadOptions::default())
            .with_ssrf_protection(false),
    );

    let fetch_worker = FetchWorker::new(
        queue.clone(),
        orchestrator.clone(),
        fetcher,
        Duration::from_millis(10),
    );
    let rule_worker = RuleWorker::new(
        queue.clone(),
        orchestrator.clone(),
        Arc::new(registry),
        Arc::new(store.clone()),
        Duration::from_secs(5),
        Duration::from_millis(10),
    );

    let server = TestServer::new(routes::routes(orchestrator.clone())).unwrap();

    TestApp {
        server,
        orchestrator,
        queue,
        fetch_worker,
        rule_worker,
        loader,
        store,
        db,
    }
}

impl TestApp {
    /// 交替运行抓取和规则工作器，直到两个队列都为空
    pub async fn drain(&self) {
        loop {
            let fetched = self.fetch_worker.process_next().await.unwrap();
            let evaluated = self.rule_worker.process_next().await.unwrap();
            if !fetched && !evaluated {
                break;
            }
        }
    }
}

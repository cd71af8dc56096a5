// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::models::asset::{AssetKind, AssetRef, PageMetadata};
use crate::domain::repositories::asset_store::AssetStore;
use crate::engines::traits::{FetchError, LoadOptions, PageCapture, PageLoader};
use crate::engines::validators::validate_url;

/// 抓取器
///
/// 对目标页面做一次导航，把 DOM、截图和响应元数据写入资源存储。
/// 每次尝试使用独立的存储目录；只有在全部资源都写入成功后才返回资源引用，
/// 失败时只删除本次尝试已写入的资源。
pub struct Fetcher {
    loader: Arc<dyn PageLoader>,
    store: Arc<dyn AssetStore>,
    options: LoadOptions,
    ssrf_protection: bool,
}

impl Fetcher {
    pub fn new(loader: Arc<dyn PageLoader>, store: Arc<dyn AssetStore>, options: LoadOptions) -> Self {
        Self {
            loader,
            store,
            options,
            ssrf_protection: true,
        }
    }

    pub fn with_ssrf_protection(mut self, enabled: bool) -> Self {
        self.ssrf_protection = enabled;
        self
    }

    /// 抓取目标并持久化快照
    pub async fn fetch(
        &self,
        analysis_id: Uuid,
        target_url: &str,
    ) -> Result<Vec<AssetRef>, FetchError> {
        if self.ssrf_protection {
            validate_url(target_url)
                .await
                .map_err(|e| FetchError::InvalidTarget(e.to_string()))?;
        }

        let capture = self.loader.load(target_url, &self.options).await?;
        if !capture.is_success() {
            return Err(FetchError::NonSuccessStatus {
                status: capture.status_code,
                url: capture.final_url,
            });
        }

        let attempt_id = Uuid::new_v4();
        debug!(
            %analysis_id,
            %attempt_id,
            loader = self.loader.name(),
            status = capture.status_code,
            final_url = %capture.final_url,
            "Page loaded"
        );

        let mut written = Vec::new();
        match self
            .persist(analysis_id, attempt_id, target_url, capture, &mut written)
            .await
        {
            Ok(assets) => {
                info!(%analysis_id, %attempt_id, assets = assets.len(), "Snapshot persisted");
                Ok(assets)
            }
            Err(e) => {
                self.remove_assets(analysis_id, &written).await;
                Err(e)
            }
        }
    }

    async fn persist(
        &self,
        analysis_id: Uuid,
        attempt_id: Uuid,
        target_url: &str,
        capture: PageCapture,
        written: &mut Vec<String>,
    ) -> Result<Vec<AssetRef>, FetchError> {
        let metadata = PageMetadata {
            requested_url: target_url.to_string(),
            final_url: capture.final_url,
            status_code: capture.status_code,
            content_type: capture.content_type,
            response_time_ms: capture.response_time_ms,
            headers: capture.headers,
            fetched_at: Utc::now(),
        };
        let metadata_json =
            serde_json::to_vec(&metadata).map_err(|e| FetchError::AssetPersist(e.to_string()))?;

        let mut blobs = vec![
            (AssetKind::Html, capture.html.into_bytes()),
            (AssetKind::Metadata, metadata_json),
        ];
        if let Some(png) = capture.desktop_screenshot {
            blobs.push((AssetKind::DesktopScreenshot, png));
        }
        if let Some(png) = capture.mobile_screenshot {
            blobs.push((AssetKind::MobileScreenshot, png));
        }

        let mut assets = Vec::with_capacity(blobs.len());
        for (kind, data) in blobs {
            let key = AssetRef::storage_key(analysis_id, attempt_id, kind);
            self.store
                .put(&key, &data, kind.content_type())
                .await
                .map_err(|e| FetchError::AssetPersist(format!("{}: {}", key, e)))?;
            written.push(key.clone());
            assets.push(AssetRef {
                analysis_id,
                kind,
                locator: key,
                content_type: kind.content_type().to_string(),
                size_bytes: data.len() as u64,
            });
        }
        Ok(assets)
    }

    async fn remove_assets(&self, analysis_id: Uuid, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.store.delete(key).await {
                warn!(%analysis_id, "Failed to delete asset {}: {}", key, e);
            }
        }
    }
}

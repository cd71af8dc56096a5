// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{EventResponseReceived, ResourceType};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

use crate::engines::traits::{
    FetchError, LoadOptions, PageCapture, PageLoader, Viewport, DESKTOP_VIEWPORT, MOBILE_VIEWPORT,
};

/// 主文档响应等待上限
const RESPONSE_EVENT_GRACE: Duration = Duration::from_secs(2);

/// 主文档响应
struct DocumentResponse {
    status: u16,
    url: String,
    mime_type: String,
    headers: HashMap<String, String>,
}

/// 无头浏览器加载器
///
/// 基于 chromiumoxide。浏览器在首次加载时启动（或连接远程实例），
/// 之后由同一个加载器的所有导航复用，每次导航使用独立的标签页。
pub struct BrowserLoader {
    browser: OnceCell<Browser>,
    remote_debugging_url: Option<String>,
}

impl BrowserLoader {
    pub fn new(remote_debugging_url: Option<String>) -> Self {
        Self {
            browser: OnceCell::new(),
            remote_debugging_url,
        }
    }

    async fn browser(&self) -> Result<&Browser, FetchError> {
        self.browser
            .get_or_try_init(|| async {
                let (browser, mut handler) = match &self.remote_debugging_url {
                    Some(url) => {
                        tracing::info!("Connecting to remote Chrome instance at: {}", url);
                        Browser::connect(url).await.map_err(|e| {
                            FetchError::Browser(format!("Failed to connect to remote Chrome: {}", e))
                        })?
                    }
                    None => {
                        let config = BrowserConfig::builder()
                            .no_sandbox()
                            .window_size(DESKTOP_VIEWPORT.width, DESKTOP_VIEWPORT.height)
                            .request_timeout(Duration::from_secs(30))
                            .arg("--disable-gpu")
                            .arg("--disable-dev-shm-usage")
                            .build()
                            .map_err(FetchError::Browser)?;
                        Browser::launch(config)
                            .await
                            .map_err(|e| FetchError::Browser(e.to_string()))?
                    }
                };

                tokio::spawn(async move {
                    while let Some(event) = handler.next().await {
                        if event.is_err() {
                            break;
                        }
                    }
                });

                Ok(browser)
            })
            .await
    }

    async fn set_viewport(page: &Page, viewport: Viewport) -> Result<(), FetchError> {
        let params = SetDeviceMetricsOverrideParams::new(
            i64::from(viewport.width),
            i64::from(viewport.height),
            if viewport.mobile { 3.0 } else { 1.0 },
            viewport.mobile,
        );
        page.execute(params)
            .await
            .map_err(|e| FetchError::Browser(format!("Failed to set viewport: {}", e)))?;
        Ok(())
    }

    async fn screenshot(page: &Page, viewport: Viewport) -> Result<Vec<u8>, FetchError> {
        Self::set_viewport(page, viewport).await?;
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(false)
            .build();
        page.screenshot(params)
            .await
            .map_err(|e| FetchError::Browser(format!("Screenshot failed: {}", e)))
    }

    async fn capture(
        &self,
        page: &Page,
        url: &str,
        options: &LoadOptions,
    ) -> Result<PageCapture, FetchError> {
        let start = Instant::now();

        Self::set_viewport(page, DESKTOP_VIEWPORT).await?;

        // 监听器必须在导航之前注册
        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?;
        let document = tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                if event.r#type == ResourceType::Document {
                    let response = &event.response;
                    let headers = response
                        .headers
                        .inner()
                        .as_object()
                        .map(|map| {
                            map.iter()
                                .filter_map(|(k, v)| {
                                    v.as_str().map(|v| (k.to_ascii_lowercase(), v.to_string()))
                                })
                                .collect()
                        })
                        .unwrap_or_default();
                    return Some(DocumentResponse {
                        status: u16::try_from(response.status).unwrap_or(0),
                        url: response.url.clone(),
                        mime_type: response.mime_type.clone(),
                        headers,
                    });
                }
            }
            None
        });

        // goto 等待 load 事件
        page.goto(url)
            .await
            .map_err(|e| FetchError::Network(format!("Navigation failed: {}", e)))?;
        let response_time_ms = start.elapsed().as_millis() as u64;

        let html = page
            .content()
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?;

        let response = match tokio::time::timeout(RESPONSE_EVENT_GRACE, document).await {
            Ok(Ok(response)) => response,
            _ => None,
        };

        let final_url = match page.url().await {
            Ok(Some(current)) => current,
            _ => response
                .as_ref()
                .map(|r| r.url.clone())
                .unwrap_or_else(|| url.to_string()),
        };

        let (desktop_screenshot, mobile_screenshot) = if options.capture_screenshots {
            let desktop = Self::screenshot(page, DESKTOP_VIEWPORT).await?;
            let mobile = if options.capture_mobile {
                Some(Self::screenshot(page, MOBILE_VIEWPORT).await?)
            } else {
                None
            };
            (Some(desktop), mobile)
        } else {
            (None, None)
        };

        let (status_code, content_type, headers) = match response {
            Some(r) => (r.status, r.mime_type, r.headers),
            None => {
                tracing::warn!("No document response observed for {}, assuming success", url);
                (200, "text/html".to_string(), HashMap::new())
            }
        };

        Ok(PageCapture {
            html,
            final_url,
            status_code,
            content_type,
            headers,
            response_time_ms,
            desktop_screenshot,
            mobile_screenshot,
        })
    }
}

#[async_trait]
impl PageLoader for BrowserLoader {
    async fn load(&self, url: &str, options: &LoadOptions) -> Result<PageCapture, FetchError> {
        let browser = self.browser().await?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?;

        let result = tokio::time::timeout(options.timeout, self.capture(&page, url, options))
            .await
            .map_err(|_| FetchError::NavigationTimeout(options.timeout))
            .and_then(|r| r);

        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close page: {}", e);
        }

        result
    }

    fn name(&self) -> &'static str {
        "browser"
    }
}

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

use async_trait::async_trait;
use reqwest::header::LOCATION;
use std::collections::HashMap;
use std::time::Instant;
use url::Url;

use crate::engines::traits::{FetchError, LoadOptions, PageCapture, PageLoader};
use crate::engines::validators::validate_url;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; auditrs/0.1; +https://github.com/Kirky-X/auditrs)";

const MAX_REDIRECTS: usize = 10;

/// 默认响应体上限（10 MiB）
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// HTTP 加载器
///
/// 基于 reqwest 的纯 HTTP 加载，不执行脚本也不截图。
/// 重定向由加载器逐跳跟随，每一跳都重新做 SSRF 检查。
pub struct HttpLoader {
    client: reqwest::Client,
    ssrf_protection: bool,
    max_body_bytes: usize,
}

impl HttpLoader {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            ssrf_protection: true,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        })
    }

    pub fn with_ssrf_protection(mut self, enabled: bool) -> Self {
        self.ssrf_protection = enabled;
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// 发送请求并跟随重定向，返回最终响应
    async fn follow(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let mut current = Url::parse(url).map_err(|e| FetchError::InvalidTarget(e.to_string()))?;

        for _ in 0..=MAX_REDIRECTS {
            let response = self.client.get(current.clone()).send().await?;
            if !response.status().is_redirection() {
                return Ok(response);
            }

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let Some(location) = location else {
                return Ok(response);
            };

            let next = current.join(&location).map_err(|e| {
                FetchError::Network(format!("invalid redirect location '{}': {}", location, e))
            })?;
            if !matches!(next.scheme(), "http" | "https") {
                return Err(FetchError::InvalidTarget(format!(
                    "redirect to unsupported scheme: {}",
                    next
                )));
            }
            if self.ssrf_protection {
                validate_url(next.as_str()).await.map_err(|e| {
                    FetchError::InvalidTarget(format!("redirect to {} rejected: {}", next, e))
                })?;
            }
            current = next;
        }

        Err(FetchError::Network(format!(
            "too many redirects (more than {})",
            MAX_REDIRECTS
        )))
    }

    /// 读取响应体，超过上限立即中止
    async fn read_body(&self, mut response: reqwest::Response) -> Result<Vec<u8>, FetchError> {
        if let Some(length) = response.content_length() {
            if length > self.max_body_bytes as u64 {
                return Err(FetchError::ResponseTooLarge(self.max_body_bytes));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(FetchError::ResponseTooLarge(self.max_body_bytes));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    async fn navigate(&self, url: &str) -> Result<PageCapture, FetchError> {
        let start = Instant::now();
        let response = self.follow(url).await?;

        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_ascii_lowercase(), value.to_string());
            }
        }
        let content_type = headers
            .get("content-type")
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| "text/html".to_string());

        let body = self.read_body(response).await?;

        Ok(PageCapture {
            html: String::from_utf8_lossy(&body).into_owned(),
            final_url,
            status_code,
            content_type,
            headers,
            response_time_ms: start.elapsed().as_millis() as u64,
            desktop_screenshot: None,
            mobile_screenshot: None,
        })
    }
}

#[async_trait]
impl PageLoader for HttpLoader {
    async fn load(&self, url: &str, options: &LoadOptions) -> Result<PageCapture, FetchError> {
        match tokio::time::timeout(options.timeout, self.navigate(url)).await {
            Ok(Err(FetchError::NavigationTimeout(_))) | Err(_) => {
                Err(FetchError::NavigationTimeout(options.timeout))
            }
            Ok(result) => result,
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

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
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::domain::models::failure::{FailureCode, FailureReason};

/// 抓取错误类型
#[derive(Error, Debug)]
pub enum FetchError {
    /// 网络错误（DNS、连接、TLS 等）
    #[error("Network error: {0}")]
    Network(String),
    /// 导航超时
    #[error("Navigation timed out after {0:?}")]
    NavigationTimeout(Duration),
    /// 主文档返回非成功状态码
    #[error("Target responded with HTTP {status} ({url})")]
    NonSuccessStatus { status: u16, url: String },
    /// 目标地址不允许访问
    #[error("Target rejected: {0}")]
    InvalidTarget(String),
    /// 浏览器错误
    #[error("Browser error: {0}")]
    Browser(String),
    /// 响应体超过上限
    #[error("Response body exceeds {0} bytes")]
    ResponseTooLarge(usize),
    /// 资源持久化失败
    #[error("Failed to persist assets: {0}")]
    AssetPersist(String),
}

impl FetchError {
    /// 对应的失败代码
    pub fn failure_code(&self) -> FailureCode {
        match self {
            FetchError::Network(_)
            | FetchError::InvalidTarget(_)
            | FetchError::Browser(_)
            | FetchError::ResponseTooLarge(_) => FailureCode::NetworkError,
            FetchError::NavigationTimeout(_) => FailureCode::NavigationTimeout,
            FetchError::NonSuccessStatus { .. } => FailureCode::NonSuccessStatus,
            FetchError::AssetPersist(_) => FailureCode::AssetPersistFailed,
        }
    }

    /// 转换为可记录的失败原因
    pub fn to_reason(&self) -> FailureReason {
        FailureReason::new(self.failure_code(), self.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::NavigationTimeout(Duration::ZERO)
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// 页面加载选项
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// 导航超时
    pub timeout: Duration,
    /// 是否截图
    pub capture_screenshots: bool,
    /// 是否额外截取移动视口
    pub capture_mobile: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            capture_screenshots: true,
            capture_mobile: true,
        }
    }
}

/// 视口尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub mobile: bool,
}

pub const DESKTOP_VIEWPORT: Viewport = Viewport {
    width: 1366,
    height: 768,
    mobile: false,
};

pub const MOBILE_VIEWPORT: Viewport = Viewport {
    width: 390,
    height: 844,
    mobile: true,
};

/// 一次页面加载的捕获结果
#[derive(Debug, Clone)]
pub struct PageCapture {
    /// DOM 序列化
    pub html: String,
    /// 重定向后的最终 URL
    pub final_url: String,
    /// 主文档状态码
    pub status_code: u16,
    pub content_type: String,
    /// 主文档响应头（小写键）
    pub headers: HashMap<String, String>,
    /// 响应时间（毫秒）
    pub response_time_ms: u64,
    /// 桌面视口截图（PNG）
    pub desktop_screenshot: Option<Vec<u8>>,
    /// 移动视口截图（PNG）
    pub mobile_screenshot: Option<Vec<u8>>,
}

impl PageCapture {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// 页面加载器特质
///
/// 一次调用对应目标页面的一次导航
#[async_trait]
pub trait PageLoader: Send + Sync {
    /// 加载页面并捕获快照
    async fn load(&self, url: &str, options: &LoadOptions) -> Result<PageCapture, FetchError>;

    /// 加载器名称
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_codes() {
        assert_eq!(
            FetchError::NonSuccessStatus {
                status: 404,
                url: "https://example.com/".to_string()
            }
            .failure_code(),
            FailureCode::NonSuccessStatus
        );
        assert_eq!(
            FetchError::NavigationTimeout(Duration::from_secs(30)).failure_code(),
            FailureCode::NavigationTimeout
        );
        let reason = FetchError::AssetPersist("disk full".to_string()).to_reason();
        assert_eq!(reason.code, FailureCode::AssetPersistFailed);
        assert!(reason.message.contains("disk full"));
    }
}

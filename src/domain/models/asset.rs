// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// 资源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// 完整 DOM 序列化
    Html,
    /// 桌面视口截图
    DesktopScreenshot,
    /// 移动视口截图
    MobileScreenshot,
    /// 响应元数据（JSON）
    Metadata,
}

impl AssetKind {
    /// 资源在存储中的文件名
    pub fn file_name(&self) -> &'static str {
        match self {
            AssetKind::Html => "document.html",
            AssetKind::DesktopScreenshot => "desktop.png",
            AssetKind::MobileScreenshot => "mobile.png",
            AssetKind::Metadata => "metadata.json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            AssetKind::Html => "text/html; charset=utf-8",
            AssetKind::DesktopScreenshot | AssetKind::MobileScreenshot => "image/png",
            AssetKind::Metadata => "application/json",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AssetKind::Html => write!(f, "html"),
            AssetKind::DesktopScreenshot => write!(f, "desktop_screenshot"),
            AssetKind::MobileScreenshot => write!(f, "mobile_screenshot"),
            AssetKind::Metadata => write!(f, "metadata"),
        }
    }
}

/// 已持久化资源的引用
///
/// 工作器只通过资源引用读取快照，从不自行访问网络
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub analysis_id: Uuid,
    pub kind: AssetKind,
    /// 存储定位符（资源存储中的键）
    pub locator: String,
    pub content_type: String,
    pub size_bytes: u64,
}

impl AssetRef {
    /// 按 `(analysis_id, attempt_id, kind)` 计算存储键
    ///
    /// 每次抓取尝试写入自己的目录，重复投递的抓取不会覆盖或删除另一次尝试的快照
    pub fn storage_key(analysis_id: Uuid, attempt_id: Uuid, kind: AssetKind) -> String {
        format!("analyses/{}/{}/{}", analysis_id, attempt_id, kind.file_name())
    }
}

/// 在资源引用列表中查找某种资源
pub fn find_asset(assets: &[AssetRef], kind: AssetKind) -> Option<&AssetRef> {
    assets.iter().find(|a| a.kind == kind)
}

/// 页面响应元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    /// 请求的 URL
    pub requested_url: String,
    /// 重定向之后的最终 URL
    pub final_url: String,
    /// 主文档状态码
    pub status_code: u16,
    pub content_type: String,
    /// 主文档响应时间（毫秒）
    pub response_time_ms: u64,
    /// 主文档响应头（小写键）
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub fetched_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_is_scoped_by_analysis_and_attempt() {
        let id = Uuid::new_v4();
        let attempt = Uuid::new_v4();
        assert_eq!(
            AssetRef::storage_key(id, attempt, AssetKind::Html),
            format!("analyses/{}/{}/document.html", id, attempt)
        );
        assert_ne!(
            AssetRef::storage_key(id, attempt, AssetKind::Html),
            AssetRef::storage_key(id, Uuid::new_v4(), AssetKind::Html)
        );
    }
}

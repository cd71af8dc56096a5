// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::models::analysis::OwnerContext;

/// 分析请求数据传输对象
///
/// URL 在这里只做长度检查，规范化与解析由编排器完成
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct AnalysisRequestDto {
    /// 目标 URL，缺少协议时补 `https://`
    #[validate(length(min = 1, max = 2048))]
    pub url: String,
    pub owner_id: Option<Uuid>,
    pub workspace_id: Option<Uuid>,
}

impl AnalysisRequestDto {
    pub fn owner(&self) -> OwnerContext {
        OwnerContext {
            owner_id: self.owner_id,
            workspace_id: self.workspace_id,
        }
    }
}

/// 创建分析的响应
#[derive(Debug, Deserialize, Serialize)]
pub struct AnalysisCreatedDto {
    pub id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_url_is_rejected() {
        let dto = AnalysisRequestDto {
            url: String::new(),
            owner_id: None,
            workspace_id: None,
        };
        assert!(dto.validate().is_err());
        assert!(dto.owner().is_anonymous());
    }
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 规则评估模块
//!
//! 每个规则类别对应一个 [`RuleEvaluator`]，它是一个从页面快照到问题列表的纯函数。
//! 评估器之间互不感知，也不共享可变状态。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::models::asset::{AssetKind, PageMetadata};
use crate::domain::models::category::RuleCategory;
use crate::domain::models::finding::NewFinding;

pub mod accessibility;
pub mod catalog;
pub mod dom;
pub mod images;
pub mod keyboard;
pub mod media;
pub mod performance;
pub mod registry;
pub mod seo;

pub use catalog::{find_rule, rules_for, RuleDefinition};
pub use registry::WorkerRegistry;

/// 规则评估错误
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Invalid selector '{0}'")]
    InvalidSelector(String),

    #[error("Rule '{rule_key}' is not defined for category {category}")]
    UnknownRule {
        category: RuleCategory,
        rule_key: String,
    },

    #[error("Required asset missing: {0}")]
    MissingAsset(AssetKind),

    #[error("Evaluation failed: {0}")]
    Evaluation(String),
}

/// 供评估器读取的页面快照
///
/// 由抓取阶段持久化的资源还原而来，所有类别读取同一份快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// DOM 序列化
    pub html: String,
    /// 主文档响应元数据
    pub metadata: PageMetadata,
    /// 已捕获的截图类型
    #[serde(default)]
    pub screenshots: Vec<AssetKind>,
}

/// 规则评估器特质
///
/// 实现必须是同步且无副作用的：调用方在阻塞线程池中执行评估，
/// 并负责超时与崩溃的处理。空列表是合法的成功结果。
pub trait RuleEvaluator: Send + Sync {
    /// 评估器负责的类别
    fn category(&self) -> RuleCategory;

    /// 对页面快照执行全部规则
    fn evaluate(&self, page: &PageSnapshot) -> Result<Vec<NewFinding>, RuleError>;
}

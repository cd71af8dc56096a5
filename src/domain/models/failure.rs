// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 失败原因代码
///
/// 失败以数据形式记录在分析或作业上，而不是以异常形式跨组件传播。
/// 代码分为三组：
/// - 抓取阶段：整个分析失败
/// - 工作器阶段：仅影响单个作业
/// - 聚合阶段：所有作业都失败时分析的汇总原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCode {
    /// 网络错误（DNS、连接被拒绝等）
    NetworkError,
    /// 页面导航超时
    NavigationTimeout,
    /// 目标返回非成功状态码
    NonSuccessStatus,
    /// 资源持久化失败
    AssetPersistFailed,
    /// 抓取器在期限内未回报
    FetchTimeout,
    /// 任务投递失败
    DispatchFailed,
    /// 工作器内部崩溃
    WorkerCrash,
    /// 工作器自身的评估超时
    WorkerTimeout,
    /// 规则评估错误
    RuleEvaluationError,
    /// 超时清扫强制失败
    Timeout,
    /// 所有作业均失败
    AllJobsFailed,
}

impl FailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCode::NetworkError => "NetworkError",
            FailureCode::NavigationTimeout => "NavigationTimeout",
            FailureCode::NonSuccessStatus => "NonSuccessStatus",
            FailureCode::AssetPersistFailed => "AssetPersistFailed",
            FailureCode::FetchTimeout => "FetchTimeout",
            FailureCode::DispatchFailed => "DispatchFailed",
            FailureCode::WorkerCrash => "WorkerCrash",
            FailureCode::WorkerTimeout => "WorkerTimeout",
            FailureCode::RuleEvaluationError => "RuleEvaluationError",
            FailureCode::Timeout => "Timeout",
            FailureCode::AllJobsFailed => "AllJobsFailed",
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NetworkError" => Ok(FailureCode::NetworkError),
            "NavigationTimeout" => Ok(FailureCode::NavigationTimeout),
            "NonSuccessStatus" => Ok(FailureCode::NonSuccessStatus),
            "AssetPersistFailed" => Ok(FailureCode::AssetPersistFailed),
            "FetchTimeout" => Ok(FailureCode::FetchTimeout),
            "DispatchFailed" => Ok(FailureCode::DispatchFailed),
            "WorkerCrash" => Ok(FailureCode::WorkerCrash),
            "WorkerTimeout" => Ok(FailureCode::WorkerTimeout),
            "RuleEvaluationError" => Ok(FailureCode::RuleEvaluationError),
            "Timeout" => Ok(FailureCode::Timeout),
            "AllJobsFailed" => Ok(FailureCode::AllJobsFailed),
            _ => Err(()),
        }
    }
}

/// 失败原因
///
/// 代码供程序判断，消息供界面展示
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub code: FailureCode,
    pub message: String,
}

impl FailureReason {
    pub fn new(code: FailureCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

use crate::application::orchestrator::PipelineError;
use crate::domain::repositories::asset_store::StorageError;
use crate::queue::task_queue::QueueError;

/// Worker错误类型
///
/// 只描述工作器自身循环中的错误；规则评估失败以作业失败原因的形式回报，不经过这里
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("队列错误: {0}")]
    Queue(#[from] QueueError),

    #[error("流水线错误: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),

    #[error("任务负载无效: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("内部错误: {0}")]
    InternalError(String),
}

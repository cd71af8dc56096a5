// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::WorkerError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

/// Worker trait定义
///
/// 所有后台工作器都必须实现此trait
#[async_trait]
pub trait Worker: Send + Sync {
    /// 处理一个任务
    ///
    /// 队列为空时返回 `Ok(false)`
    async fn process_next(&self) -> Result<bool, WorkerError>;

    /// 获取工作器名称
    fn name(&self) -> &str;

    /// 队列为空时的轮询间隔
    fn poll_interval(&self) -> Duration;

    /// 运行工作器，直到收到关闭信号
    ///
    /// 正在处理的任务会先完成再退出
    async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Worker {} started", self.name());

        while !*shutdown.borrow() {
            let idle = match self.process_next().await {
                Ok(processed) => !processed,
                Err(e) => {
                    error!("Worker {} failed to process task: {}", self.name(), e);
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval()) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        info!("Worker {} stopped", self.name());
    }
}

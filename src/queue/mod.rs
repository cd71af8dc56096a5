// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 抓取与评估任务的投递通道，以及定期执行超时清扫的维护调度器
pub mod scheduler;
pub mod task_queue;

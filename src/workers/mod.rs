// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 抓取工作器、规则工作器执行框架和工作器生命周期管理
pub mod fetch_worker;
pub mod manager;
pub mod rule_worker;
pub mod worker;

pub use worker::Worker;

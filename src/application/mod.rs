// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 包含流水线的核心业务流程：编排器负责分析生命周期，抓取器负责页面快照。
/// 该模块只依赖领域层的抽象接口，具体实现在启动时注入。
pub mod dto;
pub mod fetcher;
pub mod orchestrator;

pub use fetcher::Fetcher;
pub use orchestrator::{Orchestrator, OrchestratorConfig, PipelineError, SweepReport};

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// 初始化指标系统
///
/// 在 `addr` 上启动 Prometheus 导出器并注册流水线指标。
/// 地址无法解析或端口被占用时只记录警告，不影响流水线运行。
pub fn init_metrics(addr: &str) {
    let addr: SocketAddr = match addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Invalid metrics address '{}': {}", addr, e);
            return;
        }
    };

    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!(
            "Failed to install Prometheus recorder: {}. This might happen if the port is already in use.",
            e
        );
        return;
    }

    describe_metrics();
    info!("Metrics exporter listening on {}", addr);
}

fn describe_metrics() {
    describe_counter!("analyses_started_total", "Total number of analyses accepted");
    describe_counter!(
        "analyses_finalized_total",
        "Total number of analyses that reached a terminal status"
    );
    describe_counter!(
        "analysis_jobs_total",
        "Total number of analysis jobs that reached a terminal status"
    );
    describe_histogram!(
        "analysis_overall_score",
        "Overall score of finalized analyses"
    );
    describe_histogram!(
        "fetch_duration_seconds",
        "Duration of page fetches including asset persistence"
    );
    describe_histogram!(
        "rule_evaluation_seconds",
        "Duration of one rule category evaluation"
    );
    describe_counter!(
        "sweep_reclaimed_jobs_total",
        "Total number of jobs force-failed by the timeout sweep"
    );
}

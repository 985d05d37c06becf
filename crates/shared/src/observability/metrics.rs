//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集。
//! 规则引擎以命令行方式运行，不启动 HTTP 端点，快照通过 handle 渲染。

use anyhow::Result;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

use super::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    handle: PrometheusHandle,
}

impl MetricsHandle {
    /// 以 Prometheus 文本格式渲染当前指标
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// 安装 Prometheus recorder
pub fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(&config.service_name);

    Ok(MetricsHandle { handle })
}

/// 注册规则引擎的指标描述
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("rule_evaluations_total", "Total number of rule evaluations");
    metrics::describe_histogram!(
        "rule_evaluation_duration_seconds",
        "Rule evaluation duration in seconds"
    );
    metrics::describe_counter!("rule_validations_total", "Total number of rule validations");
    metrics::describe_counter!(
        "rule_reference_lookups_total",
        "Total number of rule reference lookups through the repository"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录规则评估
///
/// outcome 取值：matched / not_matched / invalid / error
#[inline]
pub fn record_rule_evaluation(outcome: &str, duration_secs: f64) {
    metrics::counter!(
        "rule_evaluations_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);

    metrics::histogram!("rule_evaluation_duration_seconds").record(duration_secs);
}

/// 记录规则校验
#[inline]
pub fn record_rule_validation(valid: bool) {
    metrics::counter!(
        "rule_validations_total",
        "outcome" => if valid { "valid" } else { "invalid" }
    )
    .increment(1);
}

/// 记录规则引用查找
#[inline]
pub fn record_reference_lookup(outcome: &str) {
    metrics::counter!(
        "rule_reference_lookups_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_functions_do_not_panic() {
        // 即使没有初始化 recorder，这些函数也不应该 panic
        record_rule_evaluation("matched", 0.01);
        record_rule_evaluation("invalid", 0.0);
        record_rule_validation(true);
        record_rule_validation(false);
        record_reference_lookup("found");
    }
}

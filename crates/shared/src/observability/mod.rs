//! 统一可观测性模块
//!
//! 提供 logging 与 metrics 的统一初始化。
//! 所有二进制通过单一入口点配置可观测性，确保一致的日志格式和指标命名。

pub mod metrics;
pub mod tracing;

use ::tracing::info;
use anyhow::Result;

pub use crate::config::ObservabilityConfig;

/// 可观测性资源守卫
///
/// 持有日志与指标资源的生命周期，Drop 时输出关闭日志。
pub struct ObservabilityGuard {
    metrics_handle: Option<metrics::MetricsHandle>,
}

impl ObservabilityGuard {
    /// 创建一个空的 Guard（用于测试或禁用可观测性时）
    pub fn empty() -> Self {
        Self {
            metrics_handle: None,
        }
    }

    /// 渲染当前指标快照（未启用指标时返回 None）
    pub fn render_metrics(&self) -> Option<String> {
        self.metrics_handle.as_ref().map(|h| h.render())
    }
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        info!("Shutting down observability...");
    }
}

/// 统一初始化可观测性
///
/// 初始化顺序：
/// 1. Tracing（日志）
/// 2. Metrics（Prometheus recorder，可选）
pub fn init(config: &ObservabilityConfig) -> Result<ObservabilityGuard> {
    tracing::init(config)?;

    let metrics_handle = if config.metrics_enabled {
        Some(metrics::init(config)?)
    } else {
        None
    };

    info!(
        service = %config.service_name,
        metrics_enabled = config.metrics_enabled,
        json_logs = config.json_logs,
        "Observability initialized"
    );

    Ok(ObservabilityGuard { metrics_handle })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_guard_has_no_metrics() {
        let guard = ObservabilityGuard::empty();
        assert!(guard.render_metrics().is_none());
    }
}

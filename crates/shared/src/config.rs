//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// 规则引擎配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// 条件树嵌套与规则引用展开的最大深度
    pub max_depth: usize,
    /// 是否记录详细评估追踪
    pub trace_enabled: bool,
    /// 正则表达式缓存容量
    pub pattern_cache_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_depth: 64,
            trace_enabled: false,
            pattern_cache_capacity: 256,
        }
    }
}

/// 规则来源配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuleSourceSettings {
    /// 存放规则 JSON 文件的目录
    pub directory: String,
}

impl Default for RuleSourceSettings {
    fn default() -> Self {
        Self {
            directory: "rules".to_string(),
        }
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// 服务名称，用于标识日志和指标的来源
    pub service_name: String,
    pub log_level: String,
    /// 是否启用 JSON 格式日志
    pub json_logs: bool,
    /// 是否安装 Prometheus recorder
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown-service".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
        }
    }
}

impl ObservabilityConfig {
    /// 注入服务名
    pub fn with_service_name(mut self, service_name: &str) -> Self {
        self.service_name = service_name.to_string();
        self
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub engine: EngineSettings,
    pub rules: RuleSourceSettings,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（RULES__ 前缀，如 RULES__ENGINE__MAX_DEPTH -> engine.max_depth）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
        Self::load_from(service_name, Path::new(&config_dir))
    }

    /// 从指定目录加载配置
    pub fn load_from(service_name: &str, config_dir: &Path) -> Result<Self, ConfigError> {
        let env = std::env::var("RULES_ENV").unwrap_or_else(|_| "development".to_string());

        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env.clone())?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            // 双下划线分隔，避免与字段名中的下划线冲突
            .add_source(
                Environment::with_prefix("RULES")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 带服务名的可观测性配置
    pub fn observability_config(&self) -> ObservabilityConfig {
        self.observability.clone().with_service_name(&self.service_name)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

//! 规则引擎错误类型

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("规则未找到: {0}")]
    RuleNotFound(String),

    #[error("规则无效: rule_id={rule_id}, {message}")]
    InvalidRule {
        rule_id: String,
        message: String,
        element: Value,
    },

    /// 校验之后仍无法识别的节点，属于调用契约被破坏
    #[error("无法识别的规则节点: {message}")]
    MalformedNode { message: String, element: Value },

    #[error("规则引用成环: {}", chain.join(" -> "))]
    ReferenceCycle { chain: Vec<String> },

    #[error("条件树超过最大深度 {limit}")]
    DepthExceeded { limit: usize },

    #[error("读取规则文件失败: {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;

impl RuleError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::RuleNotFound(_) => "RULE_NOT_FOUND",
            Self::InvalidRule { .. } => "INVALID_RULE",
            Self::MalformedNode { .. } => "MALFORMED_NODE",
            Self::ReferenceCycle { .. } => "RULE_REFERENCE_CYCLE",
            Self::DepthExceeded { .. } => "DEPTH_EXCEEDED",
            Self::Io { .. } => "IO_ERROR",
            Self::JsonError(_) => "JSON_ERROR",
        }
    }

    /// 是否为规则查找类错误（引用解析失败，而非规则结构问题）
    pub fn is_lookup_error(&self) -> bool {
        matches!(
            self,
            Self::RuleNotFound(_) | Self::ReferenceCycle { .. } | Self::DepthExceeded { .. }
        )
    }
}

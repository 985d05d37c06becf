//! 规则操作符定义

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 约束操作符
///
/// 序列化名称即规则 JSON 中 `operator` 字段的取值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    // 通用比较
    #[serde(rename = "equals")]
    Equals,
    #[serde(rename = "does not equal")]
    DoesNotEqual,

    // 顺序比较
    #[serde(rename = "greater than")]
    GreaterThan,
    #[serde(rename = "less than")]
    LessThan,
    #[serde(rename = "greater than or equal", alias = "greater than or equal to")]
    GreaterThanOrEqual,
    #[serde(rename = "less than or equal", alias = "less than or equal to")]
    LessThanOrEqual,

    // 存在性检查
    #[serde(rename = "exists")]
    Exists,
    #[serde(rename = "does not exist")]
    DoesNotExist,

    // 集合成员
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not in")]
    NotIn,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "not contains")]
    NotContains,
    #[serde(rename = "contains any")]
    ContainsAny,
    #[serde(rename = "not contains any")]
    NotContainsAny,

    // 正则匹配
    #[serde(rename = "matches")]
    Matches,
    #[serde(rename = "does not match")]
    DoesNotMatch,
}

impl Operator {
    pub const ALL: [Operator; 16] = [
        Self::Equals,
        Self::DoesNotEqual,
        Self::GreaterThan,
        Self::LessThan,
        Self::GreaterThanOrEqual,
        Self::LessThanOrEqual,
        Self::Exists,
        Self::DoesNotExist,
        Self::In,
        Self::NotIn,
        Self::Contains,
        Self::NotContains,
        Self::ContainsAny,
        Self::NotContainsAny,
        Self::Matches,
        Self::DoesNotMatch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::DoesNotEqual => "does not equal",
            Self::GreaterThan => "greater than",
            Self::LessThan => "less than",
            Self::GreaterThanOrEqual => "greater than or equal",
            Self::LessThanOrEqual => "less than or equal",
            Self::Exists => "exists",
            Self::DoesNotExist => "does not exist",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Contains => "contains",
            Self::NotContains => "not contains",
            Self::ContainsAny => "contains any",
            Self::NotContainsAny => "not contains any",
            Self::Matches => "matches",
            Self::DoesNotMatch => "does not match",
        }
    }

    /// 约束值必须为数组的操作符
    pub fn requires_sequence(&self) -> bool {
        matches!(
            self,
            Self::In | Self::NotIn | Self::ContainsAny | Self::NotContainsAny
        )
    }

    /// 约束值必须为合法正则表达式的操作符
    pub fn requires_pattern(&self) -> bool {
        matches!(self, Self::Matches | Self::DoesNotMatch)
    }

    /// 字段缺失时仍需执行的操作符
    pub fn checks_presence(&self) -> bool {
        matches!(self, Self::Exists | Self::DoesNotExist)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greater than or equal to" => return Ok(Self::GreaterThanOrEqual),
            "less than or equal to" => return Ok(Self::LessThanOrEqual),
            _ => {}
        }

        Self::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown operator '{}'", s))
    }
}

/// 条件分支类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionKind {
    Any,
    All,
    /// 没有任何子节点成立
    #[serde(rename = "none")]
    NoneOf,
}

impl ConditionKind {
    pub const ALL: [ConditionKind; 3] = [Self::Any, Self::All, Self::NoneOf];

    /// 条件对象中对应的键名
    pub fn key(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::All => "all",
            Self::NoneOf => "none",
        }
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

//! 规则引擎领域模型

use crate::operators::{ConditionKind, Operator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// 规则定义
///
/// `conditions` 保留原始 JSON 条件树（单个条件或条件数组），
/// 校验器据此定位出错节点，评估时再转换为类型化的 [`Condition`] 树。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub conditions: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Rule {
    /// 以随机生成的 ID 构造规则
    pub fn new(label: impl Into<String>, conditions: Vec<Condition>) -> Self {
        Self::with_id(Self::generate_id(), label, conditions)
    }

    /// 生成规则 ID（UUID v4）
    pub fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn with_id(
        id: impl Into<String>,
        label: impl Into<String>,
        conditions: Vec<Condition>,
    ) -> Self {
        let conditions = match conditions.len() {
            1 => serde_json::to_value(&conditions[0]),
            _ => serde_json::to_value(&conditions),
        }
        .unwrap_or(Value::Null);

        Self {
            id: id.into(),
            label: label.into(),
            conditions,
            updated_at: None,
        }
    }

    /// 直接以 JSON 条件树构造（不做任何检查）
    pub fn from_conditions(id: impl Into<String>, conditions: Value) -> Self {
        Self {
            id: id.into(),
            label: String::new(),
            conditions,
            updated_at: None,
        }
    }

    /// 规则的顶层条件序列（单个条件视为只有一个元素的序列）
    pub fn condition_list(&self) -> Vec<&Value> {
        normalize_conditions(&self.conditions)
    }

    /// 将顶层条件转换为类型化节点
    pub fn parse_conditions(&self) -> serde_json::Result<Vec<Node>> {
        self.condition_list()
            .into_iter()
            .map(|v| serde_json::from_value(v.clone()))
            .collect()
    }
}

/// 把单个条件或条件数组统一成序列
pub(crate) fn normalize_conditions(conditions: &Value) -> Vec<&Value> {
    match conditions {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// 条件树中的节点
///
/// 字符串节点引用另一条已存储规则的条件树。
/// 带有 any/all/none 键的对象一律按条件解析，与校验器的分类顺序一致。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Reference(String),
    Condition(Condition),
    Constraint(Constraint),
}

impl From<Condition> for Node {
    fn from(value: Condition) -> Self {
        Node::Condition(value)
    }
}

impl From<Constraint> for Node {
    fn from(value: Constraint) -> Self {
        Node::Constraint(value)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::Reference(value.to_string())
    }
}

/// 条件节点（any / all / none 聚合）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ConditionWire", into = "ConditionWire")]
pub struct Condition {
    pub kind: ConditionKind,
    pub children: Vec<Node>,
    /// 只允许出现在规则最外层的条件上
    pub result: Option<Value>,
}

impl Condition {
    pub fn new(kind: ConditionKind, children: Vec<Node>) -> Self {
        Self {
            kind,
            children,
            result: None,
        }
    }

    pub fn any(children: Vec<Node>) -> Self {
        Self::new(ConditionKind::Any, children)
    }

    pub fn all(children: Vec<Node>) -> Self {
        Self::new(ConditionKind::All, children)
    }

    pub fn none(children: Vec<Node>) -> Self {
        Self::new(ConditionKind::NoneOf, children)
    }

    pub fn with_result(mut self, result: impl Into<Value>) -> Self {
        self.result = Some(result.into());
        self
    }
}

/// 条件节点的线上格式：恰好一个 any/all/none 键
#[derive(Clone, Serialize, Deserialize)]
struct ConditionWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    any: Option<Vec<Node>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    all: Option<Vec<Node>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    none: Option<Vec<Node>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
}

impl TryFrom<ConditionWire> for Condition {
    type Error = String;

    fn try_from(wire: ConditionWire) -> Result<Self, Self::Error> {
        let branches = [
            (ConditionKind::Any, wire.any),
            (ConditionKind::All, wire.all),
            (ConditionKind::NoneOf, wire.none),
        ];

        let mut selected = None;
        for (kind, children) in branches {
            if let Some(children) = children {
                if selected.is_some() {
                    return Err("cannot have more than one any/all/none".to_string());
                }
                selected = Some((kind, children));
            }
        }

        let (kind, children) = selected.ok_or_else(|| "invalid condition structure".to_string())?;

        Ok(Self {
            kind,
            children,
            result: wire.result,
        })
    }
}

impl From<Condition> for ConditionWire {
    fn from(condition: Condition) -> Self {
        let mut wire = ConditionWire {
            any: None,
            all: None,
            none: None,
            result: condition.result,
        };
        match condition.kind {
            ConditionKind::Any => wire.any = Some(condition.children),
            ConditionKind::All => wire.all = Some(condition.children),
            ConditionKind::NoneOf => wire.none = Some(condition.children),
        }
        wire
    }
}

/// 约束节点（叶子）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// 支持点号分隔的路径，如 "user.profile.age"
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl Constraint {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// 校验错误
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub message: String,
    /// 出错的节点，保留用于诊断
    pub element: Value,
}

/// 校验结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ValidationError>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            error: None,
        }
    }

    pub fn invalid(message: impl Into<String>, element: &Value) -> Self {
        Self {
            is_valid: false,
            error: Some(ValidationError {
                message: message.into(),
                element: element.clone(),
            }),
        }
    }

    /// 合并另一个结果：有效性取逻辑与，保留最先出现的错误
    pub fn merge(&mut self, other: ValidationResult) {
        self.is_valid = self.is_valid && other.is_valid;
        if self.error.is_none() {
            self.error = other.error;
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }
}

/// 评估结果
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub rule_id: String,
    pub rule_label: String,
    /// 规则最终给出的布尔结论
    pub verdict: bool,
    /// 第一个成立的顶层条件下标
    pub matched_condition: Option<usize>,
    /// 成立条件携带的 result 字段
    pub result: Option<Value>,
    pub matched_constraints: Vec<String>,
    pub evaluation_trace: Vec<String>,
    pub evaluation_time_us: u64,
}

impl EvaluationResult {
    pub fn new(rule_id: String, rule_label: String) -> Self {
        Self {
            rule_id,
            rule_label,
            verdict: false,
            matched_condition: None,
            result: None,
            matched_constraints: Vec::new(),
            evaluation_trace: Vec::new(),
            evaluation_time_us: 0,
        }
    }
}

/// 单条或批量评估的结论
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Verdict {
    Single(bool),
    Batch(Vec<bool>),
}

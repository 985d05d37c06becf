//! 规则校验器
//!
//! 递归遍历原始 JSON 条件树，返回第一个结构或语义缺陷。
//! 结构问题以 [`ValidationResult`] 返回；引用解析失败（规则不存在、成环、超深）以错误向上传播。

use crate::classifier::{branch_count, condition_type, is_condition, is_constraint, is_object};
use crate::error::Result;
use crate::evaluator::stringify;
use crate::guard::{DEFAULT_MAX_DEPTH, ExpansionGuard};
use crate::models::{Rule, ValidationResult, normalize_conditions};
use crate::operators::Operator;
use crate::repository::RuleRepository;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// 规则校验器
pub struct Validator<'a> {
    repository: &'a dyn RuleRepository,
    max_depth: usize,
}

impl<'a> Validator<'a> {
    pub fn new(repository: &'a dyn RuleRepository) -> Self {
        Self {
            repository,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// 校验原始 JSON 规则
    pub fn validate_json(&self, rule: &Value) -> Result<ValidationResult> {
        if !is_object(rule) {
            return Ok(ValidationResult::invalid("rule must be a valid object", rule));
        }

        let origin = rule
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty());
        let conditions = rule.get("conditions").unwrap_or(&Value::Null);

        self.validate_conditions(conditions, origin)
    }

    /// 校验规则
    pub fn validate(&self, rule: &Rule) -> Result<ValidationResult> {
        let origin = Some(rule.id.as_str()).filter(|id| !id.is_empty());
        self.validate_conditions(&rule.conditions, origin)
    }

    /// 校验顶层条件序列
    ///
    /// 每个顶层条件都会被访问，结果取逻辑与并保留最先出现的错误。
    fn validate_conditions(
        &self,
        conditions: &Value,
        origin: Option<&str>,
    ) -> Result<ValidationResult> {
        let roots = normalize_conditions(conditions);

        let first_is_empty = roots
            .first()
            .and_then(|v| v.as_object())
            .is_some_and(|map| map.is_empty());
        if roots.is_empty() || first_is_empty {
            return Ok(ValidationResult::invalid(
                "conditions must contain at least one condition",
                conditions,
            ));
        }

        let mut result = ValidationResult::valid();
        for root in roots {
            let mut guard = ExpansionGuard::new(self.max_depth, origin);
            result.merge(self.validate_condition(root, 0, &mut guard)?);
        }

        debug!(
            is_valid = result.is_valid,
            error = ?result.message(),
            "Rule validated"
        );
        Ok(result)
    }

    /// 递归校验条件节点
    fn validate_condition(
        &self,
        node: &Value,
        depth: usize,
        guard: &mut ExpansionGuard,
    ) -> Result<ValidationResult> {
        guard.check_depth(depth)?;

        if let Value::String(rule_id) = node {
            return self.with_reference(rule_id, guard, |this, target, guard| {
                this.validate_condition(target, depth, guard)
            });
        }

        let Some(kind) = condition_type(node) else {
            return Ok(ValidationResult::invalid("invalid condition structure", node));
        };

        if branch_count(node) > 1 {
            return Ok(ValidationResult::invalid(
                "cannot have more than one any/all/none",
                node,
            ));
        }

        let Some(children) = node[kind.key()].as_array() else {
            return Ok(ValidationResult::invalid(
                "condition branch must be iterable",
                node,
            ));
        };

        if depth > 0 && node.get("result").is_some() {
            return Ok(ValidationResult::invalid(
                "nested conditions cannot have a result property",
                node,
            ));
        }

        if children.is_empty() {
            return Ok(ValidationResult::invalid(
                "condition branch must contain at least one node",
                node,
            ));
        }

        // 遇到第一个失败的子节点即停止
        for child in children {
            let outcome = match child {
                Value::String(rule_id) => {
                    self.with_reference(rule_id, guard, |this, target, guard| {
                        this.validate_child(target, depth, guard)
                    })?
                }
                _ => self.validate_child(child, depth, guard)?,
            };

            if !outcome.is_valid {
                return Ok(outcome);
            }
        }

        Ok(ValidationResult::valid())
    }

    /// 校验子节点：条件递归，约束单独校验，其他一律拒绝
    fn validate_child(
        &self,
        node: &Value,
        depth: usize,
        guard: &mut ExpansionGuard,
    ) -> Result<ValidationResult> {
        if is_condition(node) {
            self.validate_condition(node, depth + 1, guard)
        } else if is_constraint(node) {
            Ok(validate_constraint(node))
        } else {
            Ok(ValidationResult::invalid(
                "each node must be a condition or constraint",
                node,
            ))
        }
    }

    /// 展开规则引用后对其条件树执行 `f`
    fn with_reference<T>(
        &self,
        rule_id: &str,
        guard: &mut ExpansionGuard,
        f: impl FnOnce(&Self, &Value, &mut ExpansionGuard) -> Result<T>,
    ) -> Result<T> {
        guard.enter(rule_id)?;
        let rule = self.repository.get_rule_by_id(rule_id)?;
        let outcome = f(self, &rule.conditions, guard);
        guard.leave();
        outcome
    }
}

/// 校验约束节点
pub fn validate_constraint(node: &Value) -> ValidationResult {
    if !node["field"].is_string() {
        return ValidationResult::invalid("constraint field must be a string", node);
    }

    let operator = match node["operator"].as_str().map(str::parse::<Operator>) {
        Some(Ok(operator)) => operator,
        Some(Err(e)) => return ValidationResult::invalid(e, node),
        None => return ValidationResult::invalid("constraint operator must be a string", node),
    };

    let value = &node["value"];

    if operator.requires_sequence() && !value.is_array() {
        return ValidationResult::invalid(
            format!("operator '{}' requires a sequence value", operator),
            node,
        );
    }

    if operator.requires_pattern() {
        if let Err(e) = Regex::new(&stringify(value)) {
            return ValidationResult::invalid(
                format!("operator '{}' requires a valid pattern: {}", operator, e),
                node,
            );
        }
    }

    ValidationResult::valid()
}

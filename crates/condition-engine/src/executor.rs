//! 规则执行器
//!
//! 在评估数据上遍历类型化条件树：顶层条件依次尝试，第一个成立的条件决定结论；
//! 条件内部按 any / all / none 折叠子节点，遇到确定结果即短路返回。

use crate::error::{Result, RuleError};
use crate::evaluator::ConstraintEvaluator;
use crate::guard::{DEFAULT_MAX_DEPTH, ExpansionGuard};
use crate::models::{Condition, Constraint, EvaluationResult, Node, Rule};
use crate::operators::ConditionKind;
use crate::repository::RuleRepository;
use serde_json::Value;
use std::time::Instant;

/// 规则执行器
pub struct RuleExecutor<'a> {
    repository: &'a dyn RuleRepository,
    constraints: &'a ConstraintEvaluator,
    max_depth: usize,
    /// 是否记录详细评估追踪
    trace_enabled: bool,
}

impl<'a> RuleExecutor<'a> {
    pub fn new(repository: &'a dyn RuleRepository, constraints: &'a ConstraintEvaluator) -> Self {
        Self {
            repository,
            constraints,
            max_depth: DEFAULT_MAX_DEPTH,
            trace_enabled: false,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    /// 执行规则评估
    ///
    /// 调用方需保证规则已通过校验，无法识别的节点以 [`RuleError::MalformedNode`] 返回。
    pub fn execute(&self, rule: &Rule, criteria: &Value) -> Result<EvaluationResult> {
        let start = Instant::now();
        let mut result = EvaluationResult::new(rule.id.clone(), rule.label.clone());

        let roots = rule.parse_conditions().map_err(|e| RuleError::MalformedNode {
            message: e.to_string(),
            element: rule.conditions.clone(),
        })?;
        let origin = Some(rule.id.as_str()).filter(|id| !id.is_empty());

        for (index, root) in roots.iter().enumerate() {
            let mut guard = ExpansionGuard::new(self.max_depth, origin);
            let path = if self.trace_enabled {
                format!("conditions[{}]", index)
            } else {
                String::new()
            };

            let (matched, outcome) = match root {
                Node::Condition(condition) => (
                    self.evaluate_condition(condition, criteria, 0, &mut guard, &mut result, &path)?,
                    condition.result.clone(),
                ),
                Node::Reference(rule_id) => {
                    // 顶层引用替换为被引用规则的根条件
                    let target = self.resolve_reference(rule_id, &mut guard)?;
                    let matched =
                        self.evaluate_condition(&target, criteria, 0, &mut guard, &mut result, &path)?;
                    guard.leave();
                    (matched, target.result)
                }
                Node::Constraint(constraint) => {
                    return Err(RuleError::MalformedNode {
                        message: "top-level node must be a condition".to_string(),
                        element: serde_json::to_value(constraint)?,
                    });
                }
            };

            if matched {
                result.matched_condition = Some(index);
                result.verdict = match &outcome {
                    Some(Value::Bool(b)) => *b,
                    _ => true,
                };
                result.result = outcome;
                let verdict = result.verdict;
                self.trace(&mut result, || format!("{}: matched, verdict {}", path, verdict));
                break;
            }
        }

        result.evaluation_time_us = start.elapsed().as_micros() as u64;
        Ok(result)
    }

    /// 递归评估节点
    fn evaluate_node(
        &self,
        node: &Node,
        criteria: &Value,
        depth: usize,
        guard: &mut ExpansionGuard,
        result: &mut EvaluationResult,
        path: &str,
    ) -> Result<bool> {
        match node {
            Node::Condition(condition) => {
                self.evaluate_condition(condition, criteria, depth + 1, guard, result, path)
            }
            Node::Constraint(constraint) => Ok(self.evaluate_constraint(constraint, criteria, result, path)),
            Node::Reference(rule_id) => {
                let target = self.resolve_reference(rule_id, guard)?;
                let matched =
                    self.evaluate_condition(&target, criteria, depth + 1, guard, result, path);
                guard.leave();
                matched
            }
        }
    }

    /// 评估条件节点（短路求值）
    fn evaluate_condition(
        &self,
        condition: &Condition,
        criteria: &Value,
        depth: usize,
        guard: &mut ExpansionGuard,
        result: &mut EvaluationResult,
        path: &str,
    ) -> Result<bool> {
        guard.check_depth(depth)?;

        self.trace(result, || {
            format!(
                "{}: evaluating {} ({} children)",
                path,
                condition.kind,
                condition.children.len()
            )
        });

        let children = condition.children.iter().enumerate();

        let matched = match condition.kind {
            ConditionKind::Any => {
                let mut matched = false;
                for (i, child) in children {
                    let child_path = self.child_path(path, "any", i);
                    if self.evaluate_node(child, criteria, depth, guard, result, &child_path)? {
                        matched = true;
                        break;
                    }
                }
                matched
            }
            ConditionKind::All => {
                let mut matched = true;
                for (i, child) in children {
                    let child_path = self.child_path(path, "all", i);
                    if !self.evaluate_node(child, criteria, depth, guard, result, &child_path)? {
                        matched = false;
                        break;
                    }
                }
                matched
            }
            ConditionKind::NoneOf => {
                let mut matched = true;
                for (i, child) in children {
                    let child_path = self.child_path(path, "none", i);
                    if self.evaluate_node(child, criteria, depth, guard, result, &child_path)? {
                        matched = false;
                        break;
                    }
                }
                matched
            }
        };

        self.trace(result, || {
            format!(
                "{}: {} => {}",
                path,
                condition.kind,
                if matched { "MATCHED" } else { "NOT_MATCHED" }
            )
        });

        Ok(matched)
    }

    /// 评估约束节点
    fn evaluate_constraint(
        &self,
        constraint: &Constraint,
        criteria: &Value,
        result: &mut EvaluationResult,
        path: &str,
    ) -> bool {
        let matched = self.constraints.check(constraint, criteria);

        self.trace(result, || {
            format!(
                "{}: {} {} {} => {}",
                path,
                constraint.field,
                constraint.operator,
                constraint.value,
                if matched { "MATCHED" } else { "NOT_MATCHED" }
            )
        });

        if matched {
            let description = format!(
                "{} {} {}",
                constraint.field, constraint.operator, constraint.value
            );
            // 未开启追踪时不构建路径，只记录约束本身
            result.matched_constraints.push(if path.is_empty() {
                description
            } else {
                format!("{}: {}", path, description)
            });
        }

        matched
    }

    /// 解析规则引用为被引用规则的根条件
    ///
    /// 成功后引用已压入 guard，调用方评估完毕需调用 `guard.leave()`。
    fn resolve_reference(&self, rule_id: &str, guard: &mut ExpansionGuard) -> Result<Condition> {
        guard.enter(rule_id)?;
        let rule = self.repository.get_rule_by_id(rule_id)?;

        serde_json::from_value(rule.conditions.clone()).map_err(|e| RuleError::MalformedNode {
            message: format!("rule '{}' does not hold a single condition: {}", rule_id, e),
            element: rule.conditions,
        })
    }

    /// 子节点路径只在追踪开启时构建
    fn child_path(&self, path: &str, branch: &str, index: usize) -> String {
        if self.trace_enabled {
            format!("{}.{}[{}]", path, branch, index)
        } else {
            String::new()
        }
    }

    fn trace(&self, result: &mut EvaluationResult, message: impl FnOnce() -> String) {
        if self.trace_enabled {
            result.evaluation_trace.push(message());
        }
    }
}

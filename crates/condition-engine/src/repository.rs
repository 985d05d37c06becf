//! 规则仓储
//!
//! 引擎通过 [`RuleRepository`] 按 ID 获取规则，用于解析条件树中的字符串引用。
//! [`InMemoryRuleRepository`] 使用 DashMap 提供线程安全的内存实现，支持规则的加载、更新、删除和批量操作。

use crate::error::{Result, RuleError};
use crate::models::{Node, Rule, normalize_conditions};
use chrono::Utc;
use condition_shared::observability::metrics::record_reference_lookup;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// 规则仓储接口
#[cfg_attr(test, mockall::automock)]
pub trait RuleRepository: Send + Sync {
    /// 按 ID 获取规则，ID 不存在时返回 [`RuleError::RuleNotFound`]
    fn get_rule_by_id(&self, id: &str) -> Result<Rule>;
}

/// 内存规则仓储
#[derive(Clone, Default)]
pub struct InMemoryRuleRepository {
    rules: Arc<DashMap<String, Rule>>,
}

impl InMemoryRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取当前存储的规则数量
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 加载规则，同 ID 规则会被覆盖
    #[instrument(skip(self, rule), fields(rule_id = %rule.id, rule_label = %rule.label))]
    pub fn load(&self, mut rule: Rule) -> Result<()> {
        if rule.id.is_empty() {
            return Err(RuleError::InvalidRule {
                rule_id: String::new(),
                message: "stored rules must have an id".to_string(),
                element: rule.conditions,
            });
        }

        rule.updated_at = Some(Utc::now());
        let rule_id = rule.id.clone();
        self.rules.insert(rule_id.clone(), rule);

        info!("Rule loaded: {}", rule_id);
        Ok(())
    }

    /// 从 JSON 字符串加载规则
    #[instrument(skip(self, json))]
    pub fn load_from_json(&self, json: &str) -> Result<String> {
        let rule: Rule = serde_json::from_str(json)?;
        let rule_id = rule.id.clone();
        self.load(rule)?;
        Ok(rule_id)
    }

    /// 更新规则
    #[instrument(skip(self, rule), fields(rule_id = %rule.id))]
    pub fn update(&self, rule: Rule) -> Result<()> {
        if !self.rules.contains_key(&rule.id) {
            warn!("Updating unknown rule: {}", rule.id);
            return Err(RuleError::RuleNotFound(rule.id));
        }

        self.load(rule)
    }

    /// 删除规则
    #[instrument(skip(self))]
    pub fn delete(&self, rule_id: &str) -> Result<()> {
        if self.rules.remove(rule_id).is_some() {
            info!("Rule deleted: {}", rule_id);
            Ok(())
        } else {
            warn!("Deleting unknown rule: {}", rule_id);
            Err(RuleError::RuleNotFound(rule_id.to_string()))
        }
    }

    pub fn get(&self, rule_id: &str) -> Option<Rule> {
        self.rules.get(rule_id).map(|r| r.clone())
    }

    pub fn contains(&self, rule_id: &str) -> bool {
        self.rules.contains_key(rule_id)
    }

    /// 获取所有规则 ID（按字典序）
    pub fn list_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.rules.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    /// 批量加载规则，失败的规则记录日志后跳过
    #[instrument(skip(self, rules))]
    pub fn load_batch(&self, rules: Vec<Rule>) -> Vec<String> {
        let mut loaded_ids = Vec::with_capacity(rules.len());
        let mut errors = Vec::new();

        for rule in rules {
            let rule_id = rule.id.clone();
            match self.load(rule) {
                Ok(()) => loaded_ids.push(rule_id),
                Err(e) => errors.push((rule_id, e)),
            }
        }

        if !errors.is_empty() {
            warn!("Batch load partially failed: {:?}", errors);
        }

        info!(
            "Batch load finished: {} loaded, {} failed",
            loaded_ids.len(),
            errors.len()
        );
        loaded_ids
    }

    /// 清空所有规则
    #[instrument(skip(self))]
    pub fn clear(&self) {
        let count = self.rules.len();
        self.rules.clear();
        info!("Cleared {} rules", count);
    }

    /// 获取仓储统计信息
    pub fn stats(&self) -> RepositoryStats {
        let rules_count = self.rules.len();
        let reference_count = self
            .rules
            .iter()
            .map(|r| count_references(&r.conditions))
            .sum();

        RepositoryStats {
            rules_count,
            reference_count,
        }
    }
}

impl RuleRepository for InMemoryRuleRepository {
    fn get_rule_by_id(&self, id: &str) -> Result<Rule> {
        match self.get(id) {
            Some(rule) => {
                debug!(rule_id = %id, "Rule reference resolved");
                record_reference_lookup("found");
                Ok(rule)
            }
            None => {
                record_reference_lookup("not_found");
                Err(RuleError::RuleNotFound(id.to_string()))
            }
        }
    }
}

/// 统计条件树中的字符串引用数量（不展开引用）
fn count_references(conditions: &Value) -> usize {
    normalize_conditions(conditions)
        .into_iter()
        .map(|v| match serde_json::from_value::<Node>(v.clone()) {
            Ok(node) => count_node_references(&node),
            Err(_) => 0,
        })
        .sum()
}

fn count_node_references(node: &Node) -> usize {
    match node {
        Node::Reference(_) => 1,
        Node::Constraint(_) => 0,
        Node::Condition(condition) => condition.children.iter().map(count_node_references).sum(),
    }
}

/// 仓储统计信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryStats {
    /// 规则总数
    pub rules_count: usize,
    /// 所有规则中的规则引用总数
    pub reference_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Condition, Constraint};
    use crate::operators::Operator;

    fn sample_rule(id: &str, label: &str) -> Rule {
        Rule::with_id(
            id,
            label,
            vec![Condition::all(vec![
                Constraint::new("event.type", Operator::Equals, "PURCHASE").into(),
                Constraint::new("order.amount", Operator::GreaterThanOrEqual, 500).into(),
            ])],
        )
    }

    fn sample_rule_json(id: &str, label: &str) -> String {
        format!(
            r#"
            {{
                "id": "{}",
                "label": "{}",
                "conditions": {{
                    "all": [
                        {{"field": "event.type", "operator": "equals", "value": "PURCHASE"}},
                        "vip-customer"
                    ]
                }}
            }}
            "#,
            id, label
        )
    }

    #[test]
    fn test_load_rule() {
        let repo = InMemoryRuleRepository::new();
        repo.load(sample_rule("rule-001", "test")).unwrap();

        assert_eq!(repo.len(), 1);
        assert!(repo.contains("rule-001"));
        assert!(repo.get("rule-001").unwrap().updated_at.is_some());
    }

    #[test]
    fn test_load_rule_without_id() {
        let repo = InMemoryRuleRepository::new();
        let result = repo.load(sample_rule("", "anonymous"));
        assert!(matches!(result, Err(RuleError::InvalidRule { .. })));
        assert!(repo.is_empty());
    }

    #[test]
    fn test_load_from_json() {
        let repo = InMemoryRuleRepository::new();
        let rule_id = repo.load_from_json(&sample_rule_json("rule-001", "test")).unwrap();

        assert_eq!(rule_id, "rule-001");
        assert_eq!(repo.get("rule-001").unwrap().label, "test");
    }

    #[test]
    fn test_get_rule_by_id() {
        let repo = InMemoryRuleRepository::new();
        repo.load(sample_rule("rule-001", "test")).unwrap();

        assert_eq!(repo.get_rule_by_id("rule-001").unwrap().label, "test");
        assert!(matches!(
            repo.get_rule_by_id("nonexistent"),
            Err(RuleError::RuleNotFound(id)) if id == "nonexistent"
        ));
    }

    #[test]
    fn test_update_rule() {
        let repo = InMemoryRuleRepository::new();
        repo.load(sample_rule("rule-001", "test")).unwrap();

        repo.update(sample_rule("rule-001", "updated")).unwrap();
        assert_eq!(repo.get("rule-001").unwrap().label, "updated");

        assert!(repo.update(sample_rule("rule-002", "missing")).is_err());
    }

    #[test]
    fn test_delete_rule() {
        let repo = InMemoryRuleRepository::new();
        repo.load(sample_rule("rule-001", "test")).unwrap();

        repo.delete("rule-001").unwrap();
        assert!(!repo.contains("rule-001"));
        assert!(repo.delete("rule-001").is_err());
    }

    #[test]
    fn test_list_ids_sorted() {
        let repo = InMemoryRuleRepository::new();
        repo.load(sample_rule("rule-b", "b")).unwrap();
        repo.load(sample_rule("rule-a", "a")).unwrap();

        assert_eq!(repo.list_ids(), vec!["rule-a".to_string(), "rule-b".to_string()]);
    }

    #[test]
    fn test_load_batch_skips_failures() {
        let repo = InMemoryRuleRepository::new();
        let loaded = repo.load_batch(vec![
            sample_rule("rule-001", "a"),
            sample_rule("", "no id"),
            sample_rule("rule-003", "c"),
        ]);

        assert_eq!(loaded, vec!["rule-001".to_string(), "rule-003".to_string()]);
        assert_eq!(repo.len(), 2);
    }

    #[test]
    fn test_clear() {
        let repo = InMemoryRuleRepository::new();
        repo.load(sample_rule("rule-001", "a")).unwrap();
        repo.clear();
        assert!(repo.is_empty());
    }

    #[test]
    fn test_stats_counts_references() {
        let repo = InMemoryRuleRepository::new();
        repo.load(sample_rule("rule-001", "a")).unwrap();
        repo.load_from_json(&sample_rule_json("rule-002", "b")).unwrap();

        let stats = repo.stats();
        assert_eq!(stats.rules_count, 2);
        assert_eq!(stats.reference_count, 1);
    }

    #[test]
    fn test_concurrent_access() {
        use std::thread;

        let repo = InMemoryRuleRepository::new();
        let repo_clone = repo.clone();

        let handle = thread::spawn(move || {
            for i in 0..100 {
                repo_clone
                    .load(sample_rule(&format!("rule-{}", i), "t"))
                    .unwrap();
            }
        });

        for i in 100..200 {
            repo.load(sample_rule(&format!("rule-{}", i), "t")).unwrap();
        }

        handle.join().unwrap();
        assert_eq!(repo.len(), 200);
    }
}

//! 规则引用展开保护
//!
//! 校验与评估递归时记录正在展开的规则 ID 链和嵌套深度，
//! 引用成环或超过深度上限时返回错误，而不是无限递归。

use crate::error::{Result, RuleError};

/// 默认最大深度
pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Clone)]
pub(crate) struct ExpansionGuard {
    chain: Vec<String>,
    max_depth: usize,
}

impl ExpansionGuard {
    /// `origin` 为被校验/评估规则自身的 ID（内联规则可能没有）
    pub(crate) fn new(max_depth: usize, origin: Option<&str>) -> Self {
        Self {
            chain: origin.map(|id| vec![id.to_string()]).unwrap_or_default(),
            max_depth,
        }
    }

    pub(crate) fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(RuleError::DepthExceeded {
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    /// 进入一条规则引用
    pub(crate) fn enter(&mut self, rule_id: &str) -> Result<()> {
        if self.chain.iter().any(|id| id == rule_id) {
            let mut chain = self.chain.clone();
            chain.push(rule_id.to_string());
            return Err(RuleError::ReferenceCycle { chain });
        }

        if self.chain.len() >= self.max_depth {
            return Err(RuleError::DepthExceeded {
                limit: self.max_depth,
            });
        }

        self.chain.push(rule_id.to_string());
        Ok(())
    }

    /// 离开最近进入的规则引用
    pub(crate) fn leave(&mut self) {
        self.chain.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_detected() {
        let mut guard = ExpansionGuard::new(DEFAULT_MAX_DEPTH, Some("a"));
        guard.enter("b").unwrap();

        match guard.enter("a") {
            Err(RuleError::ReferenceCycle { chain }) => assert_eq!(chain, vec!["a", "b", "a"]),
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_sibling_references_are_not_cycles() {
        let mut guard = ExpansionGuard::new(DEFAULT_MAX_DEPTH, None);
        guard.enter("shared").unwrap();
        guard.leave();
        guard.enter("shared").unwrap();
    }

    #[test]
    fn test_depth_limit() {
        let guard = ExpansionGuard::new(2, None);
        assert!(guard.check_depth(2).is_ok());
        assert!(matches!(
            guard.check_depth(3),
            Err(RuleError::DepthExceeded { limit: 2 })
        ));

        let mut guard = ExpansionGuard::new(1, None);
        guard.enter("a").unwrap();
        assert!(matches!(guard.enter("b"), Err(RuleError::DepthExceeded { .. })));
    }
}

//! 约束评估器
//!
//! 实现各操作符的求值逻辑。约束字段缺失时，除 exists / does not exist 外一律不成立。

use crate::classifier::lookup_field;
use crate::collaborators::{EmptinessCheck, StandardEmptiness};
use crate::models::Constraint;
use crate::operators::Operator;
use dashmap::DashMap;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;

/// 约束评估器
pub struct ConstraintEvaluator {
    emptiness: Arc<dyn EmptinessCheck>,
    patterns: PatternCache,
}

impl ConstraintEvaluator {
    pub fn new() -> Self {
        Self::with_emptiness(Arc::new(StandardEmptiness))
    }

    pub fn with_emptiness(emptiness: Arc<dyn EmptinessCheck>) -> Self {
        Self {
            emptiness,
            patterns: PatternCache::default(),
        }
    }

    pub fn with_pattern_capacity(mut self, capacity: usize) -> Self {
        self.patterns = PatternCache::new(capacity);
        self
    }

    /// 在评估数据上检查约束
    pub fn check(&self, constraint: &Constraint, criteria: &Value) -> bool {
        let criterion = lookup_field(&constraint.field, criteria);
        self.evaluate(criterion, constraint.operator, &constraint.value)
    }

    /// 评估操作符
    ///
    /// # Arguments
    /// * `criterion` - 从评估数据中取出的字段值
    /// * `operator` - 操作符
    /// * `expected` - 约束中定义的值
    pub fn evaluate(&self, criterion: Option<&Value>, operator: Operator, expected: &Value) -> bool {
        // 存在性检查的语义就是判断字段是否存在，不能提前返回
        match operator {
            Operator::Exists => return !self.emptiness.is_empty(criterion),
            Operator::DoesNotExist => return self.emptiness.is_empty(criterion),
            _ => {}
        }

        let Some(criterion) = criterion else {
            return false;
        };

        match operator {
            Operator::Equals => strict_eq(criterion, expected),
            Operator::DoesNotEqual => !strict_eq(criterion, expected),
            Operator::GreaterThan => compare(criterion, expected).is_some_and(Ordering::is_gt),
            Operator::LessThan => compare(criterion, expected).is_some_and(Ordering::is_lt),
            Operator::GreaterThanOrEqual => {
                compare(criterion, expected).is_some_and(Ordering::is_ge)
            }
            Operator::LessThanOrEqual => compare(criterion, expected).is_some_and(Ordering::is_le),
            Operator::In => member_of(criterion, expected).unwrap_or(false),
            Operator::NotIn => member_of(criterion, expected).is_some_and(|found| !found),
            Operator::Contains => member_of(expected, criterion).unwrap_or(false),
            Operator::NotContains => member_of(expected, criterion).is_some_and(|found| !found),
            Operator::ContainsAny => contains_any(criterion, expected).unwrap_or(false),
            Operator::NotContainsAny => contains_any(criterion, expected).is_some_and(|found| !found),
            Operator::Matches => self.pattern_match(criterion, expected).unwrap_or(false),
            Operator::DoesNotMatch => self
                .pattern_match(criterion, expected)
                .is_some_and(|found| !found),
            Operator::Exists | Operator::DoesNotExist => unreachable!(),
        }
    }

    /// 正则匹配：字段值提供模式，约束值（字符串化后）是被匹配的文本
    ///
    /// 字段值不是字符串或模式无法编译时返回 None。
    fn pattern_match(&self, criterion: &Value, expected: &Value) -> Option<bool> {
        let pattern = criterion.as_str()?;
        let regex = self.patterns.get_or_compile(pattern)?;
        Some(regex.is_match(&stringify(expected)))
    }
}

impl Default for ConstraintEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// 严格相等；数值统一按浮点比较（100 == 100.0）
pub fn strict_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        _ => left == right,
    }
}

/// 顺序比较，只定义数值与数值、字符串与字符串
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// item 是否为 list 的成员；list 不是数组时返回 None
fn member_of(item: &Value, list: &Value) -> Option<bool> {
    let list = list.as_array()?;
    Some(list.iter().any(|candidate| strict_eq(item, candidate)))
}

/// expected 中是否有任一元素属于 criterion；任一方不是数组时返回 None
fn contains_any(criterion: &Value, expected: &Value) -> Option<bool> {
    let haystack = criterion.as_array()?;
    let needles = expected.as_array()?;
    Some(
        needles
            .iter()
            .any(|needle| haystack.iter().any(|item| strict_eq(item, needle))),
    )
}

/// 值的字符串形式，用作正则匹配的文本
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::Array(items) => items.iter().map(stringify).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// 正则表达式缓存
///
/// 按模式字符串缓存编译结果，超出容量时整体清空。
pub struct PatternCache {
    entries: DashMap<String, Regex>,
    capacity: usize,
}

impl PatternCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
        }
    }

    /// 获取编译后的正则，模式无效时返回 None
    pub fn get_or_compile(&self, pattern: &str) -> Option<Regex> {
        if let Some(regex) = self.entries.get(pattern) {
            return Some(regex.clone());
        }

        let regex = Regex::new(pattern).ok()?;

        if self.capacity > 0 {
            if self.entries.len() >= self.capacity {
                self.entries.clear();
            }
            self.entries.insert(pattern.to_string(), regex.clone());
        }

        Some(regex)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(criterion: Option<&Value>, operator: Operator, expected: Value) -> bool {
        ConstraintEvaluator::new().evaluate(criterion, operator, &expected)
    }

    #[test]
    fn test_equals() {
        assert!(eval(Some(&json!(100)), Operator::Equals, json!(100)));
        assert!(eval(Some(&json!(100.0)), Operator::Equals, json!(100)));
        assert!(eval(Some(&json!("hello")), Operator::Equals, json!("hello")));
        assert!(eval(Some(&json!(false)), Operator::Equals, json!(false)));
        assert!(eval(Some(&Value::Null), Operator::Equals, Value::Null));

        // 严格相等，不做类型转换
        assert!(!eval(Some(&json!("100")), Operator::Equals, json!(100)));
        assert!(!eval(Some(&json!(0)), Operator::Equals, json!(false)));
    }

    #[test]
    fn test_does_not_equal() {
        assert!(eval(Some(&json!(2)), Operator::DoesNotEqual, json!(1)));
        assert!(!eval(Some(&json!(2)), Operator::DoesNotEqual, json!(2)));
    }

    #[test]
    fn test_ordering() {
        assert!(eval(Some(&json!(100)), Operator::GreaterThan, json!(50)));
        assert!(eval(Some(&json!(100)), Operator::GreaterThanOrEqual, json!(100)));
        assert!(eval(Some(&json!(50)), Operator::LessThan, json!(100)));
        assert!(eval(Some(&json!(100)), Operator::LessThanOrEqual, json!(100)));
        assert!(eval(Some(&json!("b")), Operator::GreaterThan, json!("a")));

        // 类型不可比较时不成立
        assert!(!eval(Some(&json!("100")), Operator::GreaterThan, json!(50)));
        assert!(!eval(Some(&json!(null)), Operator::LessThan, json!(50)));
    }

    #[test]
    fn test_exists() {
        assert!(eval(Some(&json!(0)), Operator::Exists, Value::Null));
        assert!(eval(Some(&json!(false)), Operator::Exists, Value::Null));
        assert!(!eval(None, Operator::Exists, Value::Null));
        assert!(!eval(Some(&json!("")), Operator::Exists, Value::Null));

        assert!(eval(None, Operator::DoesNotExist, Value::Null));
        assert!(eval(Some(&json!([])), Operator::DoesNotExist, Value::Null));
        assert!(!eval(Some(&json!("x")), Operator::DoesNotExist, Value::Null));
    }

    #[test]
    fn test_in_list() {
        assert!(eval(Some(&json!("a")), Operator::In, json!(["a", "b", "c"])));
        assert!(!eval(Some(&json!("d")), Operator::In, json!(["a", "b", "c"])));
        assert!(eval(Some(&json!("d")), Operator::NotIn, json!(["a", "b", "c"])));
        assert!(!eval(Some(&json!("a")), Operator::NotIn, json!(["a", "b", "c"])));
        // 值不是数组
        assert!(!eval(Some(&json!("a")), Operator::In, json!("a")));
        assert!(!eval(Some(&json!("a")), Operator::NotIn, json!("b")));
    }

    #[test]
    fn test_contains() {
        assert!(eval(Some(&json!(["a", "b", "c"])), Operator::Contains, json!("b")));
        assert!(!eval(Some(&json!(["a", "b", "c"])), Operator::Contains, json!("x")));
        assert!(eval(Some(&json!(["a", "b"])), Operator::NotContains, json!("x")));
        assert!(!eval(Some(&json!("abc")), Operator::Contains, json!("b")));
        assert!(!eval(Some(&json!("abc")), Operator::NotContains, json!("x")));
    }

    #[test]
    fn test_contains_any() {
        assert!(eval(Some(&json!(["x", "b"])), Operator::ContainsAny, json!(["a", "b"])));
        assert!(!eval(Some(&json!(["x", "y"])), Operator::ContainsAny, json!(["a", "b"])));
        assert!(eval(Some(&json!(["x", "y"])), Operator::NotContainsAny, json!(["a", "b"])));
        assert!(!eval(Some(&json!(["x", "b"])), Operator::NotContainsAny, json!(["a", "b"])));
    }

    #[test]
    fn test_matches_uses_criterion_as_pattern() {
        assert!(eval(
            Some(&json!(r"^[\w.-]+@[\w.-]+\.\w+$")),
            Operator::Matches,
            json!("user@example.com")
        ));
        assert!(!eval(Some(&json!("^abc$")), Operator::Matches, json!("xyz")));
        assert!(eval(Some(&json!("^abc$")), Operator::DoesNotMatch, json!("xyz")));
        assert!(eval(Some(&json!(r"^\d+$")), Operator::Matches, json!(42)));
        // 无效模式两种操作都不成立
        assert!(!eval(Some(&json!("[invalid")), Operator::Matches, json!("x")));
        assert!(!eval(Some(&json!("[invalid")), Operator::DoesNotMatch, json!("x")));
    }

    #[test]
    fn test_missing_field() {
        for op in Operator::ALL {
            if op.checks_presence() {
                continue;
            }
            assert!(!eval(None, op, json!(["a"])), "{} should be false on a missing field", op);
        }
    }

    #[test]
    fn test_check_resolves_dotted_field() {
        let evaluator = ConstraintEvaluator::new();
        let criteria = json!({"user": {"age": 30}, "tags": ["x", "b"]});

        assert!(evaluator.check(
            &Constraint::new("user.age", Operator::GreaterThan, 18),
            &criteria
        ));
        assert!(evaluator.check(
            &Constraint::new("tags", Operator::ContainsAny, json!(["a", "b"])),
            &criteria
        ));
        assert!(!evaluator.check(
            &Constraint::new("user.name", Operator::Equals, "bob"),
            &criteria
        ));
    }

    #[test]
    fn test_custom_emptiness() {
        struct ZeroIsEmpty;
        impl EmptinessCheck for ZeroIsEmpty {
            fn is_empty(&self, value: Option<&Value>) -> bool {
                matches!(value, None | Some(Value::Null)) || value == Some(&json!(0))
            }
        }

        let evaluator = ConstraintEvaluator::with_emptiness(Arc::new(ZeroIsEmpty));
        assert!(!evaluator.evaluate(Some(&json!(0)), Operator::Exists, &Value::Null));
    }

    #[test]
    fn test_stringify() {
        assert_eq!(stringify(&json!("a")), "a");
        assert_eq!(stringify(&json!(5)), "5");
        assert_eq!(stringify(&json!(5.0)), "5");
        assert_eq!(stringify(&json!(1.5)), "1.5");
        assert_eq!(stringify(&json!(true)), "true");
        assert_eq!(stringify(&Value::Null), "null");
        assert_eq!(stringify(&json!([1, "b"])), "1,b");
    }

    #[test]
    fn test_pattern_cache() {
        let cache = PatternCache::new(2);
        assert!(cache.get_or_compile("a+").is_some());
        assert!(cache.get_or_compile("a+").is_some());
        assert_eq!(cache.len(), 1);

        assert!(cache.get_or_compile("(").is_none());
        assert_eq!(cache.len(), 1);

        cache.get_or_compile("b+");
        cache.get_or_compile("c+");
        assert!(cache.len() <= 2);
    }
}

//! 节点分类
//!
//! 判断原始 JSON 节点是条件、约束还是其他，并按点号路径在评估数据中取值。

use crate::operators::ConditionKind;
use serde_json::Value;

/// 返回节点的第一个分支类型；三个键都不存在时返回 None
pub fn condition_type(node: &Value) -> Option<ConditionKind> {
    let map = node.as_object()?;
    ConditionKind::ALL
        .into_iter()
        .find(|kind| map.contains_key(kind.key()))
}

/// 节点上出现的 any/all/none 键数量
pub fn branch_count(node: &Value) -> usize {
    node.as_object()
        .map(|map| {
            ConditionKind::ALL
                .iter()
                .filter(|kind| map.contains_key(kind.key()))
                .count()
        })
        .unwrap_or(0)
}

/// 非 null、非数组的结构化对象
pub fn is_object(node: &Value) -> bool {
    node.is_object()
}

/// 至少包含一个 any/all/none 键的对象
///
/// 不检查互斥，多分支的情况交给校验器给出精确错误。
pub fn is_condition(node: &Value) -> bool {
    is_object(node) && condition_type(node).is_some()
}

/// 同时包含 field、operator、value 三个键的对象
pub fn is_constraint(node: &Value) -> bool {
    node.as_object().is_some_and(|map| {
        map.contains_key("field") && map.contains_key("operator") && map.contains_key("value")
    })
}

/// 按点号分隔的路径逐级取值，任一中间值缺失即返回 None
///
/// 数组可以用数字段访问，如 "items.0.name"。
pub fn resolve_nested_property<'a>(path: &str, record: &'a Value) -> Option<&'a Value> {
    let mut current = record;

    for part in path.split('.') {
        match current {
            Value::Object(map) => {
                current = map.get(part)?;
            }
            Value::Array(arr) => {
                let index: usize = part.parse().ok()?;
                current = arr.get(index)?;
            }
            _ => return None,
        }
    }

    Some(current)
}

/// 约束字段取值：含点号时走路径解析，否则直接按键查找
pub fn lookup_field<'a>(field: &str, criteria: &'a Value) -> Option<&'a Value> {
    if field.contains('.') {
        resolve_nested_property(field, criteria)
    } else {
        criteria.as_object()?.get(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_condition_type() {
        assert_eq!(condition_type(&json!({"any": []})), Some(ConditionKind::Any));
        assert_eq!(condition_type(&json!({"none": [], "result": 1})), Some(ConditionKind::NoneOf));
        assert_eq!(condition_type(&json!({"field": "a"})), None);
        assert_eq!(condition_type(&json!("rule-id")), None);
    }

    #[test]
    fn test_is_condition_is_permissive() {
        assert!(is_condition(&json!({"all": [1]})));
        assert!(is_condition(&json!({"any": [], "all": []})));
        assert_eq!(branch_count(&json!({"any": [], "all": [], "none": []})), 3);
        assert!(!is_condition(&json!([{"all": []}])));
        assert!(!is_condition(&Value::Null));
    }

    #[test]
    fn test_is_object() {
        assert!(is_object(&json!({})));
        assert!(!is_object(&json!([])));
        assert!(!is_object(&Value::Null));
        assert!(!is_object(&json!("x")));
    }

    #[test]
    fn test_is_constraint() {
        assert!(is_constraint(&json!({"field": "a", "operator": "equals", "value": null})));
        assert!(!is_constraint(&json!({"field": "a", "operator": "equals"})));
        assert!(!is_constraint(&json!(["field", "operator", "value"])));
    }

    #[test]
    fn test_resolve_nested_property() {
        let record = json!({
            "user": {
                "profile": {"age": 30},
                "tags": ["vip", "frequent"]
            },
            "items": [{"name": "ticket"}]
        });

        assert_eq!(resolve_nested_property("user.profile.age", &record), Some(&json!(30)));
        assert_eq!(resolve_nested_property("items.0.name", &record), Some(&json!("ticket")));
        assert_eq!(resolve_nested_property("user.missing.age", &record), None);
        assert_eq!(resolve_nested_property("user.profile.age.value", &record), None);
        assert_eq!(resolve_nested_property("items.x", &record), None);
    }

    #[test]
    fn test_lookup_field() {
        let record = json!({"a.b": 1, "a": {"b": 2}, "flag": null});

        // 含点号时按路径解析
        assert_eq!(lookup_field("a.b", &record), Some(&json!(2)));
        assert_eq!(lookup_field("flag", &record), Some(&Value::Null));
        assert_eq!(lookup_field("missing", &record), None);
        assert_eq!(lookup_field("a", &json!([1, 2])), None);
    }
}

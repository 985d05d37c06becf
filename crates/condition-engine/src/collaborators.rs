//! 注入式协作者
//!
//! 空值判断与错误上报以 trait 形式传入引擎，而不是依赖全局函数。

use parking_lot::Mutex;
use serde_json::Value;
use tracing::error;

/// 空值判断
pub trait EmptinessCheck: Send + Sync {
    fn is_empty(&self, value: Option<&Value>) -> bool;
}

/// 默认空值语义：缺失、null、空字符串、空数组、空对象为空；0 和 false 不为空
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardEmptiness;

impl EmptinessCheck for StandardEmptiness {
    fn is_empty(&self, value: Option<&Value>) -> bool {
        match value {
            None => true,
            Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(Value::Array(arr)) => arr.is_empty(),
            Some(Value::Object(obj)) => obj.is_empty(),
            _ => false,
        }
    }
}

/// 错误上报通道
pub trait ErrorSink: Send + Sync {
    fn report(&self, message: &str, context: &Value);
}

/// 通过 tracing 以 error 级别记录
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, message: &str, context: &Value) {
        error!(context = %context, "{}", message);
    }
}

/// 在内存中保留上报内容
#[derive(Debug, Default)]
pub struct RecordingErrorSink {
    reports: Mutex<Vec<(String, Value)>>,
}

impl RecordingErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<(String, Value)> {
        self.reports.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }
}

impl ErrorSink for RecordingErrorSink {
    fn report(&self, message: &str, context: &Value) {
        self.reports.lock().push((message.to_string(), context.clone()));
    }
}

//! 条件树规则引擎
//!
//! 在 JSON 形式的条件树上提供：
//! - 节点分类与嵌套属性解析
//! - 结构校验，精确定位出错节点
//! - 短路求值评估，支持跨规则引用
//! - 引用成环与深度保护

pub mod classifier;
pub mod cli;
pub mod collaborators;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
mod guard;
pub mod loader;
pub mod models;
pub mod operators;
pub mod repository;
pub mod validator;

pub use collaborators::{EmptinessCheck, ErrorSink, RecordingErrorSink, StandardEmptiness, TracingErrorSink};
pub use engine::{EngineConfig, RuleEngine, RuleSource};
pub use error::{Result, RuleError};
pub use evaluator::ConstraintEvaluator;
pub use guard::DEFAULT_MAX_DEPTH;
pub use loader::RuleLoader;
pub use models::{
    Condition, Constraint, EvaluationResult, Node, Rule, ValidationError, ValidationResult, Verdict,
};
pub use operators::{ConditionKind, Operator};
pub use repository::{InMemoryRuleRepository, RuleRepository};
pub use validator::Validator;

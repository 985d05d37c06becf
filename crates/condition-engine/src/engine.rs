//! 规则引擎门面
//!
//! 组合校验器与执行器：评估前先校验，字符串规则引用通过 [`RuleRepository`] 解析。
//! 规则无效时通过 [`ErrorSink`] 上报并返回 [`RuleError::InvalidRule`]，不会给出猜测的结论。

use crate::collaborators::{EmptinessCheck, ErrorSink, TracingErrorSink};
use crate::error::{Result, RuleError};
use crate::evaluator::ConstraintEvaluator;
use crate::executor::RuleExecutor;
use crate::guard::DEFAULT_MAX_DEPTH;
use crate::models::{EvaluationResult, Rule, ValidationResult, Verdict};
use crate::repository::RuleRepository;
use crate::validator::Validator;
use condition_shared::config::EngineSettings;
use condition_shared::observability::metrics::{record_rule_evaluation, record_rule_validation};
use serde_json::{Value, json};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument};

/// 待校验或评估的规则：调用方直接提供，或按 ID 从仓储获取
#[derive(Debug, Clone, Copy)]
pub enum RuleSource<'a> {
    Inline(&'a Rule),
    Stored(&'a str),
}

impl<'a> From<&'a Rule> for RuleSource<'a> {
    fn from(rule: &'a Rule) -> Self {
        Self::Inline(rule)
    }
}

impl<'a> From<&'a str> for RuleSource<'a> {
    fn from(rule_id: &'a str) -> Self {
        Self::Stored(rule_id)
    }
}

impl<'a> From<&'a String> for RuleSource<'a> {
    fn from(rule_id: &'a String) -> Self {
        Self::Stored(rule_id.as_str())
    }
}

/// 引擎运行参数
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_depth: usize,
    pub trace_enabled: bool,
    pub pattern_cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            trace_enabled: false,
            pattern_cache_capacity: 256,
        }
    }
}

impl From<&EngineSettings> for EngineConfig {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            max_depth: settings.max_depth,
            trace_enabled: settings.trace_enabled,
            pattern_cache_capacity: settings.pattern_cache_capacity,
        }
    }
}

/// 规则引擎
pub struct RuleEngine {
    repository: Arc<dyn RuleRepository>,
    config: EngineConfig,
    constraints: ConstraintEvaluator,
    sink: Arc<dyn ErrorSink>,
}

impl RuleEngine {
    pub fn new(repository: Arc<dyn RuleRepository>) -> Self {
        Self::with_config(repository, EngineConfig::default())
    }

    pub fn with_config(repository: Arc<dyn RuleRepository>, config: EngineConfig) -> Self {
        let constraints =
            ConstraintEvaluator::new().with_pattern_capacity(config.pattern_cache_capacity);

        Self {
            repository,
            config,
            constraints,
            sink: Arc::new(TracingErrorSink),
        }
    }

    /// 替换错误上报通道
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    /// 替换空值判断（影响 exists / does not exist）
    pub fn with_emptiness(mut self, emptiness: Arc<dyn EmptinessCheck>) -> Self {
        self.constraints = ConstraintEvaluator::with_emptiness(emptiness)
            .with_pattern_capacity(self.config.pattern_cache_capacity);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 校验规则
    ///
    /// 结构缺陷以 `Ok(ValidationResult)` 返回；引用解析失败以错误返回。
    #[instrument(skip(self, source))]
    pub fn validate<'a>(&self, source: impl Into<RuleSource<'a>>) -> Result<ValidationResult> {
        let rule = self.resolve(source.into())?;
        let result = self.validator().validate(&rule)?;
        record_rule_validation(result.is_valid);
        Ok(result)
    }

    /// 校验原始 JSON 规则
    #[instrument(skip(self, rule))]
    pub fn validate_json(&self, rule: &Value) -> Result<ValidationResult> {
        let result = self.validator().validate_json(rule)?;
        record_rule_validation(result.is_valid);
        Ok(result)
    }

    /// 在单条评估数据上评估规则
    #[instrument(skip(self, source, criteria))]
    pub fn evaluate<'a>(&self, source: impl Into<RuleSource<'a>>, criteria: &Value) -> Result<bool> {
        let rule = self.prepare(source.into())?;
        self.run(&rule, criteria, false).map(|r| r.verdict)
    }

    /// 在多条评估数据上逐条评估同一规则，结果顺序与输入一致
    #[instrument(skip(self, source, criteria), fields(batch_size = criteria.len()))]
    pub fn evaluate_all<'a>(
        &self,
        source: impl Into<RuleSource<'a>>,
        criteria: &[Value],
    ) -> Result<Vec<bool>> {
        let rule = self.prepare(source.into())?;
        criteria
            .iter()
            .map(|c| self.run(&rule, c, false).map(|r| r.verdict))
            .collect()
    }

    /// 评估数据为数组时逐条评估，否则作为单条评估
    pub fn evaluate_criteria<'a>(
        &self,
        source: impl Into<RuleSource<'a>>,
        criteria: &Value,
    ) -> Result<Verdict> {
        match criteria {
            Value::Array(records) => self.evaluate_all(source, records).map(Verdict::Batch),
            single => self.evaluate(source, single).map(Verdict::Single),
        }
    }

    /// 评估并返回完整结果（命中条件、命中约束、追踪信息）
    #[instrument(skip(self, source, criteria))]
    pub fn explain<'a>(
        &self,
        source: impl Into<RuleSource<'a>>,
        criteria: &Value,
    ) -> Result<EvaluationResult> {
        let rule = self.prepare(source.into())?;
        self.run(&rule, criteria, self.config.trace_enabled)
    }

    fn validator(&self) -> Validator<'_> {
        Validator::new(self.repository.as_ref()).with_max_depth(self.config.max_depth)
    }

    fn resolve<'a>(&self, source: RuleSource<'a>) -> Result<Cow<'a, Rule>> {
        match source {
            RuleSource::Inline(rule) => Ok(Cow::Borrowed(rule)),
            RuleSource::Stored(rule_id) => self.repository.get_rule_by_id(rule_id).map(Cow::Owned),
        }
    }

    /// 解析并校验规则，无效规则上报后返回错误
    fn prepare<'a>(&self, source: RuleSource<'a>) -> Result<Cow<'a, Rule>> {
        let rule = self.resolve(source)?;
        let validation = self.validator().validate(&rule)?;
        record_rule_validation(validation.is_valid);

        if let Some(error) = validation.error {
            self.sink.report(
                &format!("rule '{}' is not valid: {}", rule.id, error.message),
                &json!({ "ruleId": rule.id, "element": error.element }),
            );
            record_rule_evaluation("invalid", 0.0);
            return Err(RuleError::InvalidRule {
                rule_id: rule.id.clone(),
                message: error.message,
                element: error.element,
            });
        }

        Ok(rule)
    }

    fn run(&self, rule: &Rule, criteria: &Value, trace: bool) -> Result<EvaluationResult> {
        let start = Instant::now();
        let mut executor = RuleExecutor::new(self.repository.as_ref(), &self.constraints)
            .with_max_depth(self.config.max_depth);
        if trace {
            executor = executor.with_trace();
        }

        let outcome = executor.execute(rule, criteria);
        let elapsed = start.elapsed().as_secs_f64();

        match &outcome {
            Ok(result) => {
                record_rule_evaluation(if result.verdict { "matched" } else { "not_matched" }, elapsed);
                debug!(
                    rule_id = %rule.id,
                    verdict = result.verdict,
                    matched_condition = ?result.matched_condition,
                    "Rule evaluated"
                );
            }
            Err(e) => {
                record_rule_evaluation("error", elapsed);
                debug!(rule_id = %rule.id, error = %e, "Rule evaluation failed");
            }
        }

        outcome
    }
}

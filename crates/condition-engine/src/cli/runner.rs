//! 命令执行器
//!
//! 负责执行各 CLI 子命令的具体逻辑，输出写入调用方提供的 writer。

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::engine::{EngineConfig, RuleEngine};
use crate::loader::RuleLoader;
use crate::models::Rule;
use crate::repository::InMemoryRuleRepository;

/// 命令行中的规则参数：已加载规则的 ID，或规则文件中的原始 JSON
enum RuleArg {
    Stored(String),
    File(Value, String),
}

/// 命令执行器
///
/// 持有内存规则仓储和引擎，作为 CLI 与引擎之间的桥梁。
pub struct CommandRunner {
    repository: Arc<InMemoryRuleRepository>,
    engine: RuleEngine,
}

impl CommandRunner {
    pub fn new(config: EngineConfig) -> Self {
        let repository = Arc::new(InMemoryRuleRepository::new());
        let engine = RuleEngine::with_config(repository.clone(), config);
        Self { repository, engine }
    }

    /// 从目录加载规则到仓储，返回成功加载的数量
    pub fn load_rules(&self, dir: &Path) -> Result<usize> {
        if !dir.is_dir() {
            warn!("Rules directory {} not found, starting empty", dir.display());
            return Ok(0);
        }

        let rules = RuleLoader::from_directory(dir)?;
        let loaded = self.repository.load_batch(rules);
        info!(count = loaded.len(), "Rules loaded from {}", dir.display());
        Ok(loaded.len())
    }

    /// 执行 list 命令
    pub fn run_list(&self, out: &mut impl Write) -> Result<()> {
        for id in self.repository.list_ids() {
            let label = self
                .repository
                .get(&id)
                .map(|r| r.label)
                .unwrap_or_default();
            writeln!(out, "{}\t{}", id, label)?;
        }
        Ok(())
    }

    /// 执行 validate 命令，返回规则是否有效
    pub fn run_validate(&self, rule: &str, out: &mut impl Write) -> Result<bool> {
        let result = match self.rule_arg(rule)? {
            RuleArg::Stored(id) => self.engine.validate(&id)?,
            RuleArg::File(value, _) => self.engine.validate_json(&value)?,
        };

        print_json(out, &result)?;
        Ok(result.is_valid)
    }

    /// 执行 evaluate 命令
    pub fn run_evaluate(
        &self,
        rule: &str,
        criteria: &str,
        explain: bool,
        out: &mut impl Write,
    ) -> Result<()> {
        let inline = match self.rule_arg(rule)? {
            RuleArg::Stored(id) => self.repository.get(&id),
            RuleArg::File(value, stem) => {
                let mut parsed: Rule =
                    serde_json::from_value(value).context("规则文件不是合法的规则")?;
                if parsed.id.is_empty() {
                    parsed.id = stem;
                }
                Some(parsed)
            }
        };
        let rule = inline.with_context(|| format!("规则不存在: {}", rule))?;
        let criteria = read_criteria(criteria)?;

        if explain {
            print_json(out, &self.engine.explain(&rule, &criteria)?)
        } else {
            print_json(out, &self.engine.evaluate_criteria(&rule, &criteria)?)
        }
    }

    fn rule_arg(&self, rule: &str) -> Result<RuleArg> {
        if self.repository.contains(rule) {
            return Ok(RuleArg::Stored(rule.to_string()));
        }

        let path = Path::new(rule);
        let content = fs::read_to_string(path)
            .with_context(|| format!("'{}' 既不是已加载的规则 ID，也不是可读的规则文件", rule))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("规则文件 JSON 解析失败: {}", rule))?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(RuleArg::File(value, stem))
    }
}

/// 读取评估数据，"-" 表示标准输入
fn read_criteria(source: &str) -> Result<Value> {
    let content = if source == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("读取标准输入失败")?;
        buf
    } else {
        fs::read_to_string(source).with_context(|| format!("读取评估数据失败: {}", source))?
    };

    serde_json::from_str(&content).context("评估数据 JSON 解析失败")
}

fn print_json(out: &mut impl Write, value: &impl Serialize) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

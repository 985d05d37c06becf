//! 规则文件加载
//!
//! 从目录读取 `*.json` 规则文件。单个文件可以是一条规则或规则数组，
//! 缺少 `id` 的单条规则以文件名（不含扩展名）作为 ID，规则数组中缺少 `id` 的规则分配生成的 ID，
//! 无法解析的文件记录警告后跳过。

use crate::error::{Result, RuleError};
use crate::models::Rule;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{info, instrument, warn};

pub struct RuleLoader;

impl RuleLoader {
    /// 加载目录下的所有规则，按文件名排序
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn from_directory(dir: impl AsRef<Path>) -> Result<Vec<Rule>> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|source| RuleError::Io {
            path: dir.display().to_string(),
            source,
        })?;

        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut rules = Vec::new();
        for path in &paths {
            match Self::from_file(path) {
                Ok(mut loaded) => rules.append(&mut loaded),
                Err(e) => warn!("Skipping rule file {}: {}", path.display(), e),
            }
        }

        info!("Loaded {} rules from {} files", rules.len(), paths.len());
        Ok(rules)
    }

    /// 加载单个规则文件
    pub fn from_file(path: impl AsRef<Path>) -> Result<Vec<Rule>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| RuleError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut rules: Vec<Rule> = match serde_json::from_str::<Value>(&content)? {
            Value::Array(items) => items
                .into_iter()
                .map(serde_json::from_value)
                .collect::<serde_json::Result<_>>()?,
            single => vec![serde_json::from_value(single)?],
        };

        // 只有单条规则的文件才用文件名补全 ID
        if let [rule] = rules.as_mut_slice() {
            if rule.id.is_empty() {
                rule.id = stem;
            }
        } else {
            for rule in rules.iter_mut().filter(|r| r.id.is_empty()) {
                rule.id = Rule::generate_id();
                warn!(
                    "Rule without id in {}, assigned {}",
                    path.display(),
                    rule.id
                );
            }
        }

        Ok(rules)
    }
}

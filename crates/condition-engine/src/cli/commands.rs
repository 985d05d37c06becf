//! CLI 命令定义
//!
//! 使用 clap derive 宏定义命令行接口结构。

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// 条件规则引擎命令行工具
///
/// 使用 `--help` 查看各子命令的详细说明。
#[derive(Parser, Debug)]
#[command(name = "condition-engine")]
#[command(version, about = "条件树规则校验与评估工具")]
#[command(propagate_version = true)]
pub struct Cli {
    /// 规则目录（覆盖配置文件中的 rules.directory）
    #[arg(long, global = true)]
    pub rules_dir: Option<PathBuf>,

    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// 退出前输出 Prometheus 指标快照
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// 子命令枚举
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 列出已加载的规则
    List,

    /// 校验规则
    ///
    /// RULE 为已加载规则的 ID，或规则 JSON 文件路径。规则无效时退出码为 1。
    Validate {
        /// 规则 ID 或规则文件路径
        rule: String,
    },

    /// 评估规则
    ///
    /// 评估数据为数组时逐条评估，输出结论数组。
    Evaluate {
        /// 规则 ID 或规则文件路径
        rule: String,

        /// 评估数据文件路径（"-" 表示标准输入）
        #[arg(short, long)]
        criteria: String,

        /// 输出完整评估结果（命中条件、命中约束、追踪）
        #[arg(long)]
        explain: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_validate() {
        let cli = Cli::try_parse_from(["condition-engine", "validate", "vip-customer"]).unwrap();

        assert!(cli.rules_dir.is_none());
        assert!(!cli.metrics);
        match cli.command {
            Commands::Validate { rule } => assert_eq!(rule, "vip-customer"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_evaluate() {
        let cli = Cli::try_parse_from([
            "condition-engine",
            "--rules-dir",
            "/tmp/rules",
            "evaluate",
            "rules/vip.json",
            "--criteria",
            "-",
            "--explain",
            "--metrics",
        ])
        .unwrap();

        assert_eq!(cli.rules_dir, Some(PathBuf::from("/tmp/rules")));
        assert!(cli.metrics);
        match cli.command {
            Commands::Evaluate {
                rule,
                criteria,
                explain,
            } => {
                assert_eq!(rule, "rules/vip.json");
                assert_eq!(criteria, "-");
                assert!(explain);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_requires_criteria() {
        let result = Cli::try_parse_from(["condition-engine", "evaluate", "vip"]);
        assert!(result.is_err());
    }
}

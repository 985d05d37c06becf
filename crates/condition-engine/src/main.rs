//! 条件规则引擎命令行入口

use anyhow::Result;
use clap::Parser;
use condition_engine::cli::{Cli, CommandRunner, Commands};
use condition_engine::EngineConfig;
use condition_shared::config::AppConfig;
use condition_shared::observability;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // 统一加载配置：命令行参数覆盖配置文件
    let mut config = AppConfig::load("condition-engine").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }
    if cli.metrics {
        config.observability.metrics_enabled = true;
    }

    let guard = observability::init(&config.observability_config())?;

    let runner = CommandRunner::new(EngineConfig::from(&config.engine));
    let rules_dir = cli
        .rules_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.rules.directory));
    let count = runner.load_rules(&rules_dir)?;
    info!(count, dir = %rules_dir.display(), "Rule repository ready");

    let mut out = io::stdout().lock();
    let status = match &cli.command {
        Commands::List => {
            runner.run_list(&mut out)?;
            ExitCode::SUCCESS
        }
        Commands::Validate { rule } => {
            if runner.run_validate(rule, &mut out)? {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Commands::Evaluate {
            rule,
            criteria,
            explain,
        } => {
            runner.run_evaluate(rule, criteria, *explain, &mut out)?;
            ExitCode::SUCCESS
        }
    };

    if cli.metrics {
        if let Some(snapshot) = guard.render_metrics() {
            eprintln!("{}", snapshot);
        }
    }

    Ok(status)
}

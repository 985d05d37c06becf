//! CLI 模块
//!
//! 提供命令行接口，支持以下功能：
//!
//! - `list` - 列出规则目录中加载的规则
//! - `validate` - 校验存储的规则或规则文件
//! - `evaluate` - 在评估数据上评估规则
//!
//! # 使用示例
//!
//! ```bash
//! # 校验规则
//! condition-engine --rules-dir rules validate vip-customer
//!
//! # 从文件读取评估数据
//! condition-engine evaluate vip-customer --criteria criteria.json
//!
//! # 从标准输入读取并输出评估详情
//! echo '{"vip": true}' | condition-engine evaluate rules/vip.json --criteria - --explain
//! ```

pub mod commands;
pub mod runner;

pub use commands::{Cli, Commands};
pub use runner::CommandRunner;

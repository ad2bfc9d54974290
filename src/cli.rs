/// cli.rs - 命令行接口定义模块
/// 职责：使用 clap 定义演示循环的参数和子命令
/// 不带子命令时运行无头演示：脚本化插入点驱动引擎，绘图调用录制后丢弃

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::utils::version;

/// 主命令行结构
#[derive(Parser)]
#[command(author, version = version(), about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
#[command(subcommand_value_name = "SUBCOMMAND")]
#[command(subcommand_help_heading = "Subcommands")]
pub struct Cli {
    /// 配置文件路径（默认：`$XDG_CONFIG_HOME/caret-trail/config.toml`）
    ///
    /// 也可通过 `CARET_TRAIL_CONFIG` 环境变量设置。
    /// 若两者都存在，命令行参数优先。
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 运行的帧数，0 表示一直运行
    #[arg(short, long, default_value_t = 600)]
    pub frames: u64,

    /// 每秒帧数，0 表示不限速
    #[arg(short, long, default_value_t = 60.)]
    pub rate: f64,

    /// 脚本化插入点的随机种子
    #[arg(short, long, default_value_t = 0)]
    pub seed: u64,

    /// 动画时间的速率（如 0.25 为慢动作）
    #[arg(long, default_value_t = 1.)]
    pub time_rate: f64,

    #[command(subcommand)]
    pub subcommand: Option<Sub>,
}

#[derive(Subcommand)]
pub enum Sub {
    /// 验证配置文件
    Validate {
        /// 配置文件路径（规则同主命令）
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// 把内置的默认配置输出到 stdout
    DefaultConfig,

    /// 生成 shell 自动补全脚本
    Completions { shell: Shell },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["caret-trail"]).unwrap();
        assert!(cli.subcommand.is_none());
        assert_eq!(cli.frames, 600);
        assert_eq!(cli.rate, 60.);
        assert_eq!(cli.time_rate, 1.);
    }

    #[test]
    fn validate_takes_its_own_config() {
        let cli = Cli::try_parse_from(["caret-trail", "validate", "-c", "a.toml"]).unwrap();
        match cli.subcommand {
            Some(Sub::Validate { config }) => assert_eq!(config, Some(PathBuf::from("a.toml"))),
            _ => panic!("expected validate"),
        }
    }

    #[test]
    fn args_conflict_with_subcommands() {
        assert!(Cli::try_parse_from(["caret-trail", "--frames", "3", "validate"]).is_err());
    }
}

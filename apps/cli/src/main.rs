//! # Calibur CLI
//!
//! 瞄准云台命令行工具。
//!
//! ```bash
//! # 打印默认配置
//! calibur config > turret.toml
//!
//! # 启动流水线（Ctrl-C 退出）
//! calibur run --config turret.toml --device /dev/ttyUSB0
//!
//! # 不接硬件，只打印要发送的指令
//! calibur run --dry-run
//!
//! # 写入实测弹速（m/s）
//! calibur run --dry-run --bullet-speed 27.5
//!
//! # 串口联调：扫描 yaw/pitch 并周期性切换开火标志
//! calibur send-test --device /dev/ttyUSB0 --count 20
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;

use commands::{ConfigCommand, RunCommand, SendTestCommand};

/// Calibur CLI - 瞄准云台命令行工具
#[derive(Parser, Debug)]
#[command(name = "calibur")]
#[command(about = "Command-line interface for the Calibur aiming turret", long_about = None)]
#[command(version)]
struct Cli {
    /// 日志目录（按天滚动写入文件，同时保留终端输出）
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 启动瞄准流水线
    Run {
        #[command(flatten)]
        args: RunCommand,
    },

    /// 串口联调：周期性发送扫描指令
    SendTest {
        #[command(flatten)]
        args: SendTestCommand,
    },

    /// 打印配置
    Config {
        #[command(flatten)]
        args: ConfigCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // guard 必须活到进程结束，否则文件日志会丢失尾部
    let _guard = logging::init(cli.log_dir.as_deref())?;

    match cli.command {
        Commands::Run { args } => args.execute(),
        Commands::SendTest { args } => args.execute(),
        Commands::Config { args } => args.execute(),
    }
}

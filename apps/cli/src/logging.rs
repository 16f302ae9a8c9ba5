//! 日志初始化
//!
//! 终端输出始终开启；指定目录时额外按天滚动写入 `calibur.log.YYYY-MM-DD`。

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn env_filter() -> Result<EnvFilter> {
    // 前缀匹配，同时覆盖 calibur_driver / calibur_serial 等 crate
    Ok(EnvFilter::from_default_env().add_directive("calibur=info".parse()?))
}

/// 安装全局 subscriber，返回文件写入线程的 guard（没有文件日志时为 `None`）
pub fn init(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let stdout = tracing_subscriber::fmt::layer();

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "calibur.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);

            tracing_subscriber::registry()
                .with(env_filter()?)
                .with(stdout)
                .with(file)
                .try_init()
                .context("Failed to install log subscriber")?;
            Ok(Some(guard))
        },
        None => {
            tracing_subscriber::registry()
                .with(env_filter()?)
                .with(stdout)
                .try_init()
                .context("Failed to install log subscriber")?;
            Ok(None)
        },
    }
}

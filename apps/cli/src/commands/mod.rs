//! 命令定义和实现

pub mod config;
pub mod run;
pub mod send_test;

pub use config::ConfigCommand;
pub use run::RunCommand;
pub use send_test::SendTestCommand;

use anyhow::Result;
use calibur_serial::{BaudRate, DryRunAdapter, SerialAdapter};
use tracing::info;

/// 打开串口链路；`dry_run` 时返回只打印日志的链路
pub fn open_link(device: &str, baud: u32, dry_run: bool) -> Result<Box<dyn SerialAdapter>> {
    if dry_run {
        info!("Dry run: packets are logged instead of sent");
        return Ok(Box::new(DryRunAdapter::new()));
    }

    let baud = BaudRate::from_u32_or_default(baud);
    open_tty(device, baud)
}

#[cfg(target_os = "linux")]
fn open_tty(device: &str, baud: BaudRate) -> Result<Box<dyn SerialAdapter>> {
    use anyhow::Context;
    use calibur_serial::TtySerialAdapter;

    let link = TtySerialAdapter::open(device, baud)
        .with_context(|| format!("Failed to open serial device {}", device))?;
    info!("Serial device {} opened at {} baud", device, baud);
    Ok(Box::new(link))
}

#[cfg(not(target_os = "linux"))]
fn open_tty(_device: &str, _baud: BaudRate) -> Result<Box<dyn SerialAdapter>> {
    Err(calibur_serial::SerialError::UnsupportedPlatform.into())
}

//! 串口联调命令
//!
//! 每个周期 yaw +1°（超过 360° 回到 0）、pitch +0.5°（超过 90° 回到 -90°），
//! 每 5 个包切换一次开火标志。

use super::open_link;
use anyhow::{Context, Result};
use calibur_protocol::AimPacket;
use clap::Args;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info};

/// 联调命令参数
#[derive(Args, Debug)]
pub struct SendTestCommand {
    /// 串口设备
    #[arg(short, long, default_value = "/dev/ttyUSB0")]
    pub device: String,

    /// 波特率
    #[arg(short, long, default_value_t = 115_200)]
    pub baud: u32,

    /// 发送间隔（毫秒）
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,

    /// 发送数量（不指定时一直发送直到 Ctrl-C）
    #[arg(long)]
    pub count: Option<u64>,

    /// 不打开串口，只记录
    #[arg(long)]
    pub dry_run: bool,
}

/// 扫描指令序列
#[derive(Debug, Clone, Default)]
pub struct Sweep {
    yaw: f32,
    pitch: f32,
    fire: bool,
    counter: u64,
}

impl Iterator for Sweep {
    type Item = AimPacket;

    fn next(&mut self) -> Option<AimPacket> {
        self.yaw += 1.0;
        self.pitch += 0.5;
        if self.yaw > 360.0 {
            self.yaw = 0.0;
        }
        if self.pitch > 90.0 {
            self.pitch = -90.0;
        }

        self.counter += 1;
        if self.counter % 5 == 0 {
            self.fire = !self.fire;
        }
        Some(AimPacket::new(self.yaw, self.pitch, self.fire))
    }
}

impl SendTestCommand {
    pub fn execute(&self) -> Result<()> {
        info!("=== Serial send test (yaw, pitch, fire) ===");
        let mut link = open_link(&self.device, self.baud, self.dry_run)?;

        let running = Arc::new(AtomicBool::new(true));
        let r = running.clone();
        ctrlc::set_handler(move || {
            r.store(false, Ordering::SeqCst);
        })
        .context("Failed to set Ctrl-C handler")?;

        let interval = Duration::from_millis(self.interval_ms);
        let limit = self.count.unwrap_or(u64::MAX);
        let mut sent = 0u64;
        let mut failed = 0u64;

        for packet in Sweep::default().take(limit as usize) {
            if !running.load(Ordering::SeqCst) {
                break;
            }
            if link.send_aim(&packet) {
                sent += 1;
                info!(
                    "Sent: yaw={}, pitch={}, fire={}",
                    packet.yaw,
                    packet.pitch,
                    if packet.fire { "TRUE" } else { "FALSE" }
                );
            } else {
                failed += 1;
                error!("Failed to send data");
            }
            sleep_while_running(&running, interval);
        }

        println!("Sent {} packets, {} failed", sent, failed);
        Ok(())
    }
}

/// 分段睡眠，Ctrl-C 后尽快返回
fn sleep_while_running(running: &AtomicBool, interval: Duration) {
    let step = Duration::from_millis(50);
    let mut remaining = interval;
    while !remaining.is_zero() && running.load(Ordering::SeqCst) {
        let chunk = remaining.min(step);
        std::thread::sleep(chunk);
        remaining -= chunk;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_first_packets() {
        let packets: Vec<_> = Sweep::default().take(5).collect();
        assert_eq!(packets[0], AimPacket::new(1.0, 0.5, false));
        assert_eq!(packets[3], AimPacket::new(4.0, 2.0, false));
        // 第 5 个包切换开火
        assert_eq!(packets[4], AimPacket::new(5.0, 2.5, true));
    }

    #[test]
    fn test_sweep_fire_toggles_every_five() {
        let fire: Vec<bool> = Sweep::default().take(15).map(|p| p.fire).collect();
        assert!(fire[..4].iter().all(|&f| !f));
        assert!(fire[4..9].iter().all(|&f| f));
        assert!(fire[9..14].iter().all(|&f| !f));
        assert!(fire[14]);
    }

    #[test]
    fn test_sweep_wraps() {
        let packets: Vec<_> = Sweep::default().take(400).collect();
        // pitch: 第 181 个包超过 90° 回到 -90°
        assert_eq!(packets[179].pitch, 90.0);
        assert_eq!(packets[180].pitch, -90.0);
        // yaw: 第 361 个包超过 360° 回到 0
        assert_eq!(packets[359].yaw, 360.0);
        assert_eq!(packets[360].yaw, 0.0);
        assert!(packets.iter().all(|p| (0.0..=360.0).contains(&p.yaw)));
    }
}

//! 运行命令
//!
//! 用桩相机、桩 IMU、空检测模型和粒子滤波器启动整条流水线，Ctrl-C 退出后打印指标。

use super::open_link;
use anyhow::{Context, Result};
use calibur_driver::{MetricsSnapshot, StubCamera, StubImu, Turret, TurretBuilder};
use calibur_tools::TurretConfig;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

/// 状态日志间隔
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

/// 运行命令参数
#[derive(Args, Debug)]
pub struct RunCommand {
    /// 配置文件（TOML）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 串口设备（覆盖配置）
    #[arg(short, long)]
    pub device: Option<String>,

    /// 波特率（覆盖配置）
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// 不打开串口，只记录要发送的指令
    #[arg(long)]
    pub dry_run: bool,

    /// 实测弹速（m/s），写入共享状态供瞄准线程滤波
    #[arg(long, value_name = "M_PER_S")]
    pub bullet_speed: Option<f32>,
}

impl RunCommand {
    /// 合并配置文件与命令行参数（命令行优先）
    pub fn resolve_config(&self) -> Result<TurretConfig> {
        let mut config = match &self.config {
            Some(path) => TurretConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => TurretConfig::default(),
        };
        if let Some(device) = &self.device {
            config.serial.device = device.clone();
        }
        if let Some(baud) = self.baud {
            config.serial.baud = baud;
        }
        config.validate()?;
        if let Some(speed) = self.bullet_speed {
            anyhow::ensure!(
                speed.is_finite() && speed > 0.0,
                "--bullet-speed must be a positive number of m/s, got {}",
                speed
            );
        }
        Ok(config)
    }

    /// 把操作员给定的弹速写入流水线
    pub fn apply_bullet_speed(&self, turret: &Turret) {
        if let Some(speed) = self.bullet_speed {
            turret.set_bullet_speed(speed);
            info!("Measured bullet speed set to {:.2} m/s", speed);
        }
    }

    pub fn execute(&self) -> Result<()> {
        let config = self.resolve_config()?;
        let link = open_link(&config.serial.device, config.serial.baud, self.dry_run)?;

        let running = Arc::new(AtomicBool::new(true));
        let r = running.clone();
        ctrlc::set_handler(move || {
            r.store(false, Ordering::SeqCst);
        })
        .context("Failed to set Ctrl-C handler")?;

        let mut turret = TurretBuilder::new()
            .config(config)
            .camera(StubCamera::default())
            .imu(StubImu::default())
            .serial_link(link)
            .build()?;
        self.apply_bullet_speed(&turret);

        info!("Running, press Ctrl-C to stop");
        let started = Instant::now();
        let mut last_status = Instant::now();
        while running.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(100));
            if last_status.elapsed() >= STATUS_INTERVAL {
                last_status = Instant::now();
                let m = turret.metrics();
                info!(
                    "frames={} states={} aims={} sent={} failed={}",
                    m.frames_captured,
                    m.robot_states_published,
                    m.aim_updates,
                    m.packets_sent,
                    m.send_failures
                );
            }
        }

        info!("Stopping...");
        turret.stop();
        print_summary(&turret.metrics(), started.elapsed());
        Ok(())
    }
}

fn print_summary(m: &MetricsSnapshot, elapsed: Duration) {
    println!("=== Pipeline summary ({:.1}s) ===", elapsed.as_secs_f64());
    println!("  frames captured      : {}", m.frames_captured);
    println!("  orientation updates  : {}", m.orientation_updates);
    println!("  device errors        : {}", m.device_errors);
    println!("  perception cycles    : {}", m.perception_cycles);
    println!(
        "  targets acquired/lost: {}/{}",
        m.targets_acquired, m.targets_lost
    );
    println!("  robot states         : {}", m.robot_states_published);
    println!(
        "  estimator ticks      : {} ({} measurements)",
        m.estimator_ticks, m.estimator_measurements
    );
    println!(
        "  aim updates          : {} ({:.1}% not converged)",
        m.aim_updates,
        m.non_convergence_rate()
    );
    println!(
        "  packets sent/failed  : {}/{} ({:.1}% success)",
        m.packets_sent,
        m.send_failures,
        m.send_success_rate()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> RunCommand {
        RunCommand {
            config: None,
            device: None,
            baud: None,
            dry_run: true,
            bullet_speed: None,
        }
    }

    #[test]
    fn test_defaults_without_overrides() {
        let config = command().resolve_config().unwrap();
        assert_eq!(config, TurretConfig::default());
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("turret.toml");
        std::fs::write(&path, "[serial]\ndevice = \"/dev/ttyACM0\"\nbaud = 460800\n").unwrap();

        let cmd = RunCommand {
            config: Some(path),
            baud: Some(921_600),
            ..command()
        };
        let config = cmd.resolve_config().unwrap();
        assert_eq!(config.serial.device, "/dev/ttyACM0");
        assert_eq!(config.serial.baud, 921_600);
    }

    #[test]
    fn test_rejects_non_positive_bullet_speed() {
        for speed in [0.0, -5.0, f32::NAN] {
            let cmd = RunCommand {
                bullet_speed: Some(speed),
                ..command()
            };
            assert!(cmd.resolve_config().is_err());
        }
    }

    #[test]
    fn test_bullet_speed_reaches_pipeline() {
        let cmd = RunCommand {
            bullet_speed: Some(27.5),
            ..command()
        };
        cmd.resolve_config().unwrap();

        let turret = TurretBuilder::new()
            .camera(StubCamera::default())
            .imu(StubImu::default())
            .build()
            .unwrap();
        assert_eq!(turret.hub().scalars.bullet_speed(), 0.0);
        cmd.apply_bullet_speed(&turret);
        assert_eq!(turret.hub().scalars.bullet_speed(), 27.5);
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let cmd = RunCommand {
            config: Some(PathBuf::from("/nonexistent/turret.toml")),
            ..command()
        };
        assert!(cmd.resolve_config().is_err());
    }
}

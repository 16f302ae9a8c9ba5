//! # 配置文件
//!
//! 整个流水线的 TOML 配置。每个段都带 `#[serde(default)]`，
//! 因此配置文件只需写出需要覆盖的字段。
//!
//! ```toml
//! [tracker]
//! ttl_s = 0.5
//!
//! [serial]
//! device = "/dev/ttyACM0"
//! baud = 921600
//! ```

use crate::safety::GimbalLimits;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 顶层配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurretConfig {
    pub pipeline: PipelineConfig,
    pub tracker: TrackerConfig,
    pub estimator: EstimatorConfig,
    pub aim: AimConfig,
    pub gimbal: GimbalLimits,
    pub serial: SerialConfig,
}

/// 工作线程调度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 无新数据时的退避时间（µs）
    pub poll_backoff_us: u64,
    /// 停止时等待单个线程退出的超时（ms）
    pub join_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_backoff_us: 1000,
            join_timeout_ms: 2000,
        }
    }
}

/// 目标选择与跟踪
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// 目标丢失后的保持时间（s）
    pub ttl_s: f64,
    /// 初次观测时使用的装甲板旋转半径（m）
    pub default_radius: f32,
    /// 低于该置信度的检测被丢弃
    pub min_confidence: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            ttl_s: 1.0,
            default_radius: 0.25,
            min_confidence: 0.5,
        }
    }
}

/// 状态估计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// 估计周期（ms）
    pub period_ms: u64,
    /// 粒子数
    pub particle_count: usize,
    /// 随机种子（`None` 使用系统熵）
    pub seed: Option<u64>,
    /// 位置观测噪声标准差（m）
    pub position_noise: f32,
    /// yaw 观测噪声标准差（rad）
    pub yaw_noise: f32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            period_ms: 10,
            particle_count: 512,
            seed: None,
            position_noise: 0.05,
            yaw_noise: 0.1,
        }
    }
}

/// 弹道预测与开火判定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AimConfig {
    /// 未收到弹速测量前使用的弹速（m/s）
    pub initial_bullet_speed: f32,
    /// 处理延迟初值（s）
    pub initial_processing_time_s: f32,
    /// 弹速低通系数
    pub speed_alpha: f32,
    /// 处理延迟低通系数
    pub latency_alpha: f32,
    /// 云台执行延迟（s）
    pub actuation_latency_s: f32,
    /// 提前量迭代收敛阈值（s）
    pub convergence_threshold_s: f32,
    /// 提前量最大迭代次数
    pub max_iterations: u32,
    /// 重力加速度（m/s²）
    pub gravity: f32,
    /// 超过该距离（m）时请求追击
    pub chase_distance_m: f32,
    pub fire_yaw_tolerance_rad: f32,
    pub fire_pitch_tolerance_rad: f32,
}

impl Default for AimConfig {
    fn default() -> Self {
        Self {
            initial_bullet_speed: 20.0,
            initial_processing_time_s: 0.05,
            speed_alpha: 0.1,
            latency_alpha: 0.1,
            actuation_latency_s: 0.1,
            convergence_threshold_s: 0.01,
            max_iterations: 10,
            gravity: 9.81,
            chase_distance_m: 6.0,
            // 0.13 * 1.0 * 0.5
            fire_yaw_tolerance_rad: 0.065,
            fire_pitch_tolerance_rad: 0.065,
        }
    }
}

/// 下位机串口
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub device: String,
    pub baud: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud: 115_200,
        }
    }
}

impl TurretConfig {
    /// 从文件加载并校验配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// 从 TOML 字符串解析并校验配置
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: TurretConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// 校验参数范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(msg: impl Into<String>) -> Result<(), ConfigError> {
            Err(ConfigError::Invalid(msg.into()))
        }
        fn is_alpha(a: f32) -> bool {
            a > 0.0 && a <= 1.0
        }

        if !(self.tracker.ttl_s > 0.0) {
            return invalid(format!("tracker.ttl_s must be > 0, got {}", self.tracker.ttl_s));
        }
        if !(self.tracker.default_radius > 0.0) {
            return invalid("tracker.default_radius must be > 0");
        }
        if self.estimator.period_ms == 0 {
            return invalid("estimator.period_ms must be > 0");
        }
        if self.estimator.particle_count == 0 {
            return invalid("estimator.particle_count must be > 0");
        }
        if !(self.aim.initial_bullet_speed > 0.0) {
            return invalid("aim.initial_bullet_speed must be > 0");
        }
        if self.aim.max_iterations == 0 {
            return invalid("aim.max_iterations must be > 0");
        }
        if !(self.aim.convergence_threshold_s > 0.0) {
            return invalid("aim.convergence_threshold_s must be > 0");
        }
        if !is_alpha(self.aim.speed_alpha) || !is_alpha(self.aim.latency_alpha) {
            return invalid("aim.speed_alpha and aim.latency_alpha must be in (0, 1]");
        }
        if !(self.gimbal.pitch_min < self.gimbal.pitch_max) {
            return invalid(format!(
                "gimbal.pitch_min ({}) must be below gimbal.pitch_max ({})",
                self.gimbal.pitch_min, self.gimbal.pitch_max
            ));
        }
        if !(self.gimbal.yaw_min < self.gimbal.yaw_max) {
            return invalid(format!(
                "gimbal.yaw_min ({}) must be below gimbal.yaw_max ({})",
                self.gimbal.yaw_min, self.gimbal.yaw_max
            ));
        }
        if !self.gimbal.is_valid() {
            return invalid(format!(
                "gimbal limits are not finite or leave no room inside safety_margin ({})",
                self.gimbal.safety_margin
            ));
        }
        if self.serial.device.is_empty() {
            return invalid("serial.device must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = TurretConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.poll_backoff_us, 1000);
        assert_eq!(config.estimator.period_ms, 10);
        assert_eq!(config.aim.max_iterations, 10);
        assert_eq!(config.serial.baud, 115_200);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = TurretConfig::from_toml_str(
            r#"
[tracker]
ttl_s = 0.5

[serial]
device = "/dev/ttyACM0"
"#,
        )
        .unwrap();

        assert_eq!(config.tracker.ttl_s, 0.5);
        assert_eq!(config.tracker.default_radius, 0.25);
        assert_eq!(config.serial.device, "/dev/ttyACM0");
        assert_eq!(config.serial.baud, 115_200);
        assert_eq!(config.aim, AimConfig::default());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = TurretConfig::from_toml_str("").unwrap();
        assert_eq!(config, TurretConfig::default());
    }

    #[test]
    fn test_toml_string_roundtrip() {
        let mut config = TurretConfig::default();
        config.estimator.seed = Some(42);
        config.gimbal.yaw_limited = true;

        let text = config.to_toml_string().unwrap();
        let parsed = TurretConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let cases = [
            "[tracker]\nttl_s = 0.0",
            "[estimator]\nparticle_count = 0",
            "[estimator]\nperiod_ms = 0",
            "[aim]\nmax_iterations = 0",
            "[aim]\nspeed_alpha = 1.5",
            "[aim]\ninitial_bullet_speed = -1.0",
            "[gimbal]\npitch_min = 1.0\npitch_max = 0.5",
            "[gimbal]\nyaw_min = 1.0\nyaw_max = -1.0",
            "[gimbal]\nsafety_margin = -0.1",
            "[gimbal]\npitch_min = 0.0\npitch_max = 0.05\nsafety_margin = 0.05",
        ];
        for case in cases {
            let result = TurretConfig::from_toml_str(case);
            assert!(
                matches!(result, Err(ConfigError::Invalid(_))),
                "expected Invalid for {case:?}, got {result:?}"
            );
        }
    }

    #[test]
    fn test_rejects_non_finite_gimbal_limits() {
        for case in [
            "[gimbal]\npitch_min = nan",
            "[gimbal]\npitch_max = inf",
            "[gimbal]\nyaw_min = -inf",
            "[gimbal]\nsafety_margin = nan",
        ] {
            let result = TurretConfig::from_toml_str(case);
            assert!(
                matches!(result, Err(ConfigError::Invalid(_))),
                "expected Invalid for {case:?}, got {result:?}"
            );
        }

        let mut config = TurretConfig::default();
        config.gimbal.pitch_min = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_error() {
        let result = TurretConfig::from_toml_str("[tracker\nttl_s = ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[aim]\ngravity = 9.8\nchase_distance_m = 4.0").unwrap();

        let config = TurretConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.aim.gravity, 9.8);
        assert_eq!(config.aim.chase_distance_m, 4.0);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibur.toml");

        let mut config = TurretConfig::default();
        config.pipeline.join_timeout_ms = 500;
        config.save_to_file(&path).unwrap();

        let loaded = TurretConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.pipeline.join_timeout_ms, 500);
    }

    #[test]
    fn test_missing_file() {
        let result = TurretConfig::load_from_file("/nonexistent/calibur.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}

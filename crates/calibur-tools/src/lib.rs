//! # Calibur Tools - 共享配置与安全限制
//!
//! **依赖原则**: 不依赖 `calibur-driver`，避免引入线程与硬件依赖
//!
//! ## 包含模块
//!
//! - `config` - TOML 配置文件（流水线、跟踪、滤波、瞄准、云台、串口）
//! - `safety` - 云台软件限位（只读结构）
//!
//! ## 使用示例
//!
//! ```no_run
//! use calibur_tools::TurretConfig;
//!
//! let config = TurretConfig::load_from_file("calibur.toml").unwrap();
//! assert!(config.tracker.ttl_s > 0.0);
//! ```

pub mod config;
pub mod safety;

// 重新导出常用类型
pub use config::{
    AimConfig, ConfigError, EstimatorConfig, PipelineConfig, SerialConfig, TrackerConfig,
    TurretConfig,
};
pub use safety::GimbalLimits;

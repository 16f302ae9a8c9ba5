//! 驱动层模块
//!
//! 本模块提供瞄准云台的实时流水线，包括：
//! - 工作线程管理（采集、姿态、感知、估计、瞄准、发送各一个线程）
//! - 共享状态中心（ArcSwap 无锁读取，带版本号的最新值槽位）
//! - 目标选择与装甲板融合
//! - 状态估计（粒子滤波）
//! - 弹道预测与开火判定
//!
//! # 使用场景
//!
//! 相机、IMU、检测模型、滤波器与串口链路都以 trait 注入，
//! 因此整条流水线可以在没有硬件的情况下用桩实现运行。

pub mod aim;
mod builder;
pub mod devices;
mod error;
pub mod estimation;
pub mod geometry;
pub mod hub;
pub mod metrics;
pub mod perception;
pub mod pipeline;
pub mod state;
pub mod transmit;
mod turret;

pub use aim::{AimSolver, AimWorker, LeadSolution};
pub use builder::TurretBuilder;
pub use devices::{Camera, Imu, StubCamera, StubImu};
pub use error::{DeviceError, DriverError};
pub use estimation::{EstimationWorker, FilterEngine, ParticleFilter};
pub use hub::{SharedHub, SharedScalars, Slot, SlotReader, Versioned};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use perception::{
    ArmorGroup, NullPerception, PerceptionEngine, PerceptionWorker, RobotFuser, TargetSelector,
    TrackEvent,
};
pub use pipeline::WorkerContext;
pub use state::*;
pub use transmit::TransmitWorker;
pub use turret::Turret;

//! Builder 模式实现
//!
//! 提供链式构造 [`Turret`] 的便捷方式。

use crate::aim::AimWorker;
use crate::devices::{Camera, Imu};
use crate::error::DriverError;
use crate::estimation::{EstimationWorker, FilterEngine, ParticleFilter};
use crate::hub::SharedHub;
use crate::metrics::PipelineMetrics;
use crate::perception::{NullPerception, PerceptionEngine, PerceptionWorker};
use crate::pipeline::{self, WorkerContext};
use crate::transmit::TransmitWorker;
use crate::turret::Turret;
use calibur_serial::SerialAdapter;
use calibur_tools::TurretConfig;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::Duration;
use tracing::info;

/// Turret Builder（链式构造）
///
/// 相机与 IMU 必须提供；检测模型默认 [`NullPerception`]，滤波器默认 [`ParticleFilter`]；
/// 不提供串口链路时不启动发送线程。
///
/// # Example
///
/// ```no_run
/// use calibur_driver::{StubCamera, StubImu, TurretBuilder};
/// use calibur_serial::DryRunAdapter;
///
/// let turret = TurretBuilder::new()
///     .camera(StubCamera::default())
///     .imu(StubImu::default())
///     .serial_link(DryRunAdapter::new())
///     .build()
///     .unwrap();
/// ```
pub struct TurretBuilder {
    config: TurretConfig,
    camera: Option<Box<dyn Camera>>,
    imu: Option<Box<dyn Imu>>,
    perception: Option<Box<dyn PerceptionEngine>>,
    filter: Option<Box<dyn FilterEngine>>,
    link: Option<Box<dyn SerialAdapter>>,
}

impl Default for TurretBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TurretBuilder {
    pub fn new() -> Self {
        Self {
            config: TurretConfig::default(),
            camera: None,
            imu: None,
            perception: None,
            filter: None,
            link: None,
        }
    }

    /// 设置完整配置（可选，默认 [`TurretConfig::default`]）
    pub fn config(mut self, config: TurretConfig) -> Self {
        self.config = config;
        self
    }

    pub fn camera(mut self, camera: impl Camera + 'static) -> Self {
        self.camera = Some(Box::new(camera));
        self
    }

    pub fn imu(mut self, imu: impl Imu + 'static) -> Self {
        self.imu = Some(Box::new(imu));
        self
    }

    pub fn perception(mut self, engine: impl PerceptionEngine + 'static) -> Self {
        self.perception = Some(Box::new(engine));
        self
    }

    pub fn filter_engine(mut self, engine: impl FilterEngine + 'static) -> Self {
        self.filter = Some(Box::new(engine));
        self
    }

    pub fn serial_link(mut self, link: impl SerialAdapter + 'static) -> Self {
        self.link = Some(Box::new(link));
        self
    }

    /// 初始化估计器并启动所有工作线程
    ///
    /// # 错误
    /// - `MissingComponent`: 没有提供相机或 IMU
    /// - `Config`: 配置校验失败
    /// - `EstimatorInit`: 估计器初始化失败（此时不会启动任何线程）
    /// - `ThreadSpawn`: 创建线程失败（已启动的线程会被回收）
    pub fn build(self) -> Result<Turret, DriverError> {
        let config = self.config;
        config.validate()?;

        let camera = self.camera.ok_or(DriverError::MissingComponent("camera"))?;
        let imu = self.imu.ok_or(DriverError::MissingComponent("imu"))?;
        let perception = self
            .perception
            .unwrap_or_else(|| Box::new(NullPerception));
        let mut filter = self
            .filter
            .unwrap_or_else(|| Box::new(ParticleFilter::new(&config.estimator)));

        filter.init(config.estimator.particle_count)?;

        let hub = Arc::new(SharedHub::new());
        let metrics = Arc::new(PipelineMetrics::new());
        let is_running = Arc::new(AtomicBool::new(true));
        let ctx = WorkerContext::new(
            hub.clone(),
            metrics.clone(),
            is_running.clone(),
            Duration::from_micros(config.pipeline.poll_backoff_us),
        );

        // 出错返回时 Drop 会回收已启动的线程
        let mut turret = Turret::new(
            hub,
            metrics.clone(),
            is_running,
            Duration::from_millis(config.pipeline.join_timeout_ms),
        );

        let c = ctx.clone();
        turret.attach(
            "Capture",
            spawn_worker("Capture", move || pipeline::capture_loop(camera, c))?,
        );

        let c = ctx.clone();
        turret.attach(
            "Orientation",
            spawn_worker("Orientation", move || pipeline::orientation_loop(imu, c))?,
        );

        let worker = PerceptionWorker::new(perception, &config.tracker, metrics.clone());
        let c = ctx.clone();
        turret.attach(
            "Perception",
            spawn_worker("Perception", move || pipeline::perception_loop(worker, c))?,
        );

        let worker = EstimationWorker::new(filter, metrics.clone());
        let period = Duration::from_millis(config.estimator.period_ms);
        let c = ctx.clone();
        turret.attach(
            "Estimation",
            spawn_worker("Estimation", move || {
                pipeline::estimation_loop(worker, c, period)
            })?,
        );

        let worker = AimWorker::new(config.aim.clone(), metrics.clone());
        let c = ctx.clone();
        turret.attach(
            "Aim",
            spawn_worker("Aim", move || pipeline::aim_loop(worker, c))?,
        );

        if let Some(link) = self.link {
            let worker = TransmitWorker::new(link, config.gimbal, metrics);
            turret.attach(
                "Transmit",
                spawn_worker("Transmit", move || pipeline::transmit_loop(worker, ctx))?,
            );
        }

        info!(
            "Turret pipeline started with threads: {:?}",
            turret.thread_names()
        );
        Ok(turret)
    }
}

fn spawn_worker<F>(name: &'static str, f: F) -> Result<thread::JoinHandle<()>, DriverError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(format!("calibur-{}", name.to_lowercase()))
        .spawn(f)
        .map_err(|e| DriverError::ThreadSpawn(format!("{}: {}", name, e)))
}

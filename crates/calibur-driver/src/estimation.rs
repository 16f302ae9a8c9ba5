//! 状态估计阶段
//!
//! 估计线程以固定的绝对周期运行，每个周期最多消费一个原始观测（最新者胜出），
//! 驱动 [`FilterEngine`] 并发布平滑后的机器人状态。

use crate::error::DriverError;
use crate::geometry::{angular_distance, circular_mean, wrap_pi};
use crate::hub::{SharedHub, SlotReader};
use crate::metrics::PipelineMetrics;
use crate::state::{RobotId, RobotState, StateVector, index};
use calibur_tools::EstimatorConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::{debug, info, trace};

/// 滤波器引擎
///
/// 内部表示不对外暴露，可以是 CPU 粒子滤波，也可以驻留在 GPU 上。
pub trait FilterEngine: Send {
    /// 分配资源。失败是致命错误
    fn init(&mut self, particle_count: usize) -> Result<(), DriverError>;

    /// 以观测为中心重新初始化
    fn reset_from_measurement(&mut self, measurement: &RobotState);

    /// 仅预测
    fn predict(&mut self, dt: f32);

    /// 预测并用观测更新
    fn step(&mut self, measurement: &RobotState, dt: f32);

    /// 当前均值状态（尚未收到过观测时为 `None`）
    fn mean_state(&self) -> Option<RobotState>;
}

impl<T: FilterEngine + ?Sized> FilterEngine for Box<T> {
    fn init(&mut self, particle_count: usize) -> Result<(), DriverError> {
        (**self).init(particle_count)
    }

    fn reset_from_measurement(&mut self, measurement: &RobotState) {
        (**self).reset_from_measurement(measurement)
    }

    fn predict(&mut self, dt: f32) {
        (**self).predict(dt)
    }

    fn step(&mut self, measurement: &RobotState, dt: f32) {
        (**self).step(measurement, dt)
    }

    fn mean_state(&self) -> Option<RobotState> {
        (**self).mean_state()
    }
}

/// 初始速度散布（m/s）
const INITIAL_VELOCITY_SPREAD: f32 = 0.5;
/// 初始 yaw 角速度散布（rad/s）
const INITIAL_YAW_RATE_SPREAD: f32 = 1.0;
/// 加速度过程噪声（m/s² / √s）
const ACCEL_PROCESS_NOISE: f32 = 4.0;
/// yaw 角加速度过程噪声（rad/s² / √s）
const YAW_ACCEL_PROCESS_NOISE: f32 = 8.0;
/// 半径观测噪声（m）
const RADIUS_NOISE: f32 = 0.05;
const MIN_RADIUS: f32 = 0.05;
const MAX_RADIUS: f32 = 0.6;
/// 最优粒子的对数权重低于该值时视为滤波发散
const DEGENERATE_LOG_WEIGHT: f32 = -200.0;

/// 标准正态采样（Box–Muller）
fn gaussian(rng: &mut StdRng, sigma: f32) -> f32 {
    let u1: f32 = rng.r#gen::<f32>().max(f32::MIN_POSITIVE);
    let u2: f32 = rng.r#gen::<f32>();
    sigma * (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

/// CPU 粒子滤波器
///
/// - 15 维粒子，匀加速 + 匀角加速过程模型，高斯过程噪声
/// - 位置 / yaw / 半径高斯似然
/// - 有效粒子数 ESS < N/2 时系统重采样
/// - 线性分量取加权均值，yaw 取加权圆周均值
#[derive(Debug)]
pub struct ParticleFilter {
    particles: Vec<StateVector>,
    weights: Vec<f32>,
    scratch: Vec<StateVector>,
    rng: StdRng,
    position_noise: f32,
    yaw_noise: f32,
    robot_id: Option<RobotId>,
}

impl ParticleFilter {
    pub fn new(config: &EstimatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            particles: Vec::new(),
            weights: Vec::new(),
            scratch: Vec::new(),
            rng,
            position_noise: config.position_noise,
            yaw_noise: config.yaw_noise,
            robot_id: None,
        }
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// 有效粒子数
    pub fn effective_sample_size(&self) -> f32 {
        let sum_sq: f32 = self.weights.iter().map(|w| w * w).sum();
        if sum_sq > 0.0 { 1.0 / sum_sq } else { 0.0 }
    }

    fn is_initialized(&self) -> bool {
        self.robot_id.is_some()
    }

    fn propagate(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let sqrt_dt = dt.sqrt();
        let half_dt2 = 0.5 * dt * dt;
        for p in self.particles.iter_mut() {
            for axis in 0..3 {
                let pos = index::POSITION + axis;
                let vel = index::VELOCITY + axis;
                let acc = index::ACCELERATION + axis;
                p[pos] += p[vel] * dt + p[acc] * half_dt2;
                p[vel] += p[acc] * dt;
                p[acc] += gaussian(&mut self.rng, ACCEL_PROCESS_NOISE * sqrt_dt);
            }
            p[index::YAW] = wrap_pi(
                p[index::YAW] + p[index::YAW_RATE] * dt + p[index::YAW_ACCEL] * half_dt2,
            );
            p[index::YAW_RATE] += p[index::YAW_ACCEL] * dt;
            p[index::YAW_ACCEL] += gaussian(&mut self.rng, YAW_ACCEL_PROCESS_NOISE * sqrt_dt);
        }
    }

    fn update(&mut self, measurement: &RobotState) {
        let inv_pos = 1.0 / (self.position_noise * self.position_noise).max(f32::EPSILON);
        let inv_yaw = 1.0 / (self.yaw_noise * self.yaw_noise).max(f32::EPSILON);
        let inv_r = 1.0 / (RADIUS_NOISE * RADIUS_NOISE);

        let mut log_w: Vec<f32> = self
            .particles
            .iter()
            .zip(&self.weights)
            .map(|(p, &w)| {
                let dp = p.fixed_rows::<3>(index::POSITION) - measurement.position;
                let dyaw = angular_distance(p[index::YAW], measurement.yaw);
                let dr1 = p[index::R1] - measurement.r1;
                let dr2 = p[index::R2] - measurement.r2;
                let nll = 0.5
                    * (dp.norm_squared() * inv_pos
                        + dyaw * dyaw * inv_yaw
                        + (dr1 * dr1 + dr2 * dr2) * inv_r);
                w.max(f32::MIN_POSITIVE).ln() - nll
            })
            .collect();

        let max = log_w.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if !(max > DEGENERATE_LOG_WEIGHT) {
            // 所有粒子都远离观测，重新围绕观测初始化
            debug!("Particle weights degenerated, resetting around measurement");
            self.reset_from_measurement(measurement);
            return;
        }

        let mut total = 0.0f32;
        for lw in log_w.iter_mut() {
            *lw = (*lw - max).exp();
            total += *lw;
        }

        if !total.is_finite() || total <= 0.0 {
            self.reset_from_measurement(measurement);
            return;
        }
        for (w, lw) in self.weights.iter_mut().zip(log_w) {
            *w = lw / total;
        }

        if self.effective_sample_size() < self.particles.len() as f32 * 0.5 {
            self.resample();
        }
    }

    /// 系统重采样
    fn resample(&mut self) {
        let n = self.particles.len();
        if n == 0 {
            return;
        }
        let step = 1.0 / n as f32;
        let mut u = self.rng.r#gen::<f32>() * step;
        let mut cumulative = self.weights[0];
        let mut i = 0;

        self.scratch.clear();
        for _ in 0..n {
            while u > cumulative && i + 1 < n {
                i += 1;
                cumulative += self.weights[i];
            }
            self.scratch.push(self.particles[i]);
            u += step;
        }
        std::mem::swap(&mut self.particles, &mut self.scratch);
        self.weights.iter_mut().for_each(|w| *w = step);
        trace!("Resampled {} particles", n);
    }
}

impl FilterEngine for ParticleFilter {
    fn init(&mut self, particle_count: usize) -> Result<(), DriverError> {
        if particle_count == 0 {
            return Err(DriverError::EstimatorInit(
                "particle count must be greater than zero".to_string(),
            ));
        }
        self.particles = vec![StateVector::zeros(); particle_count];
        self.weights = vec![1.0 / particle_count as f32; particle_count];
        self.scratch = Vec::with_capacity(particle_count);
        self.robot_id = None;
        info!("Particle filter initialized with {} particles", particle_count);
        Ok(())
    }

    fn reset_from_measurement(&mut self, measurement: &RobotState) {
        let n = self.particles.len();
        if n == 0 {
            return;
        }
        let center = measurement.to_vector();
        for p in self.particles.iter_mut() {
            *p = center;
            for axis in 0..3 {
                p[index::POSITION + axis] += gaussian(&mut self.rng, self.position_noise);
                p[index::VELOCITY + axis] += gaussian(&mut self.rng, INITIAL_VELOCITY_SPREAD);
                p[index::ACCELERATION + axis] = 0.0;
            }
            p[index::YAW] = wrap_pi(p[index::YAW] + gaussian(&mut self.rng, self.yaw_noise));
            p[index::YAW_RATE] += gaussian(&mut self.rng, INITIAL_YAW_RATE_SPREAD);
            p[index::YAW_ACCEL] = 0.0;
            p[index::R1] = (p[index::R1] + gaussian(&mut self.rng, RADIUS_NOISE * 0.5))
                .clamp(MIN_RADIUS, MAX_RADIUS);
            p[index::R2] = (p[index::R2] + gaussian(&mut self.rng, RADIUS_NOISE * 0.5))
                .clamp(MIN_RADIUS, MAX_RADIUS);
        }
        self.weights.iter_mut().for_each(|w| *w = 1.0 / n as f32);
        self.robot_id = Some(measurement.robot_id);
    }

    fn predict(&mut self, dt: f32) {
        if self.is_initialized() {
            self.propagate(dt);
        }
    }

    fn step(&mut self, measurement: &RobotState, dt: f32) {
        if self.robot_id != Some(measurement.robot_id) {
            self.reset_from_measurement(measurement);
            return;
        }
        self.propagate(dt);
        self.update(measurement);
    }

    fn mean_state(&self) -> Option<RobotState> {
        let robot_id = self.robot_id?;
        let mut mean = StateVector::zeros();
        for (p, &w) in self.particles.iter().zip(&self.weights) {
            mean += p * w;
        }
        mean[index::YAW] = circular_mean(
            self.particles
                .iter()
                .zip(&self.weights)
                .map(|(p, &w)| (p[index::YAW], w)),
        )
        .unwrap_or(mean[index::YAW]);
        Some(RobotState::from_vector(&mean, robot_id, Instant::now()))
    }
}

/// 估计线程的工作状态
pub struct EstimationWorker<E> {
    engine: E,
    reader: SlotReader<RobotState>,
    metrics: Arc<PipelineMetrics>,
}

impl<E: FilterEngine> EstimationWorker<E> {
    /// 包装一个已经 `init` 过的引擎
    pub fn new(engine: E, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            engine,
            reader: SlotReader::new(),
            metrics,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// 执行一个周期，返回应发布的平滑状态
    ///
    /// `dt` 为距上一个周期的实际间隔（s）。
    pub fn tick(&mut self, hub: &SharedHub, dt: f32) -> Option<RobotState> {
        self.metrics.estimator_ticks.fetch_add(1, Ordering::Relaxed);

        match self.reader.poll(&hub.robot_raw) {
            Some(measurement) => {
                self.metrics
                    .estimator_measurements
                    .fetch_add(1, Ordering::Relaxed);
                if measurement.reset {
                    debug!(
                        "Estimator reset from measurement of target {}",
                        measurement.robot_id
                    );
                    self.engine.reset_from_measurement(&measurement);
                }
                self.engine.step(&measurement, dt);
            },
            None => self.engine.predict(dt),
        }

        self.engine.mean_state()
    }
}

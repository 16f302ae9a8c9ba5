//! 预测瞄准阶段
//!
//! 1. 弹速与处理延迟一阶低通
//! 2. 迭代求解提前量：按运动模型外推目标装甲板位置，直到飞行时间收敛
//! 3. 世界系 → 相机系
//! 4. 重力下坠补偿
//! 5. 云台修正角与开火判定

use crate::geometry::{armor_offset, radius_for_yaw, restrict_to_facing_quarter, world_to_cam_from};
use crate::hub::{SharedHub, SlotReader};
use crate::metrics::PipelineMetrics;
use crate::state::{AimOutput, Orientation, RobotState};
use calibur_tools::AimConfig;
use nalgebra::Vector3;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::trace;

/// 一阶低通
#[inline]
pub fn low_pass(value: f32, measurement: f32, alpha: f32) -> f32 {
    alpha * measurement + (1.0 - alpha) * value
}

/// 飞行时间 = 距离 / 弹速
#[inline]
pub fn time_of_flight(position: &Vector3<f32>, bullet_speed: f32) -> f32 {
    position.norm() / bullet_speed
}

/// 重力下坠量 `½·g·d²/v²`
#[inline]
pub fn bullet_drop(distance: f32, bullet_speed: f32, gravity: f32) -> f32 {
    let inv_v = 1.0 / bullet_speed;
    0.5 * gravity * distance * distance * inv_v * inv_v
}

/// 云台修正角 `(atan2(x, z), atan2(y, z))`
#[inline]
pub fn gimbal_correction(target: &Vector3<f32>) -> (f32, f32) {
    (target.x.atan2(target.z), target.y.atan2(target.z))
}

/// 运动模型：`t` 秒后正对相机的装甲板位置（世界系）
///
/// 中心按匀加速外推，yaw 按匀角加速外推；装甲板半径由预测 yaw 的扇区决定，
/// 偏移方向取预测 yaw 在正对相机的四分之一圆内的等效角。
pub fn motion_model(state: &RobotState, t: f32) -> Vector3<f32> {
    let half_tt = 0.5 * t * t;
    let mut position = state.position + state.velocity * t + state.acceleration * half_tt;

    let yaw = state.yaw + state.yaw_rate * t + state.yaw_accel * half_tt;
    let radius = radius_for_yaw(yaw, state.r1, state.r2);
    position += armor_offset(radius, restrict_to_facing_quarter(yaw));
    position.y += state.height_offset;
    position
}

/// 提前量求解结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeadSolution {
    /// 预测的装甲板位置（世界系）
    pub position: Vector3<f32>,
    /// 飞行时间 + 延迟（s）
    pub lead_time: f32,
    pub iterations: u32,
    pub converged: bool,
}

/// 提前量迭代求解
///
/// 迭代次数不超过 `max_iterations`；未收敛时使用最后一次迭代结果。
pub fn solve_lead(
    state: &RobotState,
    bullet_speed: f32,
    latency: f32,
    threshold: f32,
    max_iterations: u32,
) -> LeadSolution {
    let mut lead_time = time_of_flight(&state.position, bullet_speed) + latency;
    let mut position = state.position;
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        position = motion_model(state, lead_time);
        let next = time_of_flight(&position, bullet_speed) + latency;
        iterations += 1;
        converged = (next - lead_time).abs() < threshold;
        lead_time = next;
        if converged {
            break;
        }
    }

    LeadSolution {
        position,
        lead_time,
        iterations,
        converged,
    }
}

/// 瞄准求解器
///
/// 持有跨周期的滤波标量（弹速、处理延迟），归瞄准线程独占。
#[derive(Debug, Clone)]
pub struct AimSolver {
    config: AimConfig,
    bullet_speed: f32,
    processing_time: f32,
    last_lead: Option<LeadSolution>,
}

impl AimSolver {
    pub fn new(config: AimConfig) -> Self {
        Self {
            bullet_speed: config.initial_bullet_speed,
            processing_time: config.initial_processing_time_s,
            last_lead: None,
            config,
        }
    }

    /// 滤波后的弹速（m/s）
    pub fn bullet_speed(&self) -> f32 {
        self.bullet_speed
    }

    /// 滤波后的处理延迟（s）
    pub fn processing_time(&self) -> f32 {
        self.processing_time
    }

    pub fn config(&self) -> &AimConfig {
        &self.config
    }

    /// 上一次求解的提前量
    pub fn last_lead(&self) -> Option<&LeadSolution> {
        self.last_lead.as_ref()
    }

    /// 更新弹速，非正或非有限的测量值被忽略
    pub fn update_bullet_speed(&mut self, measured: f32) {
        if measured.is_finite() && measured > 0.0 {
            self.bullet_speed = low_pass(self.bullet_speed, measured, self.config.speed_alpha);
        }
    }

    pub fn update_processing_time(&mut self, latency: f32) {
        if latency.is_finite() && latency >= 0.0 {
            self.processing_time =
                low_pass(self.processing_time, latency, self.config.latency_alpha);
        }
    }

    /// 由平滑状态计算瞄准输出
    pub fn solve(
        &mut self,
        state: &RobotState,
        orientation: Option<&Orientation>,
        measured_speed: f32,
        now: Instant,
    ) -> AimOutput {
        self.update_bullet_speed(measured_speed);
        self.update_processing_time(now.saturating_duration_since(state.timestamp).as_secs_f32());

        let lead = solve_lead(
            state,
            self.bullet_speed,
            self.processing_time + self.config.actuation_latency_s,
            self.config.convergence_threshold_s,
            self.config.max_iterations,
        );

        self.last_lead = Some(lead);

        let mut target = world_to_cam_from(orientation) * lead.position;

        // Y 轴向下，下坠补偿使瞄准点上移
        let drop = bullet_drop(target.norm(), self.bullet_speed, self.config.gravity);
        target.y -= drop;

        let (yaw, pitch) = gimbal_correction(&target);
        let fire = yaw.abs() < self.config.fire_yaw_tolerance_rad
            && pitch.abs() < self.config.fire_pitch_tolerance_rad;

        if !lead.converged {
            trace!(
                "Lead time did not converge after {} iterations (t={:.4}s)",
                lead.iterations, lead.lead_time
            );
        }

        AimOutput {
            yaw,
            pitch,
            fire,
            chase: target.z > self.config.chase_distance_m,
            aim: true,
            lead_time: lead.lead_time,
            iterations: lead.iterations,
            target,
            robot_id: state.robot_id,
            timestamp: now,
        }
    }
}

/// 瞄准线程的工作状态
pub struct AimWorker {
    solver: AimSolver,
    reader: SlotReader<RobotState>,
    metrics: Arc<PipelineMetrics>,
}

impl AimWorker {
    pub fn new(config: AimConfig, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            solver: AimSolver::new(config),
            reader: SlotReader::new(),
            metrics,
        }
    }

    pub fn solver(&self) -> &AimSolver {
        &self.solver
    }

    /// 有新的平滑状态时计算瞄准输出，没有则返回 `None`
    pub fn poll(&mut self, hub: &SharedHub) -> Option<AimOutput> {
        let state = self.reader.poll(&hub.robot_smoothed)?;
        let orientation = hub.latest_orientation();

        let output = self.solver.solve(
            &state,
            orientation.as_deref().map(|o| &**o),
            hub.scalars.bullet_speed(),
            Instant::now(),
        );

        self.metrics.aim_updates.fetch_add(1, Ordering::Relaxed);
        if self.solver.last_lead().is_some_and(|lead| !lead.converged) {
            self.metrics.lead_not_converged.fetch_add(1, Ordering::Relaxed);
        }
        Some(output)
    }
}

//! 流水线性能指标
//!
//! 提供零开销的原子计数器，用于监控各工作线程的健康状态。
//! 所有计数器都使用原子操作，可以在任何线程安全地读取，不会引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 流水线实时指标
///
/// # 使用示例
///
/// ```rust
/// use calibur_driver::PipelineMetrics;
/// use std::sync::Arc;
/// use std::sync::atomic::Ordering;
///
/// let metrics = Arc::new(PipelineMetrics::default());
///
/// // 在工作线程中更新指标
/// metrics.frames_captured.fetch_add(1, Ordering::Relaxed);
///
/// // 在主线程中读取快照
/// let snapshot = metrics.snapshot();
/// println!("Frames: {}", snapshot.frames_captured);
/// ```
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// 采集到的相机帧数
    pub frames_captured: AtomicU64,

    /// 发布的姿态数
    pub orientation_updates: AtomicU64,

    /// 相机/IMU 错误次数（不含超时）
    pub device_errors: AtomicU64,

    /// 感知处理的帧数
    pub perception_cycles: AtomicU64,

    /// 锁定新目标次数
    pub targets_acquired: AtomicU64,

    /// 目标丢失次数
    pub targets_lost: AtomicU64,

    /// 发布的原始机器人状态数
    pub robot_states_published: AtomicU64,

    /// 估计器周期数
    pub estimator_ticks: AtomicU64,

    /// 估计器消费的观测数
    pub estimator_measurements: AtomicU64,

    /// 发布的瞄准输出数
    pub aim_updates: AtomicU64,

    /// 提前量迭代未收敛次数（不是错误）
    pub lead_not_converged: AtomicU64,

    /// 成功发送的指令包数
    pub packets_sent: AtomicU64,

    /// 发送失败次数
    ///
    /// 如果这个值快速增长，说明串口断开或下位机无响应。
    pub send_failures: AtomicU64,
}

impl PipelineMetrics {
    /// 创建新的指标实例（所有计数器初始化为 0）
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self) -> [&AtomicU64; 13] {
        [
            &self.frames_captured,
            &self.orientation_updates,
            &self.device_errors,
            &self.perception_cycles,
            &self.targets_acquired,
            &self.targets_lost,
            &self.robot_states_published,
            &self.estimator_ticks,
            &self.estimator_measurements,
            &self.aim_updates,
            &self.lead_not_converged,
            &self.packets_sent,
            &self.send_failures,
        ]
    }

    /// 获取指标快照
    ///
    /// 使用 `Ordering::Relaxed`，不同计数器之间可能有微小的时间差。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            orientation_updates: self.orientation_updates.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
            perception_cycles: self.perception_cycles.load(Ordering::Relaxed),
            targets_acquired: self.targets_acquired.load(Ordering::Relaxed),
            targets_lost: self.targets_lost.load(Ordering::Relaxed),
            robot_states_published: self.robot_states_published.load(Ordering::Relaxed),
            estimator_ticks: self.estimator_ticks.load(Ordering::Relaxed),
            estimator_measurements: self.estimator_measurements.load(Ordering::Relaxed),
            aim_updates: self.aim_updates.load(Ordering::Relaxed),
            lead_not_converged: self.lead_not_converged.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        for counter in self.counters() {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// 指标快照（不可变，用于读取）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_captured: u64,
    pub orientation_updates: u64,
    pub device_errors: u64,
    pub perception_cycles: u64,
    pub targets_acquired: u64,
    pub targets_lost: u64,
    pub robot_states_published: u64,
    pub estimator_ticks: u64,
    pub estimator_measurements: u64,
    pub aim_updates: u64,
    pub lead_not_converged: u64,
    pub packets_sent: u64,
    pub send_failures: u64,
}

impl MetricsSnapshot {
    /// 发送成功率（百分比），没有发送记录时返回 100.0
    pub fn send_success_rate(&self) -> f64 {
        let total = self.packets_sent + self.send_failures;
        if total == 0 {
            return 100.0;
        }
        (self.packets_sent as f64 / total as f64) * 100.0
    }

    /// 提前量未收敛比例（百分比）
    pub fn non_convergence_rate(&self) -> f64 {
        if self.aim_updates == 0 {
            return 0.0;
        }
        (self.lead_not_converged as f64 / self.aim_updates as f64) * 100.0
    }
}

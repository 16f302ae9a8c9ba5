//! 工作线程循环
//!
//! 每个阶段一个线程，阶段之间只通过 [`SharedHub`] 的槽位通信。
//! 所有循环每次迭代检查一次运行标志，没有新数据时退避 `poll_backoff_us`。

use crate::aim::AimWorker;
use crate::devices::{Camera, Imu};
use crate::error::DeviceError;
use crate::estimation::{EstimationWorker, FilterEngine};
use crate::hub::{SharedHub, SlotReader};
use crate::metrics::PipelineMetrics;
use crate::perception::{PerceptionEngine, PerceptionWorker};
use crate::transmit::TransmitWorker;
use calibur_serial::SerialAdapter;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// 所有工作线程共享的句柄
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub hub: Arc<SharedHub>,
    pub metrics: Arc<PipelineMetrics>,
    pub is_running: Arc<AtomicBool>,
    /// 无新数据时的退避时间
    pub backoff: Duration,
}

impl WorkerContext {
    pub fn new(
        hub: Arc<SharedHub>,
        metrics: Arc<PipelineMetrics>,
        is_running: Arc<AtomicBool>,
        backoff: Duration,
    ) -> Self {
        Self {
            hub,
            metrics,
            is_running,
            backoff,
        }
    }

    /// 检查运行标志
    #[inline]
    fn running(&self, name: &str) -> bool {
        // Acquire: 看到 false 时，停止方在此之前的写入都可见
        let running = self.is_running.load(Ordering::Acquire);
        if !running {
            trace!("{} thread: is_running flag is false, exiting", name);
        }
        running
    }

    #[inline]
    fn back_off(&self) {
        spin_sleep::sleep(self.backoff);
    }

    /// 设备错误：超时静默重试，其余记录并退避
    fn device_error(&self, device: &str, error: DeviceError) {
        match error {
            DeviceError::Timeout => trace!("{} read timeout", device),
            other => {
                warn!("{} error: {}, retrying", device, other);
                self.metrics.device_errors.fetch_add(1, Ordering::Relaxed);
                self.back_off();
            },
        }
    }
}

/// 提升当前线程优先级（需启用 `realtime` feature）
fn raise_priority(name: &str) {
    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;
        use tracing::info;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => {
                info!("{} thread priority set to MAX (realtime)", name);
            },
            Err(e) => {
                warn!(
                    "Failed to set {} thread priority: {}. \
                    On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                    name, e
                );
            },
        }
    }
    #[cfg(not(feature = "realtime"))]
    let _ = name;
}

/// 采集线程：相机 → `frame`
pub fn capture_loop(mut camera: impl Camera, ctx: WorkerContext) {
    raise_priority("Capture");

    while ctx.running("Capture") {
        match camera.grab() {
            Ok(frame) => {
                ctx.hub.frame.publish(frame);
                ctx.metrics.frames_captured.fetch_add(1, Ordering::Relaxed);
            },
            Err(e) => ctx.device_error("Camera", e),
        }
    }
}

/// 姿态线程：IMU → `orientation`
pub fn orientation_loop(mut imu: impl Imu, ctx: WorkerContext) {
    raise_priority("Orientation");

    while ctx.running("Orientation") {
        match imu.read() {
            Ok(orientation) => {
                ctx.hub.orientation.publish(orientation);
                ctx.metrics
                    .orientation_updates
                    .fetch_add(1, Ordering::Relaxed);
            },
            Err(e) => ctx.device_error("IMU", e),
        }
    }
}

/// 感知线程：`frame` + `orientation` → `robot_raw`
pub fn perception_loop<P: PerceptionEngine>(mut worker: PerceptionWorker<P>, ctx: WorkerContext) {
    raise_priority("Perception");
    let mut frames = SlotReader::new();

    while ctx.running("Perception") {
        let Some(frame) = frames.poll(&ctx.hub.frame) else {
            ctx.back_off();
            continue;
        };

        let orientation = ctx.hub.latest_orientation();
        if let Some(state) = worker.process_frame(&frame, orientation.as_deref().map(|o| &**o)) {
            ctx.hub.robot_raw.publish(state);
            ctx.metrics
                .robot_states_published
                .fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// 估计线程：`robot_raw` → `robot_smoothed`，固定绝对周期
///
/// 截止时间每次迭代前进一个周期；超时的迭代不睡眠，直接进入下一次。
pub fn estimation_loop<E: FilterEngine>(
    mut worker: EstimationWorker<E>,
    ctx: WorkerContext,
    period: Duration,
) {
    raise_priority("Estimation");

    let mut last_tick = Instant::now();
    let mut deadline = last_tick + period;

    while ctx.running("Estimation") {
        let now = Instant::now();
        let dt = now.duration_since(last_tick).as_secs_f32();
        last_tick = now;

        if let Some(mut state) = worker.tick(&ctx.hub, dt) {
            state.timestamp = Instant::now();
            ctx.hub.robot_smoothed.publish(state);
        }

        let now = Instant::now();
        if deadline > now {
            spin_sleep::sleep(deadline - now);
        }
        deadline += period;
    }
}

/// 瞄准线程：`robot_smoothed` → `aim`
pub fn aim_loop(mut worker: AimWorker, ctx: WorkerContext) {
    raise_priority("Aim");

    while ctx.running("Aim") {
        match worker.poll(&ctx.hub) {
            Some(output) => {
                ctx.hub.aim.publish(output);
            },
            None => ctx.back_off(),
        }
    }
}

/// 发送线程：`aim` → 串口
pub fn transmit_loop<L: SerialAdapter>(mut worker: TransmitWorker<L>, ctx: WorkerContext) {
    raise_priority("Transmit");

    while ctx.running("Transmit") {
        if !worker.poll(&ctx.hub) {
            ctx.back_off();
        }
    }
}

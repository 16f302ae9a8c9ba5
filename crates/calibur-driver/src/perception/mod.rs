//! 感知阶段
//!
//! 检测 → 关键点精修 → 位姿估计 → 按机器人分组 → 目标选择 → 世界系变换 → 状态融合。
//!
//! 检测模型与位姿解算由 [`PerceptionEngine`] 提供，其余步骤由本模块完成。

pub mod fusion;
pub mod select;

pub use fusion::{RobotFuser, YawCandidate, disambiguate_yaw};
pub use select::{Selection, TargetSelector, TrackEvent};

use crate::geometry::cam_to_world_from;
use crate::metrics::PipelineMetrics;
use crate::state::{Detection, Frame, Orientation, RobotId, RobotState};
use calibur_tools::TrackerConfig;
use smallvec::SmallVec;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::{debug, trace};

/// 检测与位姿估计模型
pub trait PerceptionEngine: Send {
    /// 在一帧图像上运行检测，返回装甲板列表（按置信度或模型输出顺序）
    fn detect(&mut self, frame: &Frame) -> Vec<Detection>;

    /// 为每个检测估计相机系下的 `tvec` 与 `yaw`
    ///
    /// 检测模型本身已输出位姿时可以不实现。
    fn estimate_pose(&mut self, _detections: &mut [Detection]) {}
}

impl<T: PerceptionEngine + ?Sized> PerceptionEngine for Box<T> {
    fn detect(&mut self, frame: &Frame) -> Vec<Detection> {
        (**self).detect(frame)
    }

    fn estimate_pose(&mut self, detections: &mut [Detection]) {
        (**self).estimate_pose(detections)
    }
}

/// 永远检测不到目标的空模型
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPerception;

impl PerceptionEngine for NullPerception {
    fn detect(&mut self, _frame: &Frame) -> Vec<Detection> {
        Vec::new()
    }
}

/// 同一台机器人的装甲板集合（通常 1～2 块）
#[derive(Debug, Clone)]
pub struct ArmorGroup {
    pub robot_id: RobotId,
    pub armors: SmallVec<[Detection; 2]>,
}

impl ArmorGroup {
    /// 装甲板平均距离
    pub fn mean_distance(&self) -> f32 {
        if self.armors.is_empty() {
            return f32::INFINITY;
        }
        self.armors.iter().map(Detection::distance).sum::<f32>() / self.armors.len() as f32
    }
}

/// 关键点精修：丢弃低置信度检测，并把关键点限制在图像范围内
pub fn refine_keypoints(detections: &mut Vec<Detection>, width: u32, height: u32, min_confidence: f32) {
    detections.retain(|d| d.confidence >= min_confidence);

    let max_x = width.saturating_sub(1) as f32;
    let max_y = height.saturating_sub(1) as f32;
    for det in detections.iter_mut() {
        for kp in det.keypoints.iter_mut() {
            kp.x = kp.x.clamp(0.0, max_x);
            kp.y = kp.y.clamp(0.0, max_y);
        }
    }
}

/// 按机器人编号分组，组的顺序为编号首次出现的顺序
pub fn group_armors(detections: Vec<Detection>) -> Vec<ArmorGroup> {
    let mut groups: Vec<ArmorGroup> = Vec::new();
    for det in detections {
        match groups.iter_mut().find(|g| g.robot_id == det.robot_id) {
            Some(group) => group.armors.push(det),
            None => groups.push(ArmorGroup {
                robot_id: det.robot_id,
                armors: SmallVec::from_elem(det, 1),
            }),
        }
    }
    groups
}

/// 相机系 → 世界系：旋转 `tvec`，并把姿态 yaw 叠加到装甲板 yaw 上
pub fn transform_to_world(armors: &mut [Detection], orientation: Option<&Orientation>) {
    let rotation = cam_to_world_from(orientation);
    let yaw_offset = orientation.map_or(0.0, Orientation::yaw_rad);
    for armor in armors.iter_mut() {
        armor.tvec = rotation * armor.tvec;
        armor.yaw += yaw_offset;
    }
}

/// 感知线程的工作状态
///
/// 选择器、融合历史和帧时间戳都归本线程独占。
pub struct PerceptionWorker<P> {
    engine: P,
    selector: TargetSelector,
    fuser: RobotFuser,
    min_confidence: f32,
    last_frame_time: Option<Instant>,
    /// 新目标锁定后，下一次输出需要带 reset 标志
    pending_reset: bool,
    metrics: Arc<PipelineMetrics>,
}

impl<P: PerceptionEngine> PerceptionWorker<P> {
    pub fn new(engine: P, config: &TrackerConfig, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            engine,
            selector: TargetSelector::new(config.ttl_s),
            fuser: RobotFuser::new(config.default_radius),
            min_confidence: config.min_confidence,
            last_frame_time: None,
            pending_reset: false,
            metrics,
        }
    }

    pub fn selector(&self) -> &TargetSelector {
        &self.selector
    }

    /// 处理一帧，返回本周期的原始机器人状态（可能为空）
    pub fn process_frame(
        &mut self,
        frame: &Frame,
        orientation: Option<&Orientation>,
    ) -> Option<RobotState> {
        self.metrics
            .perception_cycles
            .fetch_add(1, Ordering::Relaxed);

        let dt = self
            .last_frame_time
            .map_or(0.0, |t| frame.timestamp.saturating_duration_since(t).as_secs_f64());
        self.last_frame_time = Some(frame.timestamp);

        // 1) 检测
        let mut detections = self.engine.detect(frame);

        // 2) 关键点精修 + 位姿
        refine_keypoints(
            &mut detections,
            frame.width,
            frame.height,
            self.min_confidence,
        );
        self.engine.estimate_pose(&mut detections);

        // 3) 分组 + 选择
        let groups = group_armors(detections);
        let Selection { event, mut armors } = self.selector.update(groups, dt);
        self.apply_event(event);

        // 4) 世界系
        transform_to_world(&mut armors, orientation);

        // 5) 融合
        let mut state = self.fuser.fuse(&armors, frame.timestamp)?;
        if self.pending_reset && !armors.is_empty() {
            state.reset = true;
            self.pending_reset = false;
        }
        Some(state)
    }

    fn apply_event(&mut self, event: TrackEvent) {
        if let Some(lost) = event.dropped() {
            debug!("Dropping fusion history for target {}", lost);
            self.metrics.targets_lost.fetch_add(1, Ordering::Relaxed);
            self.fuser.clear();
            self.pending_reset = false;
        }
        match event {
            TrackEvent::Acquired { id, .. } => {
                debug!("Tracking new target {}", id);
                self.metrics
                    .targets_acquired
                    .fetch_add(1, Ordering::Relaxed);
                self.fuser.clear();
                self.pending_reset = true;
            },
            TrackEvent::Coasting { id, ttl } => {
                trace!("Target {} not visible, ttl={:.3}s", id, ttl);
            },
            _ => {},
        }
    }
}

//! 目标选择状态机
//!
//! ```text
//!            最近目标可见
//!   Idle ───────────────▶ Tracking ◀──┐ 目标重新出现（TTL 重置）
//!    ▲                       │        │
//!    │ TTL 耗尽且无候选       │ 目标不可见
//!    │                       ▼        │
//!    └──────────────────── Coasting ──┘
//!                  （TTL 递减，不重新选择）
//! ```
//!
//! TTL 耗尽时如果还有其他候选，立即按距离重新锁定。

use super::ArmorGroup;
use crate::state::{Detection, RobotId};
use smallvec::SmallVec;
use tracing::debug;

/// TTL 判定容差
///
/// 保证恰好 ⌈T/Δt⌉ 次缺失后失锁，不受浮点累减误差影响。
const TTL_EPSILON: f64 = 1e-9;

/// 单周期选择事件
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackEvent {
    /// 锁定新目标（`previous` 为因 TTL 耗尽被替换的旧目标）
    Acquired {
        id: RobotId,
        previous: Option<RobotId>,
    },
    /// 目标可见，继续跟踪
    Tracking(RobotId),
    /// 目标暂时不可见，仍在保持期内
    Coasting { id: RobotId, ttl: f64 },
    /// TTL 耗尽且没有可选目标
    Lost(RobotId),
    /// 无目标
    Idle,
}

impl TrackEvent {
    /// 本周期结束后锁定的目标
    pub fn target(&self) -> Option<RobotId> {
        match *self {
            TrackEvent::Acquired { id, .. }
            | TrackEvent::Tracking(id)
            | TrackEvent::Coasting { id, .. } => Some(id),
            TrackEvent::Lost(_) | TrackEvent::Idle => None,
        }
    }

    /// 是否丢弃了旧目标
    pub fn dropped(&self) -> Option<RobotId> {
        match *self {
            TrackEvent::Acquired { previous, .. } => previous,
            TrackEvent::Lost(id) => Some(id),
            _ => None,
        }
    }
}

/// 选择结果
#[derive(Debug, Clone)]
pub struct Selection {
    pub event: TrackEvent,
    /// 本周期用于融合的装甲板（保持期内为空）
    pub armors: SmallVec<[Detection; 2]>,
}

/// 目标选择器
#[derive(Debug, Clone)]
pub struct TargetSelector {
    /// 最大保持时间（s）
    ttl_max: f64,
    /// 剩余保持时间（s）
    ttl: f64,
    target: Option<RobotId>,
}

impl TargetSelector {
    pub fn new(ttl_max: f64) -> Self {
        Self {
            ttl_max,
            ttl: 0.0,
            target: None,
        }
    }

    pub fn target(&self) -> Option<RobotId> {
        self.target
    }

    pub fn ttl(&self) -> f64 {
        self.ttl
    }

    pub fn ttl_max(&self) -> f64 {
        self.ttl_max
    }

    /// 放弃当前目标
    pub fn clear(&mut self) {
        self.target = None;
        self.ttl = 0.0;
    }

    /// 推进一个感知周期
    ///
    /// `dt` 为与上一帧之间的时间间隔（s）。
    pub fn update(&mut self, mut groups: Vec<ArmorGroup>, dt: f64) -> Selection {
        let Some(id) = self.target else {
            return self.acquire_nearest(groups, None);
        };

        if let Some(pos) = groups.iter().position(|g| g.robot_id == id) {
            let group = groups.swap_remove(pos);
            self.ttl = self.ttl_max;
            return Selection {
                event: TrackEvent::Tracking(id),
                armors: group.armors,
            };
        }

        // 目标不可见
        self.ttl -= dt;
        if self.ttl > TTL_EPSILON {
            return Selection {
                event: TrackEvent::Coasting { id, ttl: self.ttl },
                armors: SmallVec::new(),
            };
        }

        debug!("Target {} lost (TTL expired)", id);
        self.clear();
        self.acquire_nearest(groups, Some(id))
    }

    /// 按距离选择并锁定目标
    fn acquire_nearest(&mut self, groups: Vec<ArmorGroup>, previous: Option<RobotId>) -> Selection {
        let nearest = groups
            .into_iter()
            .filter(|g| !g.armors.is_empty())
            .min_by(|a, b| a.mean_distance().total_cmp(&b.mean_distance()));

        match nearest {
            Some(group) => {
                debug!(
                    "Target {} acquired at {:.2} m",
                    group.robot_id,
                    group.mean_distance()
                );
                self.target = Some(group.robot_id);
                self.ttl = self.ttl_max;
                Selection {
                    event: TrackEvent::Acquired {
                        id: group.robot_id,
                        previous,
                    },
                    armors: group.armors,
                }
            },
            None => Selection {
                event: previous.map_or(TrackEvent::Idle, TrackEvent::Lost),
                armors: SmallVec::new(),
            },
        }
    }
}

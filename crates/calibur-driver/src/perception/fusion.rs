//! 装甲板 → 机器人状态融合
//!
//! 一台机器人有四块装甲板，两两相对，分别位于半径 r1（偶数扇区）与 r2（奇数扇区）处。
//! 单块装甲板只能确定朝向模 90°，因此需要借助上一帧状态消除歧义。

use crate::geometry::{angular_distance, armor_offset, circular_mean, sector_from_yaw, wrap_pi};
use crate::state::{Detection, RobotState};
use std::f32::consts::FRAC_PI_2;
use std::time::Instant;

/// 候选面偏移（单位：π/2）
const FACE_STEPS: [i32; 4] = [0, 1, -1, 2];

/// yaw 消歧结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YawCandidate {
    /// 与观测最接近的候选 yaw，范围 [-π, π)
    pub yaw: f32,
    /// 候选相对上一帧 yaw 的偏移（单位：π/2）
    pub face_step: i32,
}

/// 在 {θ₀, θ₀+π/2, θ₀−π/2, θ₀+π} 中选出与观测回绕距离最小的候选
///
/// 距离相同时按上述顺序优先。
pub fn disambiguate_yaw(previous_yaw: f32, observed_yaw: f32) -> YawCandidate {
    let mut best = YawCandidate {
        yaw: wrap_pi(previous_yaw),
        face_step: 0,
    };
    let mut best_distance = angular_distance(best.yaw, observed_yaw);

    for &step in &FACE_STEPS[1..] {
        let yaw = wrap_pi(previous_yaw + step as f32 * FRAC_PI_2);
        let distance = angular_distance(yaw, observed_yaw);
        if distance < best_distance {
            best = YawCandidate {
                yaw,
                face_step: step,
            };
            best_distance = distance;
        }
    }
    best
}

/// 机器人状态融合器
///
/// 持有上一帧的融合结果作为消歧依据。目标切换或失锁时必须调用 [`clear`](Self::clear)。
#[derive(Debug, Clone)]
pub struct RobotFuser {
    default_radius: f32,
    previous: Option<RobotState>,
}

impl RobotFuser {
    pub fn new(default_radius: f32) -> Self {
        Self {
            default_radius,
            previous: None,
        }
    }

    pub fn previous(&self) -> Option<&RobotState> {
        self.previous.as_ref()
    }

    /// 清空历史
    pub fn clear(&mut self) {
        self.previous = None;
    }

    /// 融合本周期选中的装甲板
    ///
    /// - 1 块：单板融合
    /// - 2 块：顺序融合后取中心均值与 yaw 圆周均值
    /// - 其他数量：保持期内沿用上一帧状态（`reset = false`），没有历史时不输出
    pub fn fuse(&mut self, armors: &[Detection], timestamp: Instant) -> Option<RobotState> {
        match armors {
            [armor] => Some(self.fuse_one(armor, timestamp)),
            [first, second] => Some(self.fuse_two(first, second, timestamp)),
            _ => self.coast(timestamp),
        }
    }

    /// 单板融合
    pub fn fuse_one(&mut self, armor: &Detection, timestamp: Instant) -> RobotState {
        let state = match &self.previous {
            None => {
                let radius = self.default_radius;
                let mut state = RobotState::at_rest(
                    armor.robot_id,
                    armor.tvec - armor_offset(radius, armor.yaw),
                    wrap_pi(armor.yaw),
                    radius,
                    timestamp,
                );
                state.position.y = armor.tvec.y;
                state
            },
            Some(prev) => {
                let candidate = disambiguate_yaw(prev.yaw, armor.yaw);
                let radius = if sector_from_yaw(candidate.yaw) % 2 == 0 {
                    prev.r1
                } else {
                    prev.r2
                };

                // 中心沿观测装甲板的朝向反推
                let mut position = armor.tvec - armor_offset(radius, armor.yaw);
                position.y = armor.tvec.y - prev.height_offset;

                RobotState {
                    position,
                    velocity: prev.velocity,
                    acceleration: prev.acceleration,
                    // 把观测 yaw 换算回被跟踪的那一面
                    yaw: wrap_pi(armor.yaw - candidate.face_step as f32 * FRAC_PI_2),
                    yaw_rate: prev.yaw_rate,
                    yaw_accel: prev.yaw_accel,
                    r1: prev.r1,
                    r2: prev.r2,
                    height_offset: prev.height_offset,
                    robot_id: armor.robot_id,
                    timestamp,
                    reset: false,
                }
            },
        };
        self.previous = Some(state.clone());
        state
    }

    /// 双板融合
    ///
    /// 两块板依次走单板融合（第二块以第一块的结果为历史），
    /// 再对两个中心取算术平均、对两个 yaw 取圆周平均。
    pub fn fuse_two(&mut self, first: &Detection, second: &Detection, timestamp: Instant) -> RobotState {
        let a = self.fuse_one(first, timestamp);
        let b = self.fuse_one(second, timestamp);

        let mut state = b;
        state.position = (a.position + state.position) * 0.5;
        state.yaw = circular_mean([(a.yaw, 1.0), (state.yaw, 1.0)]).unwrap_or(a.yaw);

        self.previous = Some(state.clone());
        state
    }

    /// 沿用上一帧状态
    pub fn coast(&self, timestamp: Instant) -> Option<RobotState> {
        self.previous.as_ref().map(|prev| RobotState {
            timestamp,
            reset: false,
            ..prev.clone()
        })
    }
}

//! 流水线数据结构定义
//!
//! 所有发布到 [`SharedHub`](crate::hub::SharedHub) 的值在发布后都不可变。

use nalgebra::{SVector, Vector3};
use std::fmt;
use std::time::Instant;

/// 机器人状态向量维度
pub const STATE_DIM: usize = 15;

/// 15 维状态向量
///
/// | 索引 | 含义 |
/// |---|---|
/// | 0..3 | 中心位置 x, y, z（m） |
/// | 3..6 | 速度（m/s） |
/// | 6..9 | 加速度（m/s²） |
/// | 9 | yaw（rad） |
/// | 10 | yaw 角速度（rad/s） |
/// | 11 | yaw 角加速度（rad/s²） |
/// | 12 | 装甲板半径 r1（m） |
/// | 13 | 装甲板半径 r2（m） |
/// | 14 | 装甲板高度偏移（m） |
pub type StateVector = SVector<f32, STATE_DIM>;

pub mod index {
    pub const POSITION: usize = 0;
    pub const VELOCITY: usize = 3;
    pub const ACCELERATION: usize = 6;
    pub const YAW: usize = 9;
    pub const YAW_RATE: usize = 10;
    pub const YAW_ACCEL: usize = 11;
    pub const R1: usize = 12;
    pub const R2: usize = 13;
    pub const HEIGHT_OFFSET: usize = 14;
}

/// 相机帧
#[derive(Debug, Clone)]
pub struct Frame {
    /// 采集时间
    pub timestamp: Instant,
    pub width: u32,
    pub height: u32,
    /// 原始像素数据
    pub data: Vec<u8>,
}

/// 设备姿态（世界坐标系，驱动原始单位：度）
#[derive(Debug, Clone, Copy)]
pub struct Orientation {
    pub timestamp: Instant,
    pub roll_deg: f32,
    pub pitch_deg: f32,
    pub yaw_deg: f32,
}

impl Orientation {
    /// 零姿态
    pub fn identity(timestamp: Instant) -> Self {
        Self {
            timestamp,
            roll_deg: 0.0,
            pitch_deg: 0.0,
            yaw_deg: 0.0,
        }
    }

    pub fn roll_rad(&self) -> f32 {
        self.roll_deg.to_radians()
    }

    pub fn pitch_rad(&self) -> f32 {
        self.pitch_deg.to_radians()
    }

    pub fn yaw_rad(&self) -> f32 {
        self.yaw_deg.to_radians()
    }
}

/// 机器人（装甲板类别）编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RobotId(pub u32);

impl fmt::Display for RobotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 图像关键点（像素坐标）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

/// 单块装甲板的检测结果
///
/// 位姿估计前 `tvec` 与 `yaw` 为零；世界坐标变换后两者都表示世界系下的量。
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub robot_id: RobotId,
    /// 四个角点
    pub keypoints: [Keypoint; 4],
    /// 检测置信度
    pub confidence: f32,
    /// 平移向量（m）
    pub tvec: Vector3<f32>,
    /// 装甲板朝向（rad）
    pub yaw: f32,
}

impl Detection {
    pub fn new(robot_id: RobotId, tvec: Vector3<f32>, yaw: f32) -> Self {
        Self {
            robot_id,
            keypoints: [Keypoint::default(); 4],
            confidence: 1.0,
            tvec,
            yaw,
        }
    }

    /// 到相机的欧氏距离
    pub fn distance(&self) -> f32 {
        self.tvec.norm()
    }
}

/// 目标机器人运动学状态
#[derive(Debug, Clone, PartialEq)]
pub struct RobotState {
    /// 旋转中心位置（世界系，m）
    pub position: Vector3<f32>,
    pub velocity: Vector3<f32>,
    pub acceleration: Vector3<f32>,
    pub yaw: f32,
    pub yaw_rate: f32,
    pub yaw_accel: f32,
    /// 偶数扇区装甲板半径
    pub r1: f32,
    /// 奇数扇区装甲板半径
    pub r2: f32,
    /// 装甲板相对中心的高度偏移
    pub height_offset: f32,
    pub robot_id: RobotId,
    pub timestamp: Instant,
    /// 目标切换后的第一帧，估计器需要从该观测重新初始化
    pub reset: bool,
}

impl RobotState {
    /// 只有位置和朝向的静止状态
    pub fn at_rest(
        robot_id: RobotId,
        position: Vector3<f32>,
        yaw: f32,
        radius: f32,
        timestamp: Instant,
    ) -> Self {
        Self {
            position,
            velocity: Vector3::zeros(),
            acceleration: Vector3::zeros(),
            yaw,
            yaw_rate: 0.0,
            yaw_accel: 0.0,
            r1: radius,
            r2: radius,
            height_offset: 0.0,
            robot_id,
            timestamp,
            reset: false,
        }
    }

    pub fn to_vector(&self) -> StateVector {
        let mut v = StateVector::zeros();
        v.fixed_rows_mut::<3>(index::POSITION)
            .copy_from(&self.position);
        v.fixed_rows_mut::<3>(index::VELOCITY)
            .copy_from(&self.velocity);
        v.fixed_rows_mut::<3>(index::ACCELERATION)
            .copy_from(&self.acceleration);
        v[index::YAW] = self.yaw;
        v[index::YAW_RATE] = self.yaw_rate;
        v[index::YAW_ACCEL] = self.yaw_accel;
        v[index::R1] = self.r1;
        v[index::R2] = self.r2;
        v[index::HEIGHT_OFFSET] = self.height_offset;
        v
    }

    pub fn from_vector(v: &StateVector, robot_id: RobotId, timestamp: Instant) -> Self {
        Self {
            position: v.fixed_rows::<3>(index::POSITION).into_owned(),
            velocity: v.fixed_rows::<3>(index::VELOCITY).into_owned(),
            acceleration: v.fixed_rows::<3>(index::ACCELERATION).into_owned(),
            yaw: v[index::YAW],
            yaw_rate: v[index::YAW_RATE],
            yaw_accel: v[index::YAW_ACCEL],
            r1: v[index::R1],
            r2: v[index::R2],
            height_offset: v[index::HEIGHT_OFFSET],
            robot_id,
            timestamp,
            reset: false,
        }
    }
}

/// 瞄准输出
#[derive(Debug, Clone, PartialEq)]
pub struct AimOutput {
    /// yaw 修正量（rad）
    pub yaw: f32,
    /// pitch 修正量（rad，正值表示目标在光轴下方）
    pub pitch: f32,
    pub fire: bool,
    /// 目标过远，请求追击
    pub chase: bool,
    pub aim: bool,
    /// 收敛后的提前量（s）
    pub lead_time: f32,
    /// 提前量迭代次数
    pub iterations: u32,
    /// 落点修正后的相机系目标位置（m）
    pub target: Vector3<f32>,
    pub robot_id: RobotId,
    pub timestamp: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_vector_layout() {
        let mut state = RobotState::at_rest(
            RobotId(3),
            Vector3::new(1.0, 2.0, 3.0),
            0.5,
            0.25,
            Instant::now(),
        );
        state.velocity = Vector3::new(4.0, 5.0, 6.0);
        state.r2 = 0.3;
        state.height_offset = -0.1;

        let v = state.to_vector();
        assert_eq!(v[0], 1.0);
        assert_eq!(v[4], 5.0);
        assert_eq!(v[index::YAW], 0.5);
        assert_eq!(v[index::R1], 0.25);
        assert_eq!(v[index::R2], 0.3);
        assert_eq!(v[index::HEIGHT_OFFSET], -0.1);

        let back = RobotState::from_vector(&v, state.robot_id, state.timestamp);
        assert_eq!(back, state);
    }

    #[test]
    fn test_orientation_radians() {
        let o = Orientation {
            timestamp: Instant::now(),
            roll_deg: 0.0,
            pitch_deg: 90.0,
            yaw_deg: -180.0,
        };
        assert!((o.pitch_rad() - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert!((o.yaw_rad() + std::f32::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn test_detection_distance() {
        let det = Detection::new(RobotId(1), Vector3::new(3.0, 0.0, 4.0), 0.0);
        assert_eq!(det.distance(), 5.0);
    }
}

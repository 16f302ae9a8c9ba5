//! 坐标变换与角度工具
//!
//! 相机系：X 向右，Y 向下，Z 向前。世界系在零姿态时与相机系重合，竖直轴为 Y。
//! 所有角度均为弧度。

use crate::state::Orientation;
use nalgebra::{Rotation3, Vector3};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};

/// 回绕到 [-π, π)
#[inline]
pub fn wrap_pi(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    // rem_euclid 在极小负数上可能返回 TAU 本身
    if wrapped >= PI { wrapped - TAU } else { wrapped }
}

/// 两角之间的回绕距离，范围 [0, π]
#[inline]
pub fn angular_distance(a: f32, b: f32) -> f32 {
    wrap_pi(a - b).abs()
}

#[inline]
pub fn deg2rad(deg: f32) -> f32 {
    deg * (PI / 180.0)
}

#[inline]
pub fn rad2deg(rad: f32) -> f32 {
    rad * (180.0 / PI)
}

/// yaw 所在的 90° 扇区编号（0..4），扇区以 0、π/2、π、-π/2 为中心
#[inline]
pub fn sector_from_yaw(yaw: f32) -> usize {
    let sector = ((wrap_pi(yaw) + FRAC_PI_4) / FRAC_PI_2).floor() as i32;
    (sector & 3) as usize
}

/// 偶数扇区使用 r1，奇数扇区使用 r2
#[inline]
pub fn radius_for_yaw(yaw: f32, r1: f32, r2: f32) -> f32 {
    if sector_from_yaw(yaw) % 2 == 0 { r1 } else { r2 }
}

/// 把 yaw 限制在正对相机的四分之一圆内，范围 [-π/4, π/4)
#[inline]
pub fn restrict_to_facing_quarter(yaw: f32) -> f32 {
    (yaw + FRAC_PI_4).rem_euclid(FRAC_PI_2) - FRAC_PI_4
}

/// 从旋转中心指向装甲板的偏移
#[inline]
pub fn armor_offset(radius: f32, yaw: f32) -> Vector3<f32> {
    Vector3::new(radius * yaw.sin(), 0.0, -radius * yaw.cos())
}

/// 绕相机横轴（X）的 pitch 旋转
pub fn rotation_pitch(pitch: f32) -> Rotation3<f32> {
    Rotation3::from_axis_angle(&Vector3::x_axis(), pitch)
}

/// 绕竖直轴（Y）的 yaw 旋转
pub fn rotation_yaw(yaw: f32) -> Rotation3<f32> {
    Rotation3::from_axis_angle(&Vector3::y_axis(), yaw)
}

/// 相机系 → 世界系：先 pitch 后 yaw
pub fn cam_to_world(yaw: f32, pitch: f32) -> Rotation3<f32> {
    rotation_yaw(yaw) * rotation_pitch(pitch)
}

/// 世界系 → 相机系
pub fn world_to_cam(yaw: f32, pitch: f32) -> Rotation3<f32> {
    cam_to_world(yaw, pitch).inverse()
}

/// 由姿态快照构造相机→世界旋转，没有姿态时为单位阵
pub fn cam_to_world_from(orientation: Option<&Orientation>) -> Rotation3<f32> {
    orientation.map_or_else(Rotation3::identity, |o| {
        cam_to_world(o.yaw_rad(), o.pitch_rad())
    })
}

/// 由姿态快照构造世界→相机旋转，没有姿态时为单位阵
pub fn world_to_cam_from(orientation: Option<&Orientation>) -> Rotation3<f32> {
    cam_to_world_from(orientation).inverse()
}

/// 加权圆周平均，权重和为零时返回 `None`
pub fn circular_mean(angles: impl IntoIterator<Item = (f32, f32)>) -> Option<f32> {
    let (mut s, mut c, mut total) = (0.0f32, 0.0f32, 0.0f32);
    for (angle, weight) in angles {
        s += weight * angle.sin();
        c += weight * angle.cos();
        total += weight;
    }
    if total <= 0.0 || (s == 0.0 && c == 0.0) {
        return None;
    }
    Some(wrap_pi(s.atan2(c)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_wrap_pi() {
        assert_relative_eq!(wrap_pi(0.0), 0.0);
        assert_relative_eq!(wrap_pi(TAU + 0.5), 0.5, epsilon = 1e-5);
        assert_relative_eq!(wrap_pi(-TAU - 0.5), -0.5, epsilon = 1e-5);
        assert_relative_eq!(wrap_pi(3.0 * FRAC_PI_2), -FRAC_PI_2, epsilon = 1e-5);
        assert_relative_eq!(wrap_pi(PI), -PI, epsilon = 1e-6);
        for i in -100..100 {
            let w = wrap_pi(i as f32 * 0.37);
            assert!((-PI..PI).contains(&w));
        }
    }

    #[test]
    fn test_sector_from_yaw() {
        assert_eq!(sector_from_yaw(0.0), 0);
        assert_eq!(sector_from_yaw(0.7), 0);
        assert_eq!(sector_from_yaw(FRAC_PI_2), 1);
        assert_eq!(sector_from_yaw(PI - 0.1), 2);
        assert_eq!(sector_from_yaw(-PI + 0.1), 2);
        assert_eq!(sector_from_yaw(-FRAC_PI_2), 3);
        assert_eq!(sector_from_yaw(-0.7), 0);
    }

    #[test]
    fn test_restrict_to_facing_quarter() {
        assert_relative_eq!(restrict_to_facing_quarter(0.3), 0.3, epsilon = 1e-6);
        assert_relative_eq!(restrict_to_facing_quarter(FRAC_PI_2 + 0.3), 0.3, epsilon = 1e-5);
        assert_relative_eq!(restrict_to_facing_quarter(-PI - 0.2), -0.2, epsilon = 1e-5);
    }

    #[test]
    fn test_armor_offset() {
        let offset = armor_offset(0.25, 0.0);
        assert_relative_eq!(offset, Vector3::new(0.0, 0.0, -0.25), epsilon = 1e-6);

        let offset = armor_offset(0.2, FRAC_PI_2);
        assert_relative_eq!(offset, Vector3::new(0.2, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_yaw_rotation_turns_forward_to_right() {
        let forward = Vector3::new(0.0, 0.0, 1.0);
        let turned = cam_to_world(FRAC_PI_2, 0.0) * forward;
        assert_relative_eq!(turned, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_positive_pitch_looks_up() {
        let forward = Vector3::new(0.0, 0.0, 1.0);
        let tilted = cam_to_world(0.0, 0.3) * forward;
        // Y 向下，抬头后前向量的 Y 为负
        assert!(tilted.y < 0.0);
    }

    #[test]
    fn test_world_to_cam_is_inverse() {
        let p = Vector3::new(0.3, -0.2, 4.0);
        let roundtrip = world_to_cam(0.8, -0.3) * (cam_to_world(0.8, -0.3) * p);
        assert_relative_eq!(roundtrip, p, epsilon = 1e-5);
    }

    #[test]
    fn test_pitch_applied_before_yaw() {
        let p = Vector3::new(0.0, 0.0, 1.0);
        let composed = cam_to_world(0.5, 0.2) * p;
        let manual = rotation_yaw(0.5) * (rotation_pitch(0.2) * p);
        assert_relative_eq!(composed, manual, epsilon = 1e-6);
    }

    #[test]
    fn test_missing_orientation_is_identity() {
        let p = Vector3::new(1.0, 2.0, 3.0);
        assert_relative_eq!(cam_to_world_from(None) * p, p);
        assert_relative_eq!(world_to_cam_from(None) * p, p);
    }

    #[test]
    fn test_circular_mean_across_seam() {
        let mean = circular_mean([(PI - 0.1, 1.0), (-PI + 0.1, 1.0)]).unwrap();
        assert_relative_eq!(angular_distance(mean, PI), 0.0, epsilon = 1e-5);
        assert!(circular_mean(std::iter::empty()).is_none());
    }

    #[test]
    fn test_degree_conversion() {
        assert_relative_eq!(deg2rad(180.0), PI);
        assert_relative_eq!(rad2deg(FRAC_PI_2), 90.0, epsilon = 1e-4);
    }
}

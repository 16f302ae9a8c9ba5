//! # 云台安全限位
//!
//! 发送给下位机之前的软件限位：pitch 夹紧在硬限位内侧，
//! 360° 云台的 yaw 只做回绕，有限位云台的 yaw 同样夹紧。

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// 判定"接近 pitch 限位"的带宽（rad，约 4.5°）
pub const PITCH_LIMIT_BAND: f32 = 0.08;

/// 云台限位
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GimbalLimits {
    /// pitch 下限（rad，负值为低头）
    pub pitch_min: f32,

    /// pitch 上限（rad）
    pub pitch_max: f32,

    /// yaw 下限（rad）
    pub yaw_min: f32,

    /// yaw 上限（rad）
    pub yaw_max: f32,

    /// 软件安全余量（rad，约 3°）
    pub safety_margin: f32,

    /// yaw 是否存在物理限位（`false` 表示 360° 云台）
    pub yaw_limited: bool,
}

impl Default for GimbalLimits {
    fn default() -> Self {
        Self {
            // ⚠️ 这些值应该根据实际云台机构调整
            pitch_min: -0.17, // ~-10°
            pitch_max: 0.87,  // ~+50°
            yaw_min: -3.14,
            yaw_max: 3.14,
            safety_margin: 0.05,
            yaw_limited: false,
        }
    }
}

impl GimbalLimits {
    /// 将目标角度限制到安全范围内，返回 `(yaw, pitch)`
    pub fn clamp(&self, yaw: f32, pitch: f32) -> (f32, f32) {
        let pitch = clamp_with_margin(pitch, self.pitch_min, self.pitch_max, self.safety_margin);
        let yaw = if self.yaw_limited {
            clamp_with_margin(yaw, self.yaw_min, self.yaw_max, self.safety_margin)
        } else {
            wrap(yaw)
        };
        (yaw, pitch)
    }

    /// 目标是否在硬限位内（360° 云台只检查 pitch）
    pub fn is_target_reachable(&self, yaw: f32, pitch: f32) -> bool {
        let pitch_ok = pitch >= self.pitch_min && pitch <= self.pitch_max;
        if self.yaw_limited {
            pitch_ok && yaw >= self.yaw_min && yaw <= self.yaw_max
        } else {
            pitch_ok
        }
    }

    /// pitch 是否贴近任一限位
    pub fn is_at_pitch_limit(&self, pitch: f32) -> bool {
        pitch < self.pitch_min + PITCH_LIMIT_BAND || pitch > self.pitch_max - PITCH_LIMIT_BAND
    }

    /// 人类可读的云台状态，例如 `yaw=10.00° pitch=-9.50° [AT MIN]`
    pub fn status_string(&self, yaw: f32, pitch: f32) -> String {
        let marker = if pitch < self.pitch_min + PITCH_LIMIT_BAND {
            " [AT MIN]"
        } else if pitch > self.pitch_max - PITCH_LIMIT_BAND {
            " [AT MAX]"
        } else {
            ""
        };
        format!(
            "yaw={:.2}° pitch={:.2}°{}",
            yaw.to_degrees(),
            pitch.to_degrees(),
            marker
        )
    }

    /// 限位参数是否自洽（NaN/无穷视为无效）
    pub fn is_valid(&self) -> bool {
        let finite = [
            self.pitch_min,
            self.pitch_max,
            self.yaw_min,
            self.yaw_max,
            self.safety_margin,
        ]
        .iter()
        .all(|v| v.is_finite());

        finite
            && self.safety_margin >= 0.0
            && self.pitch_min + self.safety_margin < self.pitch_max - self.safety_margin
            && self.yaw_min < self.yaw_max
    }
}

fn clamp_with_margin(value: f32, min: f32, max: f32, margin: f32) -> f32 {
    let lo = min + margin;
    let hi = max - margin;
    if lo > hi {
        // 余量吞掉了整个区间，退回到区间中点
        return 0.5 * (min + max);
    }
    // NaN 边界被忽略
    value.max(lo).min(hi)
}

/// 回绕到 [-π, π)
fn wrap(angle: f32) -> f32 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

//! 发送阶段
//!
//! 把瞄准修正量换算为云台绝对角度做软件限位，再换算回修正量，以度为单位发给下位机。

use crate::geometry::{rad2deg, wrap_pi};
use crate::hub::{SharedHub, SlotReader};
use crate::metrics::PipelineMetrics;
use crate::state::{AimOutput, Orientation};
use calibur_protocol::AimPacket;
use calibur_serial::SerialAdapter;
use calibur_tools::GimbalLimits;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::trace;

/// 对修正量做限位，返回限位后的修正量 `(yaw, pitch)`（rad）
///
/// 云台 pitch 抬头为正，而修正量 pitch 沿相机 Y 轴（向下为正），因此绝对 pitch = 当前 − 修正。
pub fn limit_correction(
    limits: &GimbalLimits,
    orientation: Option<&Orientation>,
    yaw: f32,
    pitch: f32,
) -> (f32, f32) {
    let (current_yaw, current_pitch) =
        orientation.map_or((0.0, 0.0), |o| (o.yaw_rad(), o.pitch_rad()));

    let (target_yaw, target_pitch) = limits.clamp(current_yaw + yaw, current_pitch - pitch);
    (
        wrap_pi(target_yaw - current_yaw),
        current_pitch - target_pitch,
    )
}

/// 由瞄准输出构造指令包
pub fn build_packet(
    output: &AimOutput,
    limits: &GimbalLimits,
    orientation: Option<&Orientation>,
) -> AimPacket {
    let (yaw, pitch) = limit_correction(limits, orientation, output.yaw, output.pitch);
    AimPacket::new(rad2deg(yaw), rad2deg(pitch), output.fire)
}

/// 发送线程的工作状态
pub struct TransmitWorker<L> {
    link: L,
    limits: GimbalLimits,
    reader: SlotReader<AimOutput>,
    metrics: Arc<PipelineMetrics>,
}

impl<L: SerialAdapter> TransmitWorker<L> {
    pub fn new(link: L, limits: GimbalLimits, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            link,
            limits,
            reader: SlotReader::new(),
            metrics,
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// 有新的瞄准输出时发送一次，返回是否发送过（成功或失败）
    pub fn poll(&mut self, hub: &SharedHub) -> bool {
        let Some(output) = self.reader.poll(&hub.aim) else {
            return false;
        };
        let orientation = hub.latest_orientation();
        self.transmit(&output, orientation.as_deref().map(|o| &**o));
        true
    }

    /// 发送一个瞄准输出，失败不重试
    pub fn transmit(&mut self, output: &AimOutput, orientation: Option<&Orientation>) -> bool {
        let packet = build_packet(output, &self.limits, orientation);
        trace!(
            "Aim {}: yaw={:.2}° pitch={:.2}° fire={}",
            output.robot_id, packet.yaw, packet.pitch, packet.fire
        );

        let sent = self.link.send_aim(&packet);
        let counter = if sent {
            &self.metrics.packets_sent
        } else {
            &self.metrics.send_failures
        };
        counter.fetch_add(1, Ordering::Relaxed);
        sent
    }
}

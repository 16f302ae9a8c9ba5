//! 空跑链路：不接触硬件，只记录发送内容

use crate::{SerialAdapter, SerialError};
use calibur_protocol::{AIM_PACKET_LEN, AimPacket};
use tracing::{info, warn};

/// 空跑链路
///
/// 每个包都会被解码并以 `info` 级别记录，写入总是成功。
#[derive(Debug, Default)]
pub struct DryRunAdapter {
    packets: u64,
}

impl DryRunAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已"发送"的包数量
    pub fn packets(&self) -> u64 {
        self.packets
    }
}

impl SerialAdapter for DryRunAdapter {
    fn write_packet(&mut self, packet: &[u8; AIM_PACKET_LEN]) -> Result<(), SerialError> {
        self.packets += 1;
        match AimPacket::decode(packet) {
            Ok(aim) => info!(
                "[dry-run #{}] yaw={:.3} pitch={:.3} fire={}",
                self.packets, aim.yaw, aim.pitch, aim.fire
            ),
            Err(e) => warn!("[dry-run #{}] malformed packet: {}", self.packets, e),
        }
        Ok(())
    }
}

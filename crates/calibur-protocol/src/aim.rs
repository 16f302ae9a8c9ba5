//! 瞄准指令包
//!
//! 每次瞄准更新发送一个固定 11 字节的数据包给云台下位机。

use crate::constants::*;
use crate::{ProtocolError, bytes_to_f32_ne, f32_to_bytes_ne};

/// 计算校验和（逐字节异或）
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc ^ b)
}

/// 瞄准指令
///
/// `yaw`/`pitch` 为云台修正量，单位由上层约定（发送端统一使用度）。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AimPacket {
    pub yaw: f32,
    pub pitch: f32,
    pub fire: bool,
}

impl AimPacket {
    pub fn new(yaw: f32, pitch: f32, fire: bool) -> Self {
        Self { yaw, pitch, fire }
    }

    /// 编码为线上字节
    pub fn encode(&self) -> [u8; AIM_PACKET_LEN] {
        let mut packet = [0u8; AIM_PACKET_LEN];
        packet[0] = AIM_PACKET_HEADER;
        packet[1..5].copy_from_slice(&f32_to_bytes_ne(self.yaw));
        packet[5..9].copy_from_slice(&f32_to_bytes_ne(self.pitch));
        packet[9] = if self.fire { FIRE_ON } else { FIRE_OFF };
        packet[10] = checksum(&packet[..CHECKSUM_SPAN]);
        packet
    }

    /// 从线上字节解码
    ///
    /// # 错误
    /// - `InvalidLength`: 长度不是 11 字节
    /// - `InvalidHeader`: 包头不是 `0xAA`
    /// - `ChecksumMismatch`: 校验和不匹配
    /// - `InvalidValue`: 开火标志不是 `0x00`/`0x01`
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() != AIM_PACKET_LEN {
            return Err(ProtocolError::InvalidLength {
                expected: AIM_PACKET_LEN,
                actual: bytes.len(),
            });
        }

        if bytes[0] != AIM_PACKET_HEADER {
            return Err(ProtocolError::InvalidHeader { header: bytes[0] });
        }

        let expected = checksum(&bytes[..CHECKSUM_SPAN]);
        if bytes[10] != expected {
            return Err(ProtocolError::ChecksumMismatch {
                expected,
                actual: bytes[10],
            });
        }

        let fire = match bytes[9] {
            FIRE_ON => true,
            FIRE_OFF => false,
            value => {
                return Err(ProtocolError::InvalidValue {
                    field: "fire".to_string(),
                    value,
                });
            },
        };

        Ok(Self {
            yaw: bytes_to_f32_ne([bytes[1], bytes[2], bytes[3], bytes[4]]),
            pitch: bytes_to_f32_ne([bytes[5], bytes[6], bytes[7], bytes[8]]),
            fire,
        })
    }
}

impl TryFrom<&[u8]> for AimPacket {
    type Error = ProtocolError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::decode(bytes)
    }
}

impl From<AimPacket> for [u8; AIM_PACKET_LEN] {
    fn from(packet: AimPacket) -> Self {
        packet.encode()
    }
}

//! 协议常量定义

/// 瞄准指令包头
pub const AIM_PACKET_HEADER: u8 = 0xAA;

/// 瞄准指令包总长度（字节）
///
/// | 偏移 | 字段 |
/// |---|---|
/// | 0 | 包头 `0xAA` |
/// | 1-4 | yaw 修正量（f32，本机字节序） |
/// | 5-8 | pitch 修正量（f32，本机字节序） |
/// | 9 | 开火标志 |
/// | 10 | 校验和（字节 0-9 异或） |
pub const AIM_PACKET_LEN: usize = 11;

/// 开火标志：开火
pub const FIRE_ON: u8 = 0x01;

/// 开火标志：不开火
pub const FIRE_OFF: u8 = 0x00;

/// 校验和覆盖的字节数（包头 + 负载）
pub const CHECKSUM_SPAN: usize = AIM_PACKET_LEN - 1;

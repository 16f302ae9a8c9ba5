//! # Calibur Protocol
//!
//! 云台控制串口协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `constants`: 协议常量定义（包头、包长、开火标志）
//! - `aim`: 瞄准指令包的编码/解码
//!
//! ## 字节序
//!
//! 与下位机约定使用**本机字节序**（native endian）传输 IEEE-754 单精度浮点数，
//! 上下位机均为小端平台。本模块提供了字节序转换工具函数。

pub mod aim;
pub mod constants;

// 重新导出常用类型
pub use aim::{AimPacket, checksum};
pub use constants::*;

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid packet length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid packet header: 0x{header:02X}")]
    InvalidHeader { header: u8 },

    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: u8 },
}

/// 本机字节序转 f32
pub fn bytes_to_f32_ne(bytes: [u8; 4]) -> f32 {
    f32::from_ne_bytes(bytes)
}

/// f32 转本机字节序
pub fn f32_to_bytes_ne(value: f32) -> [u8; 4] {
    value.to_ne_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_to_bytes_ne_matches_ieee754() {
        let bytes = f32_to_bytes_ne(1.0);
        assert_eq!(bytes, 0x3F80_0000u32.to_ne_bytes());
    }

    #[test]
    fn test_bytes_to_f32_ne_negative() {
        let bytes = (-10.0f32).to_bits().to_ne_bytes();
        assert_eq!(bytes_to_f32_ne(bytes), -10.0);
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::InvalidLength {
            expected: 11,
            actual: 4,
        };
        assert_eq!(format!("{}", err), "Invalid packet length: expected 11, got 4");

        let err = ProtocolError::InvalidHeader { header: 0x55 };
        assert!(format!("{}", err).contains("0x55"));

        let err = ProtocolError::ChecksumMismatch {
            expected: 0x0F,
            actual: 0xF0,
        };
        assert!(format!("{}", err).contains("Checksum mismatch"));
    }
}

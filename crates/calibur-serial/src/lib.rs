//! # Calibur Serial Link
//!
//! 云台下位机串口链路抽象层，提供统一的发送接口。
//!
//! - `tty`: Linux termios 后端（raw 模式，8N1，无流控，非阻塞读）
//! - `dry_run`: 只记录日志、不接触硬件的链路（调试用）
//! - `mock`: 测试用的内存链路（需启用 `mock` feature）

use calibur_protocol::{AIM_PACKET_LEN, AimPacket};
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, warn};

#[cfg(target_os = "linux")]
pub mod tty;

#[cfg(target_os = "linux")]
pub use tty::TtySerialAdapter;

pub mod dry_run;
pub use dry_run::DryRunAdapter;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockSerialAdapter;

/// 串口链路统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Termios configuration failed: {0}")]
    Termios(String),
    #[error("Device not open")]
    NotOpen,
    #[error("Short write: expected {expected} bytes, wrote {written}")]
    ShortWrite { expected: usize, written: usize },
    #[error("Serial backend is not supported on this platform")]
    UnsupportedPlatform,
}

/// 支持的串口波特率
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BaudRate {
    B9600,
    B19200,
    B38400,
    B57600,
    #[default]
    B115200,
    B230400,
    B460800,
    B921600,
}

impl BaudRate {
    pub const ALL: [BaudRate; 8] = [
        BaudRate::B9600,
        BaudRate::B19200,
        BaudRate::B38400,
        BaudRate::B57600,
        BaudRate::B115200,
        BaudRate::B230400,
        BaudRate::B460800,
        BaudRate::B921600,
    ];

    /// 波特率数值（bps）
    pub fn as_u32(self) -> u32 {
        match self {
            BaudRate::B9600 => 9600,
            BaudRate::B19200 => 19200,
            BaudRate::B38400 => 38400,
            BaudRate::B57600 => 57600,
            BaudRate::B115200 => 115_200,
            BaudRate::B230400 => 230_400,
            BaudRate::B460800 => 460_800,
            BaudRate::B921600 => 921_600,
        }
    }

    /// 从数值创建，不支持的波特率回退到 115200 并告警
    pub fn from_u32_or_default(baud: u32) -> Self {
        match Self::try_from(baud) {
            Ok(rate) => rate,
            Err(()) => {
                warn!("Unsupported baudrate {}, using 115200", baud);
                BaudRate::default()
            },
        }
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|rate| rate.as_u32() == value)
            .ok_or(())
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

/// 串口链路
///
/// 一次 `write_packet` 调用必须完整写出 11 字节，否则视为本周期发送失败，不重试。
pub trait SerialAdapter: Send {
    /// 写出一个完整的瞄准指令包
    fn write_packet(&mut self, packet: &[u8; AIM_PACKET_LEN]) -> Result<(), SerialError>;

    /// 非阻塞读取当前可用字节，无数据时返回 `Ok(0)`
    fn read_available(&mut self, _buf: &mut [u8]) -> Result<usize, SerialError> {
        Ok(0)
    }

    /// 编码并发送瞄准指令，失败时记录日志并返回 `false`
    fn send_aim(&mut self, packet: &AimPacket) -> bool {
        match self.write_packet(&packet.encode()) {
            Ok(()) => {
                debug!(
                    "Sent data: yaw={}, pitch={}, is_fire={}",
                    packet.yaw, packet.pitch, packet.fire
                );
                true
            },
            Err(e) => {
                error!("Failed to send aim packet: {}", e);
                false
            },
        }
    }
}

impl<T: SerialAdapter + ?Sized> SerialAdapter for Box<T> {
    fn write_packet(&mut self, packet: &[u8; AIM_PACKET_LEN]) -> Result<(), SerialError> {
        (**self).write_packet(packet)
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        (**self).read_available(buf)
    }
}

/// 检查单次写入是否完整
pub(crate) fn check_full_write(written: usize) -> Result<(), SerialError> {
    if written != AIM_PACKET_LEN {
        return Err(SerialError::ShortWrite {
            expected: AIM_PACKET_LEN,
            written,
        });
    }
    Ok(())
}

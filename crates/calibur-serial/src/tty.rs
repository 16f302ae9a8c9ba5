//! termios TTY 串口适配器
//!
//! 支持 Linux 平台下的 USB 转串口设备（如 `/dev/ttyUSB0`、`/dev/ttyACM0`）。
//!
//! ## 配置
//!
//! - raw 模式（关闭行规程、回显、输出处理）
//! - 8 数据位 / 无校验 / 1 停止位，无硬件/软件流控
//! - `VMIN = 0`、`VTIME = 0`：读操作立即返回
//!
//! ## 限制
//!
//! - **仅限 Linux 平台**
//! - **权限要求**：可能需要 `dialout` 组权限或 `sudo`

use crate::{BaudRate, SerialAdapter, SerialError, check_full_write};
use calibur_protocol::AIM_PACKET_LEN;
use nix::sys::termios::{
    self, BaudRate as TermiosBaud, ControlFlags, InputFlags, LocalFlags, OutputFlags, SetArg,
    SpecialCharacterIndices,
};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tracing::{error, info, trace, warn};

impl From<BaudRate> for TermiosBaud {
    fn from(rate: BaudRate) -> Self {
        match rate {
            BaudRate::B9600 => TermiosBaud::B9600,
            BaudRate::B19200 => TermiosBaud::B19200,
            BaudRate::B38400 => TermiosBaud::B38400,
            BaudRate::B57600 => TermiosBaud::B57600,
            BaudRate::B115200 => TermiosBaud::B115200,
            BaudRate::B230400 => TermiosBaud::B230400,
            BaudRate::B460800 => TermiosBaud::B460800,
            BaudRate::B921600 => TermiosBaud::B921600,
        }
    }
}

/// TTY 串口适配器
///
/// # 示例
///
/// ```no_run
/// use calibur_serial::{BaudRate, SerialAdapter, TtySerialAdapter};
/// use calibur_protocol::AimPacket;
///
/// let mut link = TtySerialAdapter::open("/dev/ttyUSB0", BaudRate::B115200).unwrap();
/// let ok = link.send_aim(&AimPacket::new(1.5, -0.3, false));
/// ```
#[derive(Debug)]
pub struct TtySerialAdapter {
    /// 设备路径
    path: PathBuf,
    /// 已打开的设备（`None` 表示已关闭）
    file: Option<File>,
    /// 当前波特率
    baud: BaudRate,
}

impl TtySerialAdapter {
    /// 打开并配置串口设备
    ///
    /// # 错误
    /// - `SerialError::Io`: 设备不存在或权限不足
    /// - `SerialError::Termios`: termios 属性读写失败
    pub fn open(path: impl AsRef<Path>, baud: BaudRate) -> Result<Self, SerialError> {
        let path = path.as_ref().to_path_buf();
        info!("Opening serial device: {}", path.display());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_SYNC)
            .open(&path)
            .map_err(|e| {
                error!("Failed to open serial device {}: {}", path.display(), e);
                SerialError::Io(e)
            })?;

        let mut adapter = Self {
            path,
            file: Some(file),
            baud,
        };
        adapter.configure(baud)?;
        Ok(adapter)
    }

    /// 重新配置串口（raw 8N1，无流控，非阻塞读）
    pub fn configure(&mut self, baud: BaudRate) -> Result<(), SerialError> {
        let file = self.file.as_ref().ok_or_else(|| {
            error!("Cannot configure: device not open");
            SerialError::NotOpen
        })?;

        info!("Configuring serial device with baudrate: {}", baud);

        let mut tty = termios::tcgetattr(file).map_err(|e| {
            error!("Error getting termios attributes: {}", e);
            SerialError::Termios(e.to_string())
        })?;

        termios::cfsetospeed(&mut tty, baud.into())
            .and_then(|_| termios::cfsetispeed(&mut tty, baud.into()))
            .map_err(|e| SerialError::Termios(e.to_string()))?;

        // 8N1
        tty.control_flags.remove(ControlFlags::CSIZE);
        tty.control_flags.insert(ControlFlags::CS8);
        tty.control_flags
            .remove(ControlFlags::PARENB | ControlFlags::PARODD | ControlFlags::CSTOPB);
        tty.control_flags.remove(ControlFlags::CRTSCTS);
        tty.control_flags
            .insert(ControlFlags::CLOCAL | ControlFlags::CREAD);

        // raw 模式
        tty.local_flags = LocalFlags::empty();
        tty.output_flags = OutputFlags::empty();
        tty.input_flags
            .remove(InputFlags::IXON | InputFlags::IXOFF | InputFlags::IXANY);

        tty.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
        tty.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;

        termios::tcsetattr(file, SetArg::TCSANOW, &tty).map_err(|e| {
            error!("Error setting termios attributes: {}", e);
            SerialError::Termios(e.to_string())
        })?;

        self.baud = baud;
        info!("Serial device configured successfully");
        Ok(())
    }

    /// 关闭设备（可重复调用）
    pub fn close(&mut self) {
        if self.file.take().is_some() {
            info!("Closing serial device: {}", self.path.display());
        }
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn baud(&self) -> BaudRate {
        self.baud
    }
}

impl SerialAdapter for TtySerialAdapter {
    fn write_packet(&mut self, packet: &[u8; AIM_PACKET_LEN]) -> Result<(), SerialError> {
        let file = self.file.as_mut().ok_or(SerialError::NotOpen)?;
        // 单次 write，不做补写
        let written = file.write(packet)?;
        check_full_write(written)
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        let file = self.file.as_mut().ok_or(SerialError::NotOpen)?;
        match file.read(buf) {
            Ok(n) => {
                trace!("Serial RX: {} bytes", n);
                Ok(n)
            },
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                Ok(0)
            },
            Err(e) => {
                warn!("Serial read error on {}: {}", self.path.display(), e);
                Err(SerialError::Io(e))
            },
        }
    }
}

impl Drop for TtySerialAdapter {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device() {
        let result = TtySerialAdapter::open("/dev/calibur-does-not-exist", BaudRate::B115200);
        assert!(matches!(result, Err(SerialError::Io(_))));
    }

    #[test]
    fn test_termios_baud_mapping() {
        assert_eq!(TermiosBaud::from(BaudRate::B9600), TermiosBaud::B9600);
        assert_eq!(TermiosBaud::from(BaudRate::B921600), TermiosBaud::B921600);
    }
}

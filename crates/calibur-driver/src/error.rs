//! 驱动层错误类型定义

use calibur_protocol::ProtocolError;
use calibur_serial::SerialError;
use calibur_tools::ConfigError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 串口链路错误
    #[error("Serial link error: {0}")]
    Serial(#[from] SerialError),

    /// 协议编解码错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 状态估计器初始化失败（致命）
    ///
    /// 没有估计器，下游的瞄准阶段无法工作，因此不会启动任何线程。
    #[error("Estimator initialization failed: {0}")]
    EstimatorInit(String),

    /// 工作线程创建失败
    #[error("Failed to spawn worker thread: {0}")]
    ThreadSpawn(String),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Builder 缺少必需组件
    #[error("Missing component: {0}")]
    MissingComponent(&'static str),
}

/// 外部设备（相机、IMU）错误
#[derive(Error, Debug)]
pub enum DeviceError {
    /// 本周期没有新数据（正常现象）
    #[error("Device read timeout")]
    Timeout,

    /// 设备断开
    #[error("Device disconnected: {0}")]
    Disconnected(String),

    #[error("Device IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 测试 DriverError 的 Display 实现
    #[test]
    fn test_driver_error_display() {
        let driver_error = DriverError::EstimatorInit("no particles".to_string());
        let msg = format!("{}", driver_error);
        assert!(msg.contains("Estimator") && msg.contains("no particles"));

        let driver_error = DriverError::MissingComponent("camera");
        assert_eq!(format!("{}", driver_error), "Missing component: camera");

        let driver_error = DriverError::ThreadSpawn("resource busy".to_string());
        assert!(format!("{}", driver_error).contains("resource busy"));
    }

    /// 测试 From<SerialError> 转换
    #[test]
    fn test_from_serial_error() {
        let driver_error: DriverError = SerialError::NotOpen.into();
        assert!(matches!(driver_error, DriverError::Serial(SerialError::NotOpen)));
    }

    /// 测试 From<ProtocolError> 转换
    #[test]
    fn test_from_protocol_error() {
        let protocol_error = ProtocolError::InvalidHeader { header: 0x55 };
        let driver_error: DriverError = protocol_error.into();
        match driver_error {
            DriverError::Protocol(ProtocolError::InvalidHeader { header }) => {
                assert_eq!(header, 0x55)
            },
            _ => panic!("Expected Protocol variant"),
        }
    }

    #[test]
    fn test_device_error_display() {
        assert_eq!(format!("{}", DeviceError::Timeout), "Device read timeout");
        let e = DeviceError::Disconnected("usb unplugged".into());
        assert!(format!("{}", e).contains("usb unplugged"));
    }
}

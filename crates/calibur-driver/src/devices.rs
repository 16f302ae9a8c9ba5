//! 外部设备抽象
//!
//! 相机与 IMU 驱动以 trait 注入，流水线本身不依赖任何具体 SDK。
//! 这里提供的桩实现只用于无硬件运行和测试。

use crate::error::DeviceError;
use crate::state::{Frame, Orientation};
use std::time::{Duration, Instant};

/// 相机
pub trait Camera: Send {
    /// 采集一帧（可以阻塞到下一帧到达）
    fn grab(&mut self) -> Result<Frame, DeviceError>;
}

/// 惯性测量单元
pub trait Imu: Send {
    /// 读取当前姿态（roll/pitch/yaw，单位：度）
    fn read(&mut self) -> Result<Orientation, DeviceError>;
}

impl<T: Camera + ?Sized> Camera for Box<T> {
    fn grab(&mut self) -> Result<Frame, DeviceError> {
        (**self).grab()
    }
}

impl<T: Imu + ?Sized> Imu for Box<T> {
    fn read(&mut self) -> Result<Orientation, DeviceError> {
        (**self).read()
    }
}

/// 桩相机：按固定帧间隔输出全零图像
#[derive(Debug, Clone)]
pub struct StubCamera {
    width: u32,
    height: u32,
    interval: Duration,
}

impl StubCamera {
    /// 默认帧间隔（约 100 fps）
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(10);

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            interval: Self::DEFAULT_INTERVAL,
        }
    }

    /// 设置帧间隔（`Duration::ZERO` 表示不等待）
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl Default for StubCamera {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

impl Camera for StubCamera {
    fn grab(&mut self) -> Result<Frame, DeviceError> {
        if !self.interval.is_zero() {
            spin_sleep::sleep(self.interval);
        }
        Ok(Frame {
            timestamp: Instant::now(),
            width: self.width,
            height: self.height,
            data: vec![0u8; self.width as usize * self.height as usize * 3],
        })
    }
}

/// 桩 IMU：始终返回零姿态
#[derive(Debug, Clone)]
pub struct StubImu {
    interval: Duration,
}

impl StubImu {
    /// 默认采样间隔（1 kHz）
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1);

    pub fn new() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl Default for StubImu {
    fn default() -> Self {
        Self::new()
    }
}

impl Imu for StubImu {
    fn read(&mut self) -> Result<Orientation, DeviceError> {
        if !self.interval.is_zero() {
            spin_sleep::sleep(self.interval);
        }
        Ok(Orientation::identity(Instant::now()))
    }
}

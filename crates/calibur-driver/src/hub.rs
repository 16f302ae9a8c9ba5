//! 共享状态中心
//!
//! 每个流水线阶段的最新输出存放在一个带版本号的槽位中。
//!
//! **同步机制**：值和版本号放在同一个 `Versioned` 结构里，由一次 `ArcSwapOption` 交换整体安装，
//! 读者永远不会看到"新版本号 + 旧值"或"旧版本号 + 新值"的组合。
//!
//! 这是"最新值"通道而不是队列：慢速消费者可能跳过中间版本，但永远不会重复处理同一个版本。

use crate::state::{AimOutput, Frame, Orientation, RobotState};
use arc_swap::ArcSwapOption;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// 带版本号的不可变快照
#[derive(Debug)]
pub struct Versioned<T> {
    /// 版本号（从 1 开始，每次发布 +1）
    pub version: u64,
    value: Arc<T>,
}

impl<T> Versioned<T> {
    /// 共享所有权的值句柄
    pub fn value(&self) -> &Arc<T> {
        &self.value
    }
}

impl<T> Deref for Versioned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// 单生产者、多读者的最新值槽位
#[derive(Debug)]
pub struct Slot<T> {
    inner: ArcSwapOption<Versioned<T>>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            inner: ArcSwapOption::const_empty(),
        }
    }
}

impl<T> Slot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 发布新值，返回新版本号
    ///
    /// 值先完整构造并装入 `Arc`，再与版本号一起原子安装。
    pub fn publish(&self, value: T) -> u64 {
        let value = Arc::new(value);
        let previous = self.inner.rcu(|current| {
            let version = current.as_ref().map_or(0, |v| v.version) + 1;
            Some(Arc::new(Versioned {
                version,
                value: Arc::clone(&value),
            }))
        });
        previous.map_or(0, |v| v.version) + 1
    }

    /// 当前快照（从未发布时为 `None`），不阻塞
    pub fn snapshot(&self) -> Option<Arc<Versioned<T>>> {
        self.inner.load_full()
    }

    /// 当前版本号（0 表示从未发布）
    pub fn version(&self) -> u64 {
        (*self.inner.load()).as_ref().map_or(0, |v| v.version)
    }
}

/// 消费者游标
///
/// 记录上一次消费的版本号，只在出现新版本时返回快照。
#[derive(Debug)]
pub struct SlotReader<T> {
    last_version: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for SlotReader<T> {
    fn default() -> Self {
        Self {
            last_version: 0,
            _marker: PhantomData,
        }
    }
}

impl<T> SlotReader<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 有新版本时返回最新快照，否则返回 `None`
    pub fn poll(&mut self, slot: &Slot<T>) -> Option<Arc<Versioned<T>>> {
        let snapshot = slot.snapshot()?;
        if snapshot.version == self.last_version {
            return None;
        }
        self.last_version = snapshot.version;
        Some(snapshot)
    }

    pub fn last_version(&self) -> u64 {
        self.last_version
    }
}

/// 跨线程共享的标量
///
/// 弹速以 f32 位模式存放在 `AtomicU32` 中。0.0 表示尚未测得。
#[derive(Debug, Default)]
pub struct SharedScalars {
    bullet_speed_bits: AtomicU32,
}

impl SharedScalars {
    /// 写入最新测得的弹速（m/s）
    pub fn set_bullet_speed(&self, speed: f32) {
        self.bullet_speed_bits.store(speed.to_bits(), Ordering::Relaxed);
    }

    pub fn bullet_speed(&self) -> f32 {
        f32::from_bits(self.bullet_speed_bits.load(Ordering::Relaxed))
    }
}

/// 流水线共享状态
///
/// 每个槽位只有一个生产者：
///
/// | 槽位 | 生产者 | 消费者 |
/// |---|---|---|
/// | `frame` | 采集线程 | 感知线程 |
/// | `orientation` | 姿态线程 | 感知、瞄准、发送线程 |
/// | `robot_raw` | 感知线程 | 估计线程 |
/// | `robot_smoothed` | 估计线程 | 瞄准线程 |
/// | `aim` | 瞄准线程 | 发送线程 |
#[derive(Debug, Default)]
pub struct SharedHub {
    pub frame: Slot<Frame>,
    pub orientation: Slot<Orientation>,
    pub robot_raw: Slot<RobotState>,
    pub robot_smoothed: Slot<RobotState>,
    pub aim: Slot<AimOutput>,
    pub scalars: SharedScalars,
}

impl SharedHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// 最新姿态（可能不存在）
    pub fn latest_orientation(&self) -> Option<Arc<Versioned<Orientation>>> {
        self.orientation.snapshot()
    }
}

//! 流水线对外句柄
//!
//! [`Turret`] 持有共享状态与全部工作线程。Drop 时清除运行标志并在超时内回收线程。

use crate::hub::SharedHub;
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::state::{AimOutput, RobotState};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use tracing::{error, info};

/// 带超时的 join
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();

        // 看门狗线程代为 join，主线程只等待通道
        spawn(move || {
            let result = self.join();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            // 超时后看门狗线程继续运行，进程退出时由操作系统回收
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 运行中的瞄准流水线
///
/// 通过 [`TurretBuilder`](crate::TurretBuilder) 创建。
pub struct Turret {
    hub: Arc<SharedHub>,
    metrics: Arc<PipelineMetrics>,
    is_running: Arc<AtomicBool>,
    threads: Vec<(&'static str, JoinHandle<()>)>,
    join_timeout: Duration,
}

impl Turret {
    pub(crate) fn new(
        hub: Arc<SharedHub>,
        metrics: Arc<PipelineMetrics>,
        is_running: Arc<AtomicBool>,
        join_timeout: Duration,
    ) -> Self {
        Self {
            hub,
            metrics,
            is_running,
            threads: Vec::new(),
            join_timeout,
        }
    }

    pub(crate) fn attach(&mut self, name: &'static str, handle: JoinHandle<()>) {
        self.threads.push((name, handle));
    }

    /// 共享状态（可用于外部观察各阶段输出）
    pub fn hub(&self) -> &Arc<SharedHub> {
        &self.hub
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 写入测得的弹速（m/s），瞄准线程在下一次求解时滤波
    pub fn set_bullet_speed(&self, speed: f32) {
        self.hub.scalars.set_bullet_speed(speed);
    }

    /// 最新瞄准输出
    pub fn latest_aim(&self) -> Option<AimOutput> {
        self.hub.aim.snapshot().map(|v| (**v).clone())
    }

    /// 最新平滑状态
    pub fn latest_state(&self) -> Option<RobotState> {
        self.hub.robot_smoothed.snapshot().map(|v| (**v).clone())
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// 正在运行的线程名
    pub fn thread_names(&self) -> Vec<&'static str> {
        self.threads.iter().map(|(name, _)| *name).collect()
    }

    /// 停止所有工作线程并等待退出（可重复调用）
    pub fn stop(&mut self) {
        // Release: 之前的写入对看到 false 的线程可见
        self.is_running.store(false, Ordering::Release);

        if self.threads.is_empty() {
            return;
        }

        for (name, handle) in self.threads.drain(..) {
            if let Err(_e) = handle.join_timeout(self.join_timeout) {
                error!(
                    "{} thread panicked or failed to shut down within {:?}",
                    name, self.join_timeout
                );
            }
        }
        info!("Turret pipeline stopped");
    }
}

impl Drop for Turret {
    fn drop(&mut self) {
        self.stop();
    }
}

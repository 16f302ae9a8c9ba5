//! 测试用内存链路
//!
//! 克隆出的句柄共享同一份内部状态，测试可以在链路被移动进工作线程后继续检查发送记录。

use crate::{SerialAdapter, SerialError, check_full_write};
use calibur_protocol::{AIM_PACKET_LEN, AimPacket};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MockState {
    sent: Vec<[u8; AIM_PACKET_LEN]>,
    rx: VecDeque<u8>,
    fail_writes: usize,
    short_write: Option<usize>,
}

/// 内存串口链路
#[derive(Debug, Clone, Default)]
pub struct MockSerialAdapter {
    state: Arc<Mutex<MockState>>,
}

impl MockSerialAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // 测试线程 panic 后继续使用内部数据
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 让接下来的 `count` 次写入返回 IO 错误
    pub fn fail_next_writes(&self, count: usize) {
        self.lock().fail_writes = count;
    }

    /// 让每次写入只写出 `written` 字节（`None` 恢复正常）
    pub fn set_short_write(&self, written: Option<usize>) {
        self.lock().short_write = written;
    }

    /// 注入下位机发来的字节
    pub fn push_rx(&self, bytes: &[u8]) {
        self.lock().rx.extend(bytes.iter().copied());
    }

    /// 已成功发送的原始包
    pub fn sent_packets(&self) -> Vec<[u8; AIM_PACKET_LEN]> {
        self.lock().sent.clone()
    }

    /// 已成功发送并解码后的指令
    pub fn sent_aims(&self) -> Vec<AimPacket> {
        self.lock()
            .sent
            .iter()
            .filter_map(|p| AimPacket::decode(p).ok())
            .collect()
    }
}

impl SerialAdapter for MockSerialAdapter {
    fn write_packet(&mut self, packet: &[u8; AIM_PACKET_LEN]) -> Result<(), SerialError> {
        let mut state = self.lock();
        if state.fail_writes > 0 {
            state.fail_writes -= 1;
            return Err(SerialError::Io(std::io::Error::other("mock write failure")));
        }
        if let Some(written) = state.short_write {
            return check_full_write(written);
        }
        state.sent.push(*packet);
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        let mut state = self.lock();
        let n = buf.len().min(state.rx.len());
        for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

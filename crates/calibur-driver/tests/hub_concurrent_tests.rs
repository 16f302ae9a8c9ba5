//! 共享状态中心并发测试
//!
//! 验证多线程下槽位的版本号与值不会被读者看到错位的组合。

use calibur_driver::{Slot, SlotReader};
use std::sync::Arc;
use std::thread;

/// 值里携带写入时的序号，读者校验版本号与值一致
#[test]
fn test_version_and_value_never_torn() {
    let slot: Arc<Slot<(u64, [u64; 8])>> = Arc::new(Slot::new());
    let writes = 5000u64;

    let writer_slot = slot.clone();
    let writer = thread::spawn(move || {
        for i in 1..=writes {
            // 单生产者：第 i 次发布的版本号就是 i
            let version = writer_slot.publish((i, [i; 8]));
            assert_eq!(version, i);
            if i % 64 == 0 {
                thread::yield_now();
            }
        }
    });

    let mut readers = Vec::new();
    for _ in 0..4 {
        let slot = slot.clone();
        readers.push(thread::spawn(move || {
            let mut last = 0u64;
            while last < writes {
                if let Some(snapshot) = slot.snapshot() {
                    let (seq, payload) = **snapshot;
                    assert_eq!(snapshot.version, seq);
                    assert!(payload.iter().all(|&v| v == seq));
                    assert!(snapshot.version >= last, "version went backwards");
                    last = snapshot.version;
                }
                thread::yield_now();
            }
        }));
    }

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}

/// 慢速消费者可以跳过版本，但永远不会重复消费
#[test]
fn test_reader_never_consumes_twice() {
    let slot: Arc<Slot<u64>> = Arc::new(Slot::new());
    let writes = 2000u64;

    let writer_slot = slot.clone();
    let writer = thread::spawn(move || {
        for i in 1..=writes {
            writer_slot.publish(i);
            thread::yield_now();
        }
    });

    let mut reader = SlotReader::new();
    let mut seen = Vec::new();
    while reader.last_version() < writes {
        if let Some(snapshot) = reader.poll(&slot) {
            seen.push(snapshot.version);
        }
    }
    writer.join().unwrap();

    assert!(seen.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(seen.last().copied(), Some(writes));
    assert!(reader.poll(&slot).is_none());
}

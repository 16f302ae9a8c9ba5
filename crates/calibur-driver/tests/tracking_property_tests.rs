//! 目标跟踪属性测试

use calibur_driver::geometry::{angular_distance, wrap_pi};
use calibur_driver::perception::disambiguate_yaw;
use calibur_driver::{ArmorGroup, Detection, RobotId, TargetSelector};
use nalgebra::Vector3;
use proptest::prelude::*;
use smallvec::smallvec;
use std::f32::consts::{FRAC_PI_2, PI};

fn group(id: u32, z: f32) -> ArmorGroup {
    ArmorGroup {
        robot_id: RobotId(id),
        armors: smallvec![Detection::new(RobotId(id), Vector3::new(0.0, 0.0, z), 0.0)],
    }
}

proptest! {
    /// ⌈T/Δt⌉ 次连续缺失后失锁，少一次仍保持锁定
    #[test]
    fn prop_tracking_hysteresis(
        ttl in 0.1f64..2.0,
        k in 2u32..200,
        frac in 0.01f64..=1.0,
    ) {
        // 选 Δt 使 ⌈T/Δt⌉ = k
        let dt = ttl / ((k - 1) as f64 + frac);
        let mut selector = TargetSelector::new(ttl);
        selector.update(vec![group(5, 3.0)], dt);
        prop_assert_eq!(selector.target(), Some(RobotId(5)));

        for _ in 0..k - 1 {
            selector.update(Vec::new(), dt);
            prop_assert_eq!(selector.target(), Some(RobotId(5)));
        }
        selector.update(Vec::new(), dt);
        prop_assert_eq!(selector.target(), None);
    }

    /// 消歧结果是四个候选中回绕距离最小的一个，且落在 [-π, π]
    #[test]
    fn prop_yaw_disambiguation_is_nearest(
        previous in -10.0f32..10.0,
        observed in -10.0f32..10.0,
    ) {
        let candidate = disambiguate_yaw(previous, observed);
        prop_assert!((-PI..=PI).contains(&candidate.yaw));

        let best = [0i32, 1, -1, 2]
            .iter()
            .map(|&j| angular_distance(wrap_pi(previous + j as f32 * FRAC_PI_2), observed))
            .fold(f32::INFINITY, f32::min);
        let chosen = angular_distance(candidate.yaw, observed);
        prop_assert!((chosen - best).abs() < 1e-4);
    }
}

/// 场景：TTL 1.0 s，Δt 0.02 s，49 次缺失保持锁定，第 50 次失锁并重新选择
#[test]
fn test_scenario_lock_hold_and_reselect() {
    let dt = 0.02;
    let mut selector = TargetSelector::new(1.0);
    selector.update(vec![group(5, 3.0)], dt);

    for _ in 0..49 {
        let selection = selector.update(vec![group(7, 4.0)], dt);
        assert_eq!(selection.event.target(), Some(RobotId(5)));
        assert!(selection.armors.is_empty());
    }

    let selection = selector.update(vec![group(7, 4.0)], dt);
    assert_eq!(selection.event.target(), Some(RobotId(7)));
    assert_eq!(selection.event.dropped(), Some(RobotId(5)));
    assert_eq!(selection.armors.len(), 1);
}

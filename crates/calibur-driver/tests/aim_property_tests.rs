//! 弹道预测属性测试

use calibur_driver::aim::{bullet_drop, solve_lead};
use calibur_driver::{RobotId, RobotState};
use nalgebra::Vector3;
use proptest::prelude::*;
use std::time::Instant;

proptest! {
    /// 下坠量对距离单调不减，对弹速单调不增
    #[test]
    fn prop_drop_monotonic(
        d1 in 0.0f32..20.0,
        d2 in 0.0f32..20.0,
        v1 in 5.0f32..40.0,
        v2 in 5.0f32..40.0,
    ) {
        let (near, far) = if d1 <= d2 { (d1, d2) } else { (d2, d1) };
        let (slow, fast) = if v1 <= v2 { (v1, v2) } else { (v2, v1) };
        prop_assert!(bullet_drop(near, slow, 9.81) <= bullet_drop(far, slow, 9.81));
        prop_assert!(bullet_drop(far, fast, 9.81) <= bullet_drop(far, slow, 9.81));
    }

    /// 迭代次数永远不超过上限
    #[test]
    fn prop_lead_iterations_bounded(
        x in -5.0f32..5.0,
        z in 1.0f32..10.0,
        vx in -5.0f32..5.0,
        vz in -5.0f32..5.0,
        yaw_rate in -10.0f32..10.0,
        speed in 10.0f32..30.0,
        cap in 0u32..20,
    ) {
        let mut state = RobotState::at_rest(
            RobotId(1),
            Vector3::new(x, 0.0, z),
            0.0,
            0.25,
            Instant::now(),
        );
        state.velocity = Vector3::new(vx, 0.0, vz);
        state.yaw_rate = yaw_rate;

        let lead = solve_lead(&state, speed, 0.15, 0.01, cap);
        prop_assert!(lead.iterations <= cap);
        prop_assert!(lead.converged || lead.iterations == cap);
        prop_assert!(lead.lead_time.is_finite());
    }
}

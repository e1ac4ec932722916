//! 集成测试共享工具模块
//!
//! 提供可计数、可注入失败的资源、回调与协作方模拟实现

#![allow(dead_code)]

pub mod assertions;
pub mod mocks;

use std::sync::Arc;

use xa_coordinator::transaction::{CoordinatorConfig, TwoPhaseCoordinator};

use mocks::MockNotifier;

/// 创建测试用2PC协调器
pub fn create_test_coordinator() -> Arc<TwoPhaseCoordinator> {
    Arc::new(TwoPhaseCoordinator::new(CoordinatorConfig::default()).expect("创建协调器失败"))
}

/// 创建带通知器的测试用2PC协调器
pub fn create_test_coordinator_with_notifier(notifier: Arc<MockNotifier>) -> Arc<TwoPhaseCoordinator> {
    Arc::new(
        TwoPhaseCoordinator::new(CoordinatorConfig::default())
            .expect("创建协调器失败")
            .with_notifier(notifier),
    )
}

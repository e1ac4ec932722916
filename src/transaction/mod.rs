//! 分布式事务资源管理模块
//!
//! 跟踪登记到同一分布式事务中的参与者，包括：
//! - 按组合键（全局事务ID + 事务块ID）注册资源与回调
//! - 对支持两阶段的资源执行XA准备/提交/回滚，对其他资源执行本地提交/回滚
//! - 本地参与者与失败上报的跟踪
//! - XA分支的开始与结束
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use xa_coordinator::transaction::TwoPhaseCoordinator;
//!
//! let coordinator = TwoPhaseCoordinator::default();
//! coordinator.register("G1", "B1", connection);
//! coordinator.begin_branch("G1", "B1", xa_resource)?;
//!
//! // 执行操作...
//!
//! coordinator.end_branch("G1", "B1")?;
//! if coordinator.prepare("G1", "B1") {
//!     coordinator.notify_commit("G1", "B1")?;
//! } else {
//!     coordinator.notify_abort("G1", "B1", false)?;
//! }
//! ```

pub mod handler;
pub mod participant;
pub mod registry;
pub mod resource;
pub mod two_phase;
pub mod types;
pub mod xid;

pub use handler::{TransactionBeginNotifier, TransactionHandler, TransactionLocalContext};
pub use participant::ParticipantTracker;
pub use registry::{HandlerRef, ResourceRef, TransactionRegistry};
pub use resource::{ResourceContext, XaResource};
pub use two_phase::TwoPhaseCoordinator;
pub use types::*;
pub use xid::{XaFlags, Xid, XidGenerator};

/// 以给定配置创建共享的协调器
pub fn create_coordinator(
    config: CoordinatorConfig,
) -> Result<std::sync::Arc<TwoPhaseCoordinator>, TransactionError> {
    TwoPhaseCoordinator::new(config).map(std::sync::Arc::new)
}

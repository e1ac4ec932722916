//! 参与事务的资源接口
//!
//! `ResourceContext` 是对单个参与资源（如数据库连接）的统一封装，
//! 支持两阶段提交的资源通过 `xa_resource` 暴露 `XaResource`

use crate::transaction::types::{ResourceError, XaError};
use crate::transaction::xid::{XaFlags, Xid};

/// 两阶段（XA）资源接口
pub trait XaResource: Send + Sync {
    /// 准备阶段1：投票是否可以提交
    fn prepare(&self, xid: &Xid) -> Result<(), XaError>;

    /// 提交阶段2
    fn commit(&self, xid: &Xid, one_phase: bool) -> Result<(), XaError>;

    /// 回滚分支
    fn rollback(&self, xid: &Xid) -> Result<(), XaError>;

    /// 开始分支关联
    fn start(&self, xid: &Xid, flags: XaFlags) -> Result<(), XaError>;

    /// 结束分支关联
    fn end(&self, xid: &Xid, flags: XaFlags) -> Result<(), XaError>;
}

/// 资源上下文
///
/// 每个上下文在事务结束时只会被终结一次：先提交或回滚，再关闭
pub trait ResourceContext: Send + Sync {
    /// 两阶段能力，不支持时返回 `None`
    fn xa_resource(&self) -> Option<&dyn XaResource>;

    /// 本地提交（单阶段资源）
    fn commit(&self) -> Result<(), ResourceError>;

    /// 本地回滚（单阶段资源）
    fn rollback(&self) -> Result<(), ResourceError>;

    /// 释放底层资源，无论提交结果如何都会调用
    fn close(&self);

    fn has_two_phase_capability(&self) -> bool {
        self.xa_resource().is_some()
    }
}

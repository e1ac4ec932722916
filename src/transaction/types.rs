//! 事务资源管理类型定义
//!
//! 提供组合键、两阶段状态以及各类错误类型

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 全局事务ID与事务块ID之间的分隔符
pub const KEY_SEPARATOR: char = ':';

/// 组合键：`全局事务ID:事务块ID`
///
/// 注册表中所有按键查找的结构都使用该键
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CombinedKey(String);

impl CombinedKey {
    /// 由全局事务ID和事务块ID生成组合键
    pub fn new(global_id: &str, block_id: &str) -> Self {
        Self(format!("{}{}{}", global_id, KEY_SEPARATOR, block_id))
    }

    /// 获取字符串形式
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CombinedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 单个组合键上的两阶段状态
///
/// 只有存在支持两阶段的资源时才会经过 `Prepared`/`PrepareFailed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TwoPhaseState {
    /// 尚无任何注册
    Unstarted,
    /// 已有资源注册
    Registered,
    /// 所有两阶段资源准备成功
    Prepared,
    /// 准备阶段失败
    PrepareFailed,
    /// 已提交
    Committed,
    /// 已中止
    Aborted,
    /// 状态已清除
    Purged,
}

impl TwoPhaseState {
    /// 检查是否可以进入准备阶段
    pub fn can_prepare(&self) -> bool {
        matches!(self, TwoPhaseState::Unstarted | TwoPhaseState::Registered)
    }

    /// 检查是否已结束
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TwoPhaseState::Committed | TwoPhaseState::Aborted | TwoPhaseState::Purged
        )
    }
}

impl fmt::Display for TwoPhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TwoPhaseState::Unstarted => write!(f, "Unstarted"),
            TwoPhaseState::Registered => write!(f, "Registered"),
            TwoPhaseState::Prepared => write!(f, "Prepared"),
            TwoPhaseState::PrepareFailed => write!(f, "PrepareFailed"),
            TwoPhaseState::Committed => write!(f, "Committed"),
            TwoPhaseState::Aborted => write!(f, "Aborted"),
            TwoPhaseState::Purged => write!(f, "Purged"),
        }
    }
}

// X/Open XA 错误码
pub const XAER_ASYNC: i32 = -2;
pub const XAER_RMERR: i32 = -3;
pub const XAER_NOTA: i32 = -4;
pub const XAER_INVAL: i32 = -5;
pub const XAER_PROTO: i32 = -6;
pub const XAER_RMFAIL: i32 = -7;
pub const XAER_DUPID: i32 = -8;
pub const XAER_OUTSIDE: i32 = -9;
pub const XA_RBROLLBACK: i32 = 100;
pub const XA_RBCOMMFAIL: i32 = 101;
pub const XA_RBDEADLOCK: i32 = 102;
pub const XA_RBTIMEOUT: i32 = 106;
pub const XA_RBTRANSIENT: i32 = 107;

/// 两阶段资源返回的协议错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("XA错误 (code {code}): {message}")]
pub struct XaError {
    pub code: i32,
    pub message: String,
}

impl XaError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// 是否为回滚类错误（`XA_RB*`）
    pub fn is_rollback(&self) -> bool {
        (XA_RBROLLBACK..=XA_RBTRANSIENT).contains(&self.code)
    }
}

/// 单阶段资源的本地提交/回滚错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("资源操作失败: {0}")]
pub struct ResourceError(pub String);

/// 提交/中止回调执行错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("回调执行失败: {0}")]
pub struct HandlerError(pub String);

/// 事务开始通知错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("事务开始通知失败: {0}")]
pub struct NotifyError(pub String);

/// 事务错误类型
#[derive(Error, Debug, Clone)]
pub enum TransactionError {
    #[error("启动XA事务失败: id: {key} error: {message}")]
    BranchStartFailed { key: CombinedKey, message: String },

    #[error("结束XA事务失败: id: {key} error: {message}")]
    BranchEndFailed { key: CombinedKey, message: String },

    #[error("事务回调执行失败: id: {key} error: {message}")]
    HandlerFailed { key: CombinedKey, message: String },

    #[error("参与者注册通知失败: block: {block} error: {message}")]
    NotificationFailed { block: String, message: String },

    #[error("无效的XID: {0}")]
    InvalidXid(String),

    #[error("配置错误: {0}")]
    Config(String),
}

impl TransactionError {
    /// 检查是否为不可恢复的分支协议错误
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransactionError::BranchStartFailed { .. } | TransactionError::BranchEndFailed { .. }
        )
    }
}

/// 事务资源管理器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// 生成XID时使用的格式ID
    pub xid_format_id: i32,
    /// 登记本地参与者时传给 `begin_transaction_block` 的深度
    pub participant_block_depth: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            xid_format_id: 1,
            participant_block_depth: 1,
        }
    }
}

impl CoordinatorConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.xid_format_id < 0 {
            return Err(TransactionError::Config(format!(
                "xid_format_id 不能为负数: {}",
                self.xid_format_id
            )));
        }
        if self.participant_block_depth == 0 {
            return Err(TransactionError::Config(
                "participant_block_depth 必须大于0".to_string(),
            ));
        }
        Ok(())
    }
}

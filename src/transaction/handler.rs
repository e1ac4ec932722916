//! 回调与调用方协作接口
//!
//! 提交/中止回调、调用方本地事务上下文以及事务开始通知均以trait注入

use crate::transaction::types::{CombinedKey, HandlerError, NotifyError};

/// 提交或中止时执行的回调
///
/// 参数为组合键，回调失败会返回给调用方
pub trait TransactionHandler: Send + Sync {
    fn invoke(&self, key: &CombinedKey) -> Result<(), HandlerError>;
}

impl<F> TransactionHandler for F
where
    F: Fn(&CombinedKey) -> Result<(), HandlerError> + Send + Sync,
{
    fn invoke(&self, key: &CombinedKey) -> Result<(), HandlerError> {
        self(key)
    }
}

/// 调用方的本地事务上下文
pub trait TransactionLocalContext {
    /// 在调用方自身的记录中标记事务块已开始
    fn begin_transaction_block(&mut self, block_id: &str, depth: usize);

    fn global_transaction_id(&self) -> &str;

    /// 远程协调者地址
    fn url(&self) -> &str;

    /// 协调协议名称
    fn protocol(&self) -> &str;
}

/// 事务开始通知
///
/// 向远程协调者登记参与者，返回的确认值只用于日志
pub trait TransactionBeginNotifier: Send + Sync {
    fn notify_transaction_begin(
        &self,
        global_id: &str,
        url: &str,
        block_id: &str,
        protocol: &str,
    ) -> Result<Vec<String>, NotifyError>;
}

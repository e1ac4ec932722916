//! 两阶段提交（2PC）协调器模块
//!
//! 在注册表与参与者跟踪器之上实现注册、准备、提交、中止以及XA分支的开始与结束。
//!
//! 准备阶段遇到第一个失败即返回；提交与中止阶段则会让每个资源都完成终结并关闭，
//! 单个资源的失败只会使整体结果变为 `false`。

use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::transaction::handler::{TransactionBeginNotifier, TransactionLocalContext};
use crate::transaction::registry::{HandlerRef, ResourceRef, TransactionRegistry};
use crate::transaction::participant::ParticipantTracker;
use crate::transaction::resource::{ResourceContext, XaResource};
use crate::transaction::types::{CombinedKey, CoordinatorConfig, TransactionError, TwoPhaseState};
use crate::transaction::xid::{XaFlags, Xid, XidGenerator};

/// 2PC协调器
///
/// 由执行引擎显式创建并以 `Arc` 共享。同一组合键上的
/// 注册、准备、提交/中止须由调用方按顺序发起，协调器本身不做串行化。
pub struct TwoPhaseCoordinator {
    config: CoordinatorConfig,
    registry: TransactionRegistry,
    participants: ParticipantTracker,
    notifier: Option<Arc<dyn TransactionBeginNotifier>>,
}

impl TwoPhaseCoordinator {
    /// 创建新的2PC协调器
    pub fn new(config: CoordinatorConfig) -> Result<Self, TransactionError> {
        config.validate()?;
        Ok(Self {
            registry: TransactionRegistry::new(XidGenerator::new(config.xid_format_id)),
            participants: ParticipantTracker::new(),
            notifier: None,
            config,
        })
    }

    /// 设置事务开始通知器
    pub fn with_notifier(mut self, notifier: Arc<dyn TransactionBeginNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// 注册参与资源
    ///
    /// # Arguments
    /// * `global_id` - 全局事务ID
    /// * `block_id` - 事务块ID
    /// * `context` - 资源上下文，同一资源可以重复注册
    pub fn register(&self, global_id: &str, block_id: &str, context: ResourceRef) {
        self.registry
            .register(CombinedKey::new(global_id, block_id), context);
    }

    /// 注册提交回调
    pub fn register_committed_function(&self, global_id: &str, block_id: &str, handler: HandlerRef) {
        self.registry
            .register_committed_handler(CombinedKey::new(global_id, block_id), handler);
    }

    /// 注册中止回调
    pub fn register_aborted_function(&self, global_id: &str, block_id: &str, handler: HandlerRef) {
        self.registry
            .register_aborted_handler(CombinedKey::new(global_id, block_id), handler);
    }

    /// 登记本地参与者
    ///
    /// 记录参与者、保存回调、在调用方上下文中开始事务块，并通知远程协调者。
    /// 通知的确认值只写入日志。
    pub fn register_participation(
        &self,
        global_id: &str,
        block_id: &str,
        committed: HandlerRef,
        aborted: HandlerRef,
        local_context: &mut dyn TransactionLocalContext,
    ) -> Result<(), TransactionError> {
        self.participants.add_participant(global_id, block_id);
        self.register_committed_function(global_id, block_id, committed);
        self.register_aborted_function(global_id, block_id, aborted);
        local_context.begin_transaction_block(block_id, self.config.participant_block_depth);

        let Some(notifier) = &self.notifier else {
            warn!("未配置事务开始通知器, 跳过参与者通知: {}", block_id);
            return Ok(());
        };

        let ack = notifier
            .notify_transaction_begin(
                local_context.global_transaction_id(),
                local_context.url(),
                block_id,
                local_context.protocol(),
            )
            .map_err(|e| TransactionError::NotificationFailed {
                block: block_id.to_string(),
                message: e.to_string(),
            })?;
        info!(
            "participant registered: {}",
            ack.first().map(String::as_str).unwrap_or("")
        );
        Ok(())
    }

    /// 准备阶段
    ///
    /// 逐个让两阶段资源准备，第一个失败即返回 `false`，后续资源不再准备。
    /// 资源全部成功时，若该全局事务已有资源或本地参与者上报的失败，仍返回 `false`。
    /// 失败时不清除任何状态。
    pub fn prepare(&self, global_id: &str, block_id: &str) -> bool {
        let key = CombinedKey::new(global_id, block_id);
        let xid = self.registry.xid(&key);

        for context in self.registry.resources(&key) {
            let Some(xa_resource) = context.xa_resource() else {
                continue;
            };
            let result = match &xid {
                Some(xid) => xa_resource.prepare(xid).map_err(|e| e.to_string()),
                None => Err("no xid registered for the transaction".to_string()),
            };
            if let Err(message) = result {
                error!("error in prepare the transaction, {}:{}", key, message);
                self.registry.set_state(&key, TwoPhaseState::PrepareFailed);
                return false;
            }
        }

        let status = !self.participants.has_failure(global_id);
        self.registry.set_state(
            &key,
            if status {
                TwoPhaseState::Prepared
            } else {
                TwoPhaseState::PrepareFailed
            },
        );
        info!(
            "Transaction prepare (participants): {}",
            if status { "success" } else { "failed" }
        );
        status
    }

    /// 提交阶段
    ///
    /// 每个资源都会尝试提交并关闭；之后执行提交回调并清除该键与全局事务的状态。
    ///
    /// # Returns
    /// * `Ok(true)` - 所有资源提交成功
    /// * `Ok(false)` - 至少一个资源提交失败
    /// * `Err(TransactionError::HandlerFailed)` - 提交回调失败，状态已清除
    pub fn notify_commit(&self, global_id: &str, block_id: &str) -> Result<bool, TransactionError> {
        let key = CombinedKey::new(global_id, block_id);
        let contexts = self
            .registry
            .take_for_termination(&key, TwoPhaseState::Committed);
        let xid = self.registry.xid(&key);

        let mut commit_success = true;
        for context in contexts {
            if let Err(message) = commit_resource(context.as_ref(), xid.as_ref()) {
                error!("error in commit the transaction, {}:{}", key, message);
                commit_success = false;
            }
            context.close();
        }

        let handler_result = self
            .registry
            .committed_handler(&key)
            .map_or(Ok(()), |handler| handler.invoke(&key));
        self.purge(global_id, &key, false);

        handler_result.map_err(|e| TransactionError::HandlerFailed {
            key,
            message: e.to_string(),
        })?;
        Ok(commit_success)
    }

    /// 中止阶段
    ///
    /// 每个资源都会尝试回滚并关闭。`is_retry_attempt` 为真时表示可重试事务块的
    /// 一次失败尝试，此时不执行中止回调；只有最终的中止才会通知。
    /// 状态清除与是否重试无关，但重试时回调登记会被保留。
    pub fn notify_abort(
        &self,
        global_id: &str,
        block_id: &str,
        is_retry_attempt: bool,
    ) -> Result<bool, TransactionError> {
        let key = CombinedKey::new(global_id, block_id);
        let contexts = self
            .registry
            .take_for_termination(&key, TwoPhaseState::Aborted);
        let xid = self.registry.xid(&key);

        let mut abort_success = true;
        for context in contexts {
            if let Err(message) = rollback_resource(context.as_ref(), xid.as_ref()) {
                error!("error in abort the transaction, {}:{}", key, message);
                abort_success = false;
            }
            context.close();
        }

        let handler_result = if is_retry_attempt {
            Ok(())
        } else {
            self.registry
                .aborted_handler(&key)
                .map_or(Ok(()), |handler| handler.invoke(&key))
        };
        self.purge(global_id, &key, is_retry_attempt);

        handler_result.map_err(|e| TransactionError::HandlerFailed {
            key,
            message: e.to_string(),
        })?;
        Ok(abort_success)
    }

    /// 开始XA分支
    ///
    /// 首次调用时为组合键生成XID。分支启动失败不可恢复，直接返回错误。
    pub fn begin_branch(
        &self,
        global_id: &str,
        block_id: &str,
        xa_resource: &dyn XaResource,
    ) -> Result<(), TransactionError> {
        let key = CombinedKey::new(global_id, block_id);
        let xid = self.registry.xid_or_create(&key);
        xa_resource
            .start(&xid, XaFlags::NoFlags)
            .map_err(|e| TransactionError::BranchStartFailed {
                key,
                message: e.to_string(),
            })
    }

    /// 结束XA分支
    ///
    /// 组合键已有XID时，对所有两阶段资源以成功标志结束分支关联
    pub fn end_branch(&self, global_id: &str, block_id: &str) -> Result<(), TransactionError> {
        let key = CombinedKey::new(global_id, block_id);
        let Some(xid) = self.registry.xid(&key) else {
            return Ok(());
        };

        for context in self.registry.resources(&key) {
            if let Some(xa_resource) = context.xa_resource() {
                xa_resource.end(&xid, XaFlags::Success).map_err(|e| {
                    TransactionError::BranchEndFailed {
                        key: key.clone(),
                        message: e.to_string(),
                    }
                })?;
            }
        }
        Ok(())
    }

    /// 回滚一次可重试的尝试：结束分支后以重试方式中止，不触发中止回调
    pub fn rollback_transaction(&self, global_id: &str, block_id: &str) -> Result<bool, TransactionError> {
        self.end_branch(global_id, block_id)?;
        self.notify_abort(global_id, block_id, true)
    }

    /// 上报资源参与逻辑中未捕获的失败
    pub fn notify_resource_failure(&self, global_id: &str) {
        self.participants.mark_resource_failure(global_id);
        info!("Trx infected callable unit excepted id : {}", global_id);
    }

    /// 上报本地参与者失败，非本事务参与者的上报被丢弃
    pub fn notify_local_participant_failure(&self, global_id: &str, block_id: &str) {
        if !self.participants.mark_local_failure(global_id, block_id) {
            debug!(
                "忽略非参与者的失败上报: global: {} block: {}",
                global_id, block_id
            );
        }
    }

    pub fn state(&self, global_id: &str, block_id: &str) -> TwoPhaseState {
        self.registry.state(&CombinedKey::new(global_id, block_id))
    }

    pub fn resource_count(&self, global_id: &str, block_id: &str) -> usize {
        self.registry
            .resource_count(&CombinedKey::new(global_id, block_id))
    }

    pub fn xid(&self, global_id: &str, block_id: &str) -> Option<Xid> {
        self.registry.xid(&CombinedKey::new(global_id, block_id))
    }

    pub fn is_local_participant(&self, global_id: &str, block_id: &str) -> bool {
        self.participants.is_participant(global_id, block_id)
    }

    pub fn has_resource_failure(&self, global_id: &str) -> bool {
        self.participants.has_resource_failure(global_id)
    }

    pub fn has_local_failure(&self, global_id: &str) -> bool {
        self.participants.has_local_failure(global_id)
    }

    /// 仍持有资源或XID的组合键
    pub fn active_keys(&self) -> Vec<CombinedKey> {
        self.registry.active_keys()
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    fn purge(&self, global_id: &str, key: &CombinedKey, keep_handlers: bool) {
        self.registry.purge(key, keep_handlers);
        self.participants.clear(global_id);
        debug!("transaction state purged: {}", key);
    }
}

impl Default for TwoPhaseCoordinator {
    fn default() -> Self {
        let config = CoordinatorConfig::default();
        Self {
            registry: TransactionRegistry::new(XidGenerator::new(config.xid_format_id)),
            participants: ParticipantTracker::new(),
            notifier: None,
            config,
        }
    }
}

fn commit_resource(context: &dyn ResourceContext, xid: Option<&Xid>) -> Result<(), String> {
    match (context.xa_resource(), xid) {
        (Some(xa_resource), Some(xid)) => xa_resource.commit(xid, false).map_err(|e| e.to_string()),
        (Some(_), None) => Err("no xid registered for the transaction".to_string()),
        (None, _) => context.commit().map_err(|e| e.to_string()),
    }
}

fn rollback_resource(context: &dyn ResourceContext, xid: Option<&Xid>) -> Result<(), String> {
    match (context.xa_resource(), xid) {
        (Some(xa_resource), Some(xid)) => xa_resource.rollback(xid).map_err(|e| e.to_string()),
        (Some(_), None) => Err("no xid registered for the transaction".to_string()),
        (None, _) => context.rollback().map_err(|e| e.to_string()),
    }
}

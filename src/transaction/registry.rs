//! 事务注册表
//!
//! 按组合键保存参与资源列表、XID以及提交/中止回调。
//! 所有表都基于 `DashMap` 分片，不同组合键上的操作互不阻塞。

use std::sync::Arc;

use dashmap::DashMap;

use crate::transaction::handler::TransactionHandler;
use crate::transaction::resource::ResourceContext;
use crate::transaction::types::{CombinedKey, TwoPhaseState};
use crate::transaction::xid::{Xid, XidGenerator};

/// 共享的资源上下文
pub type ResourceRef = Arc<dyn ResourceContext>;

/// 共享的回调
pub type HandlerRef = Arc<dyn TransactionHandler>;

/// 单个组合键的资源登记
struct ResourceEntry {
    contexts: Vec<ResourceRef>,
    state: TwoPhaseState,
}

/// 事务注册表
pub struct TransactionRegistry {
    /// 组合键 -> 资源列表
    resources: DashMap<CombinedKey, ResourceEntry>,
    /// 组合键 -> XID，每个键至多一个
    xids: DashMap<CombinedKey, Xid>,
    committed_handlers: DashMap<CombinedKey, HandlerRef>,
    aborted_handlers: DashMap<CombinedKey, HandlerRef>,
    xid_generator: XidGenerator,
}

impl TransactionRegistry {
    pub fn new(xid_generator: XidGenerator) -> Self {
        Self {
            resources: DashMap::new(),
            xids: DashMap::new(),
            committed_handlers: DashMap::new(),
            aborted_handlers: DashMap::new(),
            xid_generator,
        }
    }

    /// 追加资源上下文
    ///
    /// 不做去重，同一资源多次注册会被多次终结
    pub fn register(&self, key: CombinedKey, context: ResourceRef) {
        let mut entry = self.resources.entry(key).or_insert_with(|| ResourceEntry {
            contexts: Vec::new(),
            state: TwoPhaseState::Registered,
        });
        entry.contexts.push(context);
    }

    /// 登记提交回调，后写覆盖先写
    pub fn register_committed_handler(&self, key: CombinedKey, handler: HandlerRef) {
        self.committed_handlers.insert(key, handler);
    }

    /// 登记中止回调，后写覆盖先写
    pub fn register_aborted_handler(&self, key: CombinedKey, handler: HandlerRef) {
        self.aborted_handlers.insert(key, handler);
    }

    pub fn committed_handler(&self, key: &CombinedKey) -> Option<HandlerRef> {
        self.committed_handlers.get(key).map(|h| h.value().clone())
    }

    pub fn aborted_handler(&self, key: &CombinedKey) -> Option<HandlerRef> {
        self.aborted_handlers.get(key).map(|h| h.value().clone())
    }

    /// 获取资源列表快照
    ///
    /// 返回克隆的引用，调用资源时不持有分片锁
    pub fn resources(&self, key: &CombinedKey) -> Vec<ResourceRef> {
        self.resources
            .get(key)
            .map(|entry| entry.contexts.clone())
            .unwrap_or_default()
    }

    pub fn resource_count(&self, key: &CombinedKey) -> usize {
        self.resources
            .get(key)
            .map(|entry| entry.contexts.len())
            .unwrap_or(0)
    }

    /// 取出资源列表用于终结，并记录终态
    ///
    /// 列表被原地清空，同一上下文不会被第二次终结
    pub fn take_for_termination(&self, key: &CombinedKey, state: TwoPhaseState) -> Vec<ResourceRef> {
        match self.resources.get_mut(key) {
            Some(mut entry) => {
                entry.state = state;
                std::mem::take(&mut entry.contexts)
            }
            None => Vec::new(),
        }
    }

    pub fn xid(&self, key: &CombinedKey) -> Option<Xid> {
        self.xids.get(key).map(|xid| xid.value().clone())
    }

    /// 获取XID，不存在时生成
    pub fn xid_or_create(&self, key: &CombinedKey) -> Xid {
        self.xids
            .entry(key.clone())
            .or_insert_with(|| self.xid_generator.generate())
            .value()
            .clone()
    }

    /// 当前状态，没有登记的键视为 `Unstarted`
    pub fn state(&self, key: &CombinedKey) -> TwoPhaseState {
        self.resources
            .get(key)
            .map(|entry| entry.state)
            .unwrap_or(TwoPhaseState::Unstarted)
    }

    /// 更新已登记键的状态
    pub fn set_state(&self, key: &CombinedKey, state: TwoPhaseState) {
        if let Some(mut entry) = self.resources.get_mut(key) {
            entry.state = state;
        }
    }

    /// 清除组合键的全部登记
    ///
    /// `keep_handlers` 为真时保留回调，供重试后的最终中止使用
    pub fn purge(&self, key: &CombinedKey, keep_handlers: bool) {
        self.resources.remove(key);
        self.xids.remove(key);
        if !keep_handlers {
            self.committed_handlers.remove(key);
            self.aborted_handlers.remove(key);
        }
    }

    /// 仍有资源或XID登记的组合键
    pub fn active_keys(&self) -> Vec<CombinedKey> {
        let mut keys: Vec<CombinedKey> = self
            .resources
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for xid in self.xids.iter() {
            if !keys.contains(xid.key()) {
                keys.push(xid.key().clone());
            }
        }
        keys.sort();
        keys
    }
}

impl Default for TransactionRegistry {
    fn default() -> Self {
        Self::new(XidGenerator::default())
    }
}

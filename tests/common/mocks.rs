//! 模拟资源与协作方
//!
//! 所有调用都写入共享事件日志，便于断言调用次数与顺序

use std::sync::Arc;

use parking_lot::Mutex;

use xa_coordinator::transaction::{
    CombinedKey, HandlerError, HandlerRef, NotifyError, ResourceContext, ResourceError,
    TransactionBeginNotifier, TransactionLocalContext, XaError, XaFlags, XaResource, Xid,
    XAER_RMFAIL,
};

/// 共享事件日志
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// 指定事件出现的次数
    pub fn count(&self, event: &str) -> usize {
        self.0.lock().iter().filter(|e| e.as_str() == event).count()
    }
}

/// 可注入失败的步骤
#[derive(Debug, Clone, Copy, Default)]
pub struct Failures {
    pub prepare: bool,
    pub commit: bool,
    pub rollback: bool,
    pub start: bool,
    pub end: bool,
}

/// 模拟XA资源
pub struct MockXaResource {
    name: String,
    log: EventLog,
    failures: Failures,
    xids: Mutex<Vec<Xid>>,
}

impl MockXaResource {
    /// 最近一次调用使用的XID
    pub fn last_xid(&self) -> Option<Xid> {
        self.xids.lock().last().cloned()
    }

    fn record(&self, op: &str, xid: &Xid, fail: bool) -> Result<(), XaError> {
        self.xids.lock().push(xid.clone());
        self.log.push(format!("{}.{}", self.name, op));
        if fail {
            return Err(XaError::new(XAER_RMFAIL, format!("{} {} failed", self.name, op)));
        }
        Ok(())
    }
}

impl XaResource for MockXaResource {
    fn prepare(&self, xid: &Xid) -> Result<(), XaError> {
        self.record("xa_prepare", xid, self.failures.prepare)
    }

    fn commit(&self, xid: &Xid, one_phase: bool) -> Result<(), XaError> {
        let op = if one_phase {
            "xa_commit_one_phase"
        } else {
            "xa_commit"
        };
        self.record(op, xid, self.failures.commit)
    }

    fn rollback(&self, xid: &Xid) -> Result<(), XaError> {
        self.record("xa_rollback", xid, self.failures.rollback)
    }

    fn start(&self, xid: &Xid, flags: XaFlags) -> Result<(), XaError> {
        assert_eq!(flags, XaFlags::NoFlags);
        self.record("xa_start", xid, self.failures.start)
    }

    fn end(&self, xid: &Xid, flags: XaFlags) -> Result<(), XaError> {
        assert_eq!(flags, XaFlags::Success);
        self.record("xa_end", xid, self.failures.end)
    }
}

/// 模拟资源上下文
pub struct MockResource {
    name: String,
    log: EventLog,
    failures: Failures,
    xa: Option<MockXaResource>,
}

impl MockResource {
    /// 支持两阶段的资源
    pub fn two_phase(name: &str, log: &EventLog, failures: Failures) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            log: log.clone(),
            failures,
            xa: Some(MockXaResource {
                name: name.to_string(),
                log: log.clone(),
                failures,
                xids: Mutex::new(Vec::new()),
            }),
        })
    }

    /// 仅支持单阶段的资源
    pub fn single_phase(name: &str, log: &EventLog, failures: Failures) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            log: log.clone(),
            failures,
            xa: None,
        })
    }

    pub fn xa(&self) -> &MockXaResource {
        self.xa.as_ref().expect("资源不支持两阶段")
    }
}

impl ResourceContext for MockResource {
    fn xa_resource(&self) -> Option<&dyn XaResource> {
        self.xa.as_ref().map(|xa| xa as &dyn XaResource)
    }

    fn commit(&self) -> Result<(), ResourceError> {
        self.log.push(format!("{}.commit", self.name));
        if self.failures.commit {
            return Err(ResourceError(format!("{} commit failed", self.name)));
        }
        Ok(())
    }

    fn rollback(&self) -> Result<(), ResourceError> {
        self.log.push(format!("{}.rollback", self.name));
        if self.failures.rollback {
            return Err(ResourceError(format!("{} rollback failed", self.name)));
        }
        Ok(())
    }

    fn close(&self) {
        self.log.push(format!("{}.close", self.name));
    }
}

/// 记录回调调用的处理器
pub fn recording_handler(name: &str, log: &EventLog) -> HandlerRef {
    let name = name.to_string();
    let log = log.clone();
    Arc::new(move |key: &CombinedKey| -> Result<(), HandlerError> {
        log.push(format!("{}({})", name, key));
        Ok(())
    })
}

/// 总是失败的处理器
pub fn failing_handler(name: &str, log: &EventLog) -> HandlerRef {
    let name = name.to_string();
    let log = log.clone();
    Arc::new(move |key: &CombinedKey| -> Result<(), HandlerError> {
        log.push(format!("{}({})", name, key));
        Err(HandlerError(format!("{} failed", name)))
    })
}

/// 模拟调用方本地事务上下文
pub struct MockLocalContext {
    pub global_id: String,
    pub url: String,
    pub protocol: String,
    pub begun_blocks: Vec<(String, usize)>,
}

impl MockLocalContext {
    pub fn new(global_id: &str) -> Self {
        Self {
            global_id: global_id.to_string(),
            url: "http://localhost:9090/coordinator".to_string(),
            protocol: "2pc".to_string(),
            begun_blocks: Vec::new(),
        }
    }
}

impl TransactionLocalContext for MockLocalContext {
    fn begin_transaction_block(&mut self, block_id: &str, depth: usize) {
        self.begun_blocks.push((block_id.to_string(), depth));
    }

    fn global_transaction_id(&self) -> &str {
        &self.global_id
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn protocol(&self) -> &str {
        &self.protocol
    }
}

/// 模拟事务开始通知器
#[derive(Default)]
pub struct MockNotifier {
    pub calls: Mutex<Vec<(String, String, String, String)>>,
    pub fail: bool,
}

impl TransactionBeginNotifier for MockNotifier {
    fn notify_transaction_begin(
        &self,
        global_id: &str,
        url: &str,
        block_id: &str,
        protocol: &str,
    ) -> Result<Vec<String>, NotifyError> {
        self.calls.lock().push((
            global_id.to_string(),
            url.to_string(),
            block_id.to_string(),
            protocol.to_string(),
        ));
        if self.fail {
            return Err(NotifyError("coordinator unreachable".to_string()));
        }
        Ok(vec![format!("registered {}", block_id)])
    }
}

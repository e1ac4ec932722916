//! 本地参与者跟踪
//!
//! 按全局事务记录本地参与者的事务块ID，以及资源失败、本地参与者失败两个标记。
//! 同一全局事务的全部记录存放在一个条目中，结束时一次移除。

use std::collections::HashSet;

use dashmap::DashMap;

/// 单个全局事务的参与者记录
#[derive(Debug, Default)]
struct ParticipantRecord {
    blocks: HashSet<String>,
    resource_failed: bool,
    local_failed: bool,
}

/// 参与者跟踪器
#[derive(Debug, Default)]
pub struct ParticipantTracker {
    records: DashMap<String, ParticipantRecord>,
}

impl ParticipantTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录本地参与者
    pub fn add_participant(&self, global_id: &str, block_id: &str) {
        self.records
            .entry(global_id.to_string())
            .or_default()
            .blocks
            .insert(block_id.to_string());
    }

    pub fn is_participant(&self, global_id: &str, block_id: &str) -> bool {
        self.records
            .get(global_id)
            .map(|record| record.blocks.contains(block_id))
            .unwrap_or(false)
    }

    /// 标记资源失败
    pub fn mark_resource_failure(&self, global_id: &str) {
        self.records
            .entry(global_id.to_string())
            .or_default()
            .resource_failed = true;
    }

    /// 标记本地参与者失败
    ///
    /// 只有该事务块是此全局事务的参与者时才记录，返回是否已记录
    pub fn mark_local_failure(&self, global_id: &str, block_id: &str) -> bool {
        match self.records.get_mut(global_id) {
            Some(mut record) if record.blocks.contains(block_id) => {
                record.local_failed = true;
                true
            }
            _ => false,
        }
    }

    pub fn has_resource_failure(&self, global_id: &str) -> bool {
        self.records
            .get(global_id)
            .map(|record| record.resource_failed)
            .unwrap_or(false)
    }

    pub fn has_local_failure(&self, global_id: &str) -> bool {
        self.records
            .get(global_id)
            .map(|record| record.local_failed)
            .unwrap_or(false)
    }

    /// 是否存在任一失败标记
    pub fn has_failure(&self, global_id: &str) -> bool {
        self.records
            .get(global_id)
            .map(|record| record.resource_failed || record.local_failed)
            .unwrap_or(false)
    }

    /// 清除全局事务的参与者集合与失败标记
    pub fn clear(&self, global_id: &str) {
        self.records.remove(global_id);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_failure_requires_membership() {
        let tracker = ParticipantTracker::new();

        assert!(!tracker.mark_local_failure("G1", "B1"));
        assert!(!tracker.has_local_failure("G1"));

        tracker.add_participant("G1", "B1");
        assert!(!tracker.mark_local_failure("G1", "B2"));
        assert!(!tracker.has_failure("G1"));

        assert!(tracker.mark_local_failure("G1", "B1"));
        assert!(tracker.has_local_failure("G1"));
        assert!(!tracker.has_resource_failure("G1"));
    }

    #[test]
    fn test_foreign_block_does_not_contaminate() {
        let tracker = ParticipantTracker::new();
        tracker.add_participant("G1", "B1");
        tracker.add_participant("G2", "B2");

        assert!(!tracker.mark_local_failure("G2", "B1"));
        assert!(!tracker.has_failure("G2"));
        assert!(!tracker.has_failure("G1"));
    }

    #[test]
    fn test_resource_failure_is_unconditional() {
        let tracker = ParticipantTracker::new();
        tracker.mark_resource_failure("G1");

        assert!(tracker.has_resource_failure("G1"));
        assert!(tracker.has_failure("G1"));
        assert!(!tracker.is_participant("G1", "B1"));
    }

    #[test]
    fn test_clear_removes_everything() {
        let tracker = ParticipantTracker::new();
        tracker.add_participant("G1", "B1");
        tracker.mark_local_failure("G1", "B1");
        tracker.mark_resource_failure("G1");

        tracker.clear("G1");
        assert!(!tracker.is_participant("G1", "B1"));
        assert!(!tracker.has_failure("G1"));
        assert!(tracker.is_empty());
    }
}

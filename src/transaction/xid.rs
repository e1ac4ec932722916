//! XID生成模块
//!
//! 为每个组合键生成唯一的XA事务分支标识

use std::fmt;

use uuid::Uuid;

use crate::transaction::types::TransactionError;

/// 分支关联标志（X/Open XA）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XaFlags {
    /// TMNOFLAGS：开始新的分支关联
    NoFlags,
    /// TMJOIN：加入已有分支
    Join,
    /// TMRESUME：恢复被挂起的分支
    Resume,
    /// TMSUCCESS：成功结束分支关联
    Success,
    /// TMFAIL：失败结束分支关联
    Fail,
    /// TMSUSPEND：挂起分支关联
    Suspend,
}

impl XaFlags {
    /// 对应的XA整数值
    pub fn value(&self) -> i32 {
        match self {
            XaFlags::NoFlags => 0x0000_0000,
            XaFlags::Join => 0x0020_0000,
            XaFlags::Resume => 0x0800_0000,
            XaFlags::Success => 0x0400_0000,
            XaFlags::Fail => 0x2000_0000,
            XaFlags::Suspend => 0x0200_0000,
        }
    }
}

/// XA事务标识
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Xid {
    format_id: i32,
    global_transaction_id: Vec<u8>,
    branch_qualifier: Vec<u8>,
}

impl Xid {
    /// 全局事务ID最大长度
    pub const MAXGTRIDSIZE: usize = 64;
    /// 分支限定符最大长度
    pub const MAXBQUALSIZE: usize = 64;

    /// 创建XID，超长的部分会被拒绝
    pub fn new(
        format_id: i32,
        global_transaction_id: impl Into<Vec<u8>>,
        branch_qualifier: impl Into<Vec<u8>>,
    ) -> Result<Self, TransactionError> {
        let global_transaction_id = global_transaction_id.into();
        let branch_qualifier = branch_qualifier.into();

        if global_transaction_id.len() > Self::MAXGTRIDSIZE {
            return Err(TransactionError::InvalidXid(format!(
                "gtrid长度 {} 超过上限 {}",
                global_transaction_id.len(),
                Self::MAXGTRIDSIZE
            )));
        }
        if branch_qualifier.len() > Self::MAXBQUALSIZE {
            return Err(TransactionError::InvalidXid(format!(
                "bqual长度 {} 超过上限 {}",
                branch_qualifier.len(),
                Self::MAXBQUALSIZE
            )));
        }

        Ok(Self {
            format_id,
            global_transaction_id,
            branch_qualifier,
        })
    }

    pub fn format_id(&self) -> i32 {
        self.format_id
    }

    pub fn global_transaction_id(&self) -> &[u8] {
        &self.global_transaction_id
    }

    pub fn branch_qualifier(&self) -> &[u8] {
        &self.branch_qualifier
    }
}

impl fmt::Display for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.format_id)?;
        for b in &self.global_transaction_id {
            write!(f, "{:02x}", b)?;
        }
        f.write_str(":")?;
        for b in &self.branch_qualifier {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// XID生成器
///
/// gtrid与bqual均取自随机UUID，线程安全
#[derive(Debug, Clone, Copy)]
pub struct XidGenerator {
    format_id: i32,
}

impl XidGenerator {
    pub fn new(format_id: i32) -> Self {
        Self { format_id }
    }

    /// 生成新的XID
    pub fn generate(&self) -> Xid {
        Xid {
            format_id: self.format_id,
            global_transaction_id: Uuid::new_v4().as_bytes().to_vec(),
            branch_qualifier: Uuid::new_v4().as_bytes().to_vec(),
        }
    }
}

impl Default for XidGenerator {
    fn default() -> Self {
        Self::new(1)
    }
}

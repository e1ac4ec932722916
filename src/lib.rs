//! XA Coordinator - an in-process distributed transaction resource manager
//!
//! This crate tracks the participants enlisted in a distributed transaction,
//! drives two-phase commit against XA-capable resources and falls back to
//! single-phase commit/rollback for resources without a prepare step.

pub mod config;
pub mod transaction;
pub mod utils;

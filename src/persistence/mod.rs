//! Persistence layer
//!
//! - Mutation records with author claims
//! - Write-Ahead Log of committed records, replayed on open

pub mod record;
pub mod wal;

pub use record::{Claims, MutationRecord};
pub use wal::{Wal, WalError, WalResult};

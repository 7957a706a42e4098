pub mod admission;
pub mod arbiter;
pub mod buffer;
pub mod config;
pub mod fanout;
pub mod freelist;
pub mod request;
pub mod rollback;
pub mod router;
pub mod slot;
pub mod types;

#[cfg(test)]
mod unit_tests;

pub use admission::{EnqueueOutcome, FilterReason};
pub use buffer::{UncacheBuffer, UncacheInputs, UncacheOutputs};
pub use config::UncacheConfig;
pub use request::{
    BackendRequest, BackendResponse, FaultReport, LoadCandidate, MemCommand, OrderedWriteback,
    Request, RestartInfo, Writeback,
};
pub use rollback::Rollback;
pub use slot::SlotState;
pub use types::{AgeKey, ExceptionSet, Flush, FlushLevel, LoadWidth, MemClass, OrderClass, SizeInfo, SlotId};

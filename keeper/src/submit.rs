//! Execution submission seam.
//!
//! The keeper decides *what* to execute; a `Submitter` decides *how* the
//! execution call reaches the ledger. The default `DryRunSubmitter`
//! confirms everything locally, which is enough for the in-process engine
//! and keeps a seam open for a transaction-backed implementation.

use std::sync::atomic::{AtomicU64, Ordering};

/// One execution call, in ledger-neutral form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub to: String,
    pub value: u128,
    pub data: Vec<u8>,
}

impl Call {
    pub fn execute_action(action_id: u64) -> Self {
        Self {
            to: "folio".into(),
            value: 0,
            data: action_id.to_le_bytes().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    Pending,
    Confirmed,
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("submission rejected: {0}")]
    Rejected(String),
    #[error("submission transport failed: {0}")]
    Transport(String),
}

pub trait Submitter: Send + Sync {
    fn submit(&self, calls: &[Call]) -> Result<SubmitHandle, SubmitError>;
    fn status(&self, handle: &SubmitHandle) -> SubmitStatus;
}

/// Logs the calls and confirms immediately.
#[derive(Default)]
pub struct DryRunSubmitter {
    next_handle: AtomicU64,
}

impl DryRunSubmitter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Submitter for DryRunSubmitter {
    fn submit(&self, calls: &[Call]) -> Result<SubmitHandle, SubmitError> {
        let handle = SubmitHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        for call in calls {
            log::info!(
                "dry-run submit #{}: to={} value={} data={} bytes",
                handle.0,
                call.to,
                call.value,
                call.data.len()
            );
        }
        Ok(handle)
    }

    fn status(&self, _handle: &SubmitHandle) -> SubmitStatus {
        SubmitStatus::Confirmed
    }
}

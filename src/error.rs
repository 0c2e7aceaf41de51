//! # Reconciliation Errors
//!
//! Error type returned by every reconciliation step and by the state machine.

use crate::chart::ChartError;
use crate::cluster::StoreError;
use crate::controller::convergence::ConvergeError;
use thiserror::Error;

/// Errors that end a reconciliation pass
///
/// A step that returns one of these is expected to have already recorded the
/// explaining Condition in the working status.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("cluster store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Converge(#[from] ConvergeError),

    #[error("chart error: {0}")]
    Chart(#[from] ChartError),

    #[error("reconciliation cancelled")]
    Cancelled,

    #[error("reconciliation deadline exceeded")]
    DeadlineExceeded,

    #[error("resource is missing required metadata: {0}")]
    MissingMetadata(&'static str),
}

impl ReconcilerError {
    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Store(StoreError::Conflict { .. }) => "conflict",
            Self::Store(_) => "store",
            Self::Converge(_) => "convergence",
            Self::Chart(_) => "chart",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline",
            Self::MissingMetadata(_) => "metadata",
        }
    }
}

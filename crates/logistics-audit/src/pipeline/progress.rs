//! Progress reporting and cancellation for an audit run.
//!
//! An audit is short, but the CLI and any embedding UI still want to know
//! which dataset is being worked on. Reporters receive one update at the
//! start and end of each stage.
//!
//! # Example
//!
//! ```rust,ignore
//! use logistics_audit::{AuditOrchestrator, CancellationToken};
//!
//! let token = CancellationToken::new();
//!
//! let result = AuditOrchestrator::builder()
//!     .cancellation_token(token.clone())
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(&inventory, &transactions, &feedback)?;
//! ```

use crate::types::DatasetKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Stages of an audit run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStage {
    /// Checking the cache and validating inputs
    Initializing,
    /// Scoring the untouched inputs
    ScoringBefore,
    /// Running the inventory repair rules
    CleaningInventory,
    /// Running the transaction repair rules against the cleaned inventory
    CleaningTransactions,
    /// Running the feedback repair rules
    CleaningFeedback,
    /// Scoring the cleaned tables
    ScoringAfter,
    /// Run completed successfully
    Complete,
    /// Run was cancelled by the caller
    Cancelled,
    /// Run failed with an error
    Failed,
}

impl AuditStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::ScoringBefore => "Scoring Inputs",
            Self::CleaningInventory => "Cleaning Inventory",
            Self::CleaningTransactions => "Cleaning Transactions",
            Self::CleaningFeedback => "Cleaning Feedback",
            Self::ScoringAfter => "Scoring Cleaned Tables",
            Self::Complete => "Complete",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }

    /// The cleaning stage for a dataset.
    pub fn cleaning(dataset: DatasetKind) -> Self {
        match dataset {
            DatasetKind::Inventory => Self::CleaningInventory,
            DatasetKind::Transactions => Self::CleaningTransactions,
            DatasetKind::Feedback => Self::CleaningFeedback,
        }
    }

    /// Share of the overall run this stage accounts for (0.0 - 1.0).
    ///
    /// The working stages sum to 1.0; terminal states weigh nothing.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Initializing => 0.05,
            Self::ScoringBefore => 0.15,
            Self::CleaningInventory => 0.20,
            Self::CleaningTransactions => 0.30,
            Self::CleaningFeedback => 0.15,
            Self::ScoringAfter => 0.15,
            Self::Complete | Self::Cancelled | Self::Failed => 0.0,
        }
    }

    /// Cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Initializing => 0.0,
            Self::ScoringBefore => 0.05,
            Self::CleaningInventory => 0.20,
            Self::CleaningTransactions => 0.40,
            Self::CleaningFeedback => 0.70,
            Self::ScoringAfter => 0.85,
            Self::Complete => 1.0,
            Self::Cancelled | Self::Failed => 0.0,
        }
    }
}

/// A progress update sent to a [`ProgressReporter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Current stage
    pub stage: AuditStage,

    /// Dataset the stage is working on, when there is exactly one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<DatasetKind>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within the current stage (0.0 - 1.0)
    pub stage_progress: f32,

    /// Human-readable message
    pub message: String,
}

impl ProgressUpdate {
    /// Creates an update for a stage.
    pub fn new(stage: AuditStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            dataset: None,
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
        }
    }

    /// Creates an update for the cleaning stage of `dataset`.
    pub fn cleaning(dataset: DatasetKind, stage_progress: f32, message: impl Into<String>) -> Self {
        Self {
            dataset: Some(dataset),
            ..Self::new(AuditStage::cleaning(dataset), stage_progress, message)
        }
    }

    /// Creates a completion update.
    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            stage: AuditStage::Complete,
            dataset: None,
            progress: 1.0,
            stage_progress: 1.0,
            message: message.into(),
        }
    }

    /// Creates a cancelled update.
    pub fn cancelled() -> Self {
        Self {
            stage: AuditStage::Cancelled,
            dataset: None,
            progress: 0.0,
            stage_progress: 0.0,
            message: "Audit cancelled by user".to_string(),
        }
    }

    /// Creates a failed update.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            stage: AuditStage::Failed,
            dataset: None,
            progress: 0.0,
            stage_progress: 0.0,
            message: message.into(),
        }
    }
}

/// Receives progress updates during an audit run.
///
/// Implementations must be `Send + Sync` so an orchestrator holding one can
/// be shared across threads.
pub trait ProgressReporter: Send + Sync {
    /// Called at stage boundaries. Implementations should not block.
    fn report(&self, update: ProgressUpdate);
}

/// [`ProgressReporter`] backed by a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

/// Token for cancelling a running audit from another thread.
///
/// The orchestrator checks it between stages and returns
/// [`AuditError::Cancelled`](crate::error::AuditError::Cancelled) once it is set.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. Visible to every clone of this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused for another run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
